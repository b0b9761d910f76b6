//! kicad-lib CLI entrypoint

use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kicad_lib::cli::{self, Cli};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Cli::parse();

    let config = match args.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", cli::format_error(&format!("Configuration error: {:#}", e)));
            return ExitCode::FAILURE;
        }
    };

    // Initialize tracing (RUST_LOG wins over --debug / debug_mode)
    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match args.execute(&config).await {
        Ok(code) => code,
        Err(e) => {
            debug!(error = ?e, "Command failed");
            eprintln!("{}", cli::render_error(&e));
            ExitCode::from(cli::exit_code_for(&e))
        }
    }
}
