//! Command-line interface for kicad-lib.
//!
//! Provides commands for fetching components into the library, listing and
//! inspecting them, deleting them, and checking the environment.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::adapters::Easyeda2KicadConverter;
use crate::config::{self, Overrides, ResolvedConfig};
use crate::diagnostics;
use crate::library::{
    join_types, ArtifactSelector, ComponentInfo, ErrorKind, LibraryError, LibraryManager,
    ListEntry,
};

/// kicad-lib - Manage EasyEDA components for KiCad
#[derive(Parser, Debug)]
#[command(name = "kicad-lib")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Use \"kicad-lib <command> --help\" for more information about a command.")]
pub struct Cli {
    /// Enable debug mode with verbose logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Library directory (overrides the config file)
    #[arg(long, global = true, env = "KICAD_LIB_LIBRARY")]
    pub library: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download and add a component to the library
    Get {
        /// EasyEDA component ID or LCSC part number (e.g., C12345)
        component_id: String,

        /// Type of component to download
        #[arg(long = "type", value_enum, default_value_t = TypeArg::Both)]
        artifact_type: TypeArg,
    },

    /// List all components in the library
    List {
        /// Show detailed information about each component
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show detailed information about a specific component
    Info {
        /// Component ID to query
        component_id: String,
    },

    /// Remove a component from the library
    Delete {
        /// Component ID to remove
        component_id: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Run system health checks
    Diagnostics {
        /// Show additional diagnostic information
        #[arg(short, long)]
        verbose: bool,
    },
}

/// Artifact selection for CLI (maps to ArtifactSelector)
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TypeArg {
    /// Schematic symbol only
    Symbol,

    /// PCB footprint only
    Footprint,

    /// Symbol and footprint
    Both,
}

impl From<TypeArg> for ArtifactSelector {
    fn from(t: TypeArg) -> Self {
        match t {
            TypeArg::Symbol => ArtifactSelector::Symbol,
            TypeArg::Footprint => ArtifactSelector::Footprint,
            TypeArg::Both => ArtifactSelector::Both,
        }
    }
}

impl Cli {
    /// Resolve configuration, letting command-line flags win
    pub fn resolve_config(&self) -> Result<ResolvedConfig> {
        config::load_config(Overrides {
            library: self.library.clone(),
            converter: None,
            debug: self.debug,
        })
    }

    /// Execute the CLI command
    pub async fn execute(self, config: &ResolvedConfig) -> Result<ExitCode> {
        let converter = Easyeda2KicadConverter::with_binary_path(&config.converter.binary);
        let manager = LibraryManager::new(config.library_config(), Box::new(converter));

        match self.command {
            Commands::Get {
                component_id,
                artifact_type,
            } => get_component(&manager, &component_id, artifact_type.into()).await,
            Commands::List { verbose } => list_components(&manager, verbose).await,
            Commands::Info { component_id } => show_info(&manager, &component_id).await,
            Commands::Delete {
                component_id,
                force,
            } => delete_component(&manager, &component_id, force).await,
            Commands::Diagnostics { verbose } => run_diagnostics(config, &manager, verbose).await,
        }
    }
}

/// Exit code for a failed command.
///
/// Library errors map to their stable per-kind code; anything else is 1.
pub fn exit_code_for(error: &anyhow::Error) -> u8 {
    error
        .downcast_ref::<LibraryError>()
        .map(|e| e.kind().exit_code())
        .unwrap_or(1)
}

/// Render a failed command for the terminal
pub fn render_error(error: &anyhow::Error) -> String {
    let mut text = format_error(&format!("{:#}", error));
    if let Some(lib_err) = error.downcast_ref::<LibraryError>() {
        match lib_err.kind() {
            ErrorKind::CorruptMetadata => {
                text.push_str("\n  Use 'kicad-lib delete' to remove the entry, then fetch it again.")
            }
            ErrorKind::ConversionFailed => {
                text.push_str("\n  Run 'kicad-lib diagnostics' to check the converter installation.")
            }
            _ => {}
        }
    }
    text
}

pub fn format_success(message: &str) -> String {
    format!("✓ {}", message)
}

pub fn format_error(message: &str) -> String {
    format!("✗ {}", message)
}

pub fn format_info(message: &str) -> String {
    format!("ℹ {}", message)
}

/// Whether a prompt answer confirms
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Ask a yes/no question on stdin (default no)
fn confirm(prompt: &str) -> Result<bool> {
    print!("{} (y/N): ", prompt);
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation from stdin")?;

    Ok(is_affirmative(&answer))
}

async fn get_component(
    manager: &LibraryManager,
    component_id: &str,
    selector: ArtifactSelector,
) -> Result<ExitCode> {
    let outcome = manager.fetch(component_id, selector).await?;
    println!("{}", format_success(&outcome.summary()));
    Ok(ExitCode::SUCCESS)
}

async fn list_components(manager: &LibraryManager, verbose: bool) -> Result<ExitCode> {
    let entries = manager.list_components(verbose).await?;

    if entries.is_empty() {
        println!("{}", format_info("No components found in library"));
        return Ok(ExitCode::SUCCESS);
    }

    println!("\nFound {} component(s) in library:\n", entries.len());

    for entry in &entries {
        match entry {
            ListEntry::Component(c) if verbose => {
                println!("📦 {}", c.identifier);
                println!("   Files: {}", c.file_count);
                println!("   Types: {}", join_types(&c.artifact_types));
                if let Some(created) = c.created_at {
                    println!("   Added: {}", created.to_rfc3339());
                }
                if let Some(updated) = c.updated_at {
                    println!("   Updated: {}", updated.to_rfc3339());
                }
                if let Some(files) = c.files.as_ref().filter(|f| !f.is_empty()) {
                    let shown: Vec<&str> = files.iter().take(3).map(String::as_str).collect();
                    println!("   Contents: {}", shown.join(", "));
                    if files.len() > 3 {
                        println!("             ... and {} more", files.len() - 3);
                    }
                }
                println!();
            }
            ListEntry::Component(c) => {
                println!(
                    "  • {} ({} files) [{}]",
                    c.identifier,
                    c.file_count,
                    join_types(&c.artifact_types)
                );
            }
            ListEntry::Orphaned(o) => {
                println!("  ! {} (orphaned: {})", o.name, o.reason);
                if verbose {
                    println!();
                }
            }
        }
    }

    if !verbose {
        println!("\nUse 'list --verbose' for more details");
    }

    Ok(ExitCode::SUCCESS)
}

async fn show_info(manager: &LibraryManager, component_id: &str) -> Result<ExitCode> {
    let info = manager.get_info(component_id).await?;
    print_info(&info);
    Ok(ExitCode::SUCCESS)
}

fn print_info(info: &ComponentInfo) {
    let meta = &info.metadata;

    println!("\n📦 Component: {}\n", meta.identifier);
    println!("Path: {}", info.path.display());
    println!("Files: {}", info.files.len());
    println!("Types: {}", join_types(&meta.artifact_types));
    println!("Added: {}", meta.created_at.to_rfc3339());
    println!("Updated: {}", meta.updated_at.to_rfc3339());

    if !info.files.is_empty() {
        println!("\nContents:");
        for file in &info.files {
            println!("  • {}", file);
        }
    }

    if !info.missing_artifacts.is_empty() {
        println!(
            "\n⚠ Recorded but missing on disk: {}",
            join_types(&info.missing_artifacts)
        );
    }
    if !info.untracked_artifacts.is_empty() {
        println!(
            "\n⚠ Present on disk but not recorded: {}",
            join_types(&info.untracked_artifacts)
        );
    }

    println!();
}

async fn delete_component(
    manager: &LibraryManager,
    component_id: &str,
    force: bool,
) -> Result<ExitCode> {
    if !force {
        let prompt = format!(
            "Are you sure you want to delete component '{}'?",
            component_id
        );
        if !confirm(&prompt)? {
            println!("Delete cancelled.");
            return Ok(ExitCode::SUCCESS);
        }
    }

    manager.delete(component_id, force).await?;
    println!(
        "{}",
        format_success(&format!("Component {} removed from library", component_id))
    );
    Ok(ExitCode::SUCCESS)
}

async fn run_diagnostics(
    config: &ResolvedConfig,
    manager: &LibraryManager,
    verbose: bool,
) -> Result<ExitCode> {
    let checks = diagnostics::run_diagnostics(config, manager).await;
    let passed = diagnostics::passed_count(&checks);
    let rule = "=".repeat(60);

    println!("\n{}", rule);
    println!("KiCad Library Manager - Diagnostic Report");
    println!("{}\n", rule);

    if verbose {
        println!("Library:   {}", config.library.display());
        println!(
            "Converter: {} (timeout {}s)",
            config.converter.binary, config.converter.timeout_seconds
        );
        println!(
            "Config:    {}",
            config
                .config_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none - using defaults)".to_string())
        );
        println!("Debug:     {}\n", config.debug);
    }

    for check in &checks {
        println!("{}\n", check);
    }

    println!("{}", rule);
    println!("Results: {}/{} checks passed", passed, checks.len());
    println!("{}\n", rule);

    if passed < checks.len() {
        println!("⚠ Some checks failed. Please review the issues above.");
        Ok(ExitCode::FAILURE)
    } else {
        println!("✓ All checks passed! System is ready to use.");
        Ok(ExitCode::SUCCESS)
    }
}
