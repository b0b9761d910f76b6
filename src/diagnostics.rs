//! Environment health checks.
//!
//! Backs the `diagnostics` command: verifies configuration, the library
//! directory, the converter installation and free disk space.

use std::path::Path;

use tracing::{debug, info};

use crate::adapters::Converter;
use crate::config::{paths, ResolvedConfig};
use crate::library::LibraryManager;

/// Below this much free space the disk check fails
pub const MIN_FREE_BYTES: u64 = 1024 * 1024 * 1024;

/// Result of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticCheck {
    pub name: &'static str,
    pub passed: bool,
    pub message: String,
}

impl DiagnosticCheck {
    pub fn pass(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            passed: true,
            message: message.into(),
        }
    }

    pub fn fail(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            passed: false,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for DiagnosticCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = if self.passed { "✓ PASS" } else { "✗ FAIL" };
        write!(f, "{}: {}\n  {}", status, self.name, self.message)
    }
}

/// Run every check in display order
pub async fn run_diagnostics(
    config: &ResolvedConfig,
    manager: &LibraryManager,
) -> Vec<DiagnosticCheck> {
    info!("Running system diagnostics");

    let checks = vec![
        check_config_file(config),
        check_library_directory(manager).await,
        check_converter(manager.converter()).await,
        check_disk_space(manager.root()),
        check_stale_entries(manager.root()),
    ];

    for check in &checks {
        debug!(check = check.name, passed = check.passed, message = %check.message);
    }
    checks
}

/// Number of passed checks
pub fn passed_count(checks: &[DiagnosticCheck]) -> usize {
    checks.iter().filter(|c| c.passed).count()
}

fn check_config_file(config: &ResolvedConfig) -> DiagnosticCheck {
    const NAME: &str = "Configuration File";

    match &config.config_file {
        Some(path) => {
            DiagnosticCheck::pass(NAME, format!("Valid configuration found at {}", path.display()))
        }
        None => DiagnosticCheck::pass(
            NAME,
            format!(
                "No {}/{} found; using defaults",
                paths::CONFIG_DIR,
                paths::CONFIG_FILE
            ),
        ),
    }
}

async fn check_library_directory(manager: &LibraryManager) -> DiagnosticCheck {
    const NAME: &str = "Library Directory";
    let root = manager.root();

    if let Err(e) = tokio::fs::create_dir_all(root).await {
        return DiagnosticCheck::fail(
            NAME,
            format!("Could not create library directory at {}: {}", root.display(), e),
        );
    }

    // Probe file is removed when dropped
    if let Err(e) = tempfile::Builder::new()
        .prefix(paths::TEMP_FILE_PREFIX)
        .tempfile_in(root)
    {
        return DiagnosticCheck::fail(
            NAME,
            format!("Library directory not writable: {}", e),
        );
    }

    match manager.list_components(false).await {
        Ok(entries) => {
            let orphaned = entries.iter().filter(|e| e.is_orphaned()).count();
            let components = entries.len() - orphaned;
            let mut message = format!(
                "Library accessible at {} ({} components)",
                root.display(),
                components
            );
            if orphaned > 0 {
                message.push_str(&format!("; {} orphaned entries need attention", orphaned));
            }
            DiagnosticCheck {
                name: NAME,
                passed: orphaned == 0,
                message,
            }
        }
        Err(e) => DiagnosticCheck::fail(NAME, format!("Failed to read library: {}", e)),
    }
}

async fn check_converter(converter: &dyn Converter) -> DiagnosticCheck {
    const NAME: &str = "Converter";

    match converter.version().await {
        Ok(version) if version.is_empty() => {
            DiagnosticCheck::pass(NAME, format!("{} is installed", converter.name()))
        }
        Ok(version) => DiagnosticCheck::pass(
            NAME,
            format!("{} is installed ({})", converter.name(), version),
        ),
        Err(e) => DiagnosticCheck::fail(NAME, format!("{}: {}", converter.name(), e)),
    }
}

fn check_disk_space(root: &Path) -> DiagnosticCheck {
    const NAME: &str = "Disk Space";

    // The root may not exist yet; measure the closest ancestor that does
    let Some(existing) = root.ancestors().find(|p| p.exists()) else {
        return DiagnosticCheck::pass(NAME, "Could not check disk space: no existing ancestor");
    };

    let (free, total) = match (fs2::available_space(existing), fs2::total_space(existing)) {
        (Ok(free), Ok(total)) => (free, total),
        (Err(e), _) | (_, Err(e)) => {
            return DiagnosticCheck::pass(NAME, format!("Could not check disk space: {}", e))
        }
    };

    let mut message = format!("{:.2} GB free of {:.2} GB total", gib(free), gib(total));
    let sufficient = free >= MIN_FREE_BYTES;
    if !sufficient {
        message.push_str(" (Warning: Low disk space)");
    }

    DiagnosticCheck {
        name: NAME,
        passed: sufficient,
        message,
    }
}

fn check_stale_entries(root: &Path) -> DiagnosticCheck {
    const NAME: &str = "Interrupted Operations";

    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            return DiagnosticCheck::fail(NAME, format!("Could not read {}: {}", root.display(), e))
        }
    };

    let mut stale: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| paths::is_transient(name))
        .collect();
    stale.sort();

    if stale.is_empty() {
        DiagnosticCheck::pass(NAME, "No leftovers from interrupted operations")
    } else {
        DiagnosticCheck::fail(
            NAME,
            format!(
                "Leftover directories in {} can be removed: {}",
                root.display(),
                stale.join(", ")
            ),
        )
    }
}

fn gib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}
