//! Configuration for kicad-lib.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags (`--library`, `--debug`)
//! 2. Environment variables (KICAD_LIB_LIBRARY, KICAD_LIB_CONVERTER)
//! 3. Project config file (.kicad-lib/config.yaml)
//! 4. User config file (<config dir>/kicad-lib/config.yaml)
//! 5. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .kicad-lib/config.yaml
//! - Falls back to the user config file if no project config exists
//! - Relative paths in a project config are relative to the project root
//!   (the parent of .kicad-lib/)
//!
//! Configuration is resolved once by the CLI and handed to the library
//! manager as a plain value.

pub mod paths;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::library::LibraryConfig;

/// Environment variable naming the library root
pub const ENV_LIBRARY: &str = "KICAD_LIB_LIBRARY";

/// Environment variable naming the converter binary
pub const ENV_CONVERTER: &str = "KICAD_LIB_CONVERTER";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default = "default_version")]
    pub version: String,
    /// Library directory (relative to the project root)
    pub library_path: Option<String>,
    /// Enable debug logging
    pub debug_mode: Option<bool>,
    #[serde(default)]
    pub converter: Option<ConverterConfig>,
}

fn default_version() -> String {
    "1".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConverterConfig {
    /// Converter binary name or path
    pub binary: Option<String>,
    /// Upper bound on a single conversion
    pub timeout_seconds: Option<u64>,
}

/// Resolved converter settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterSettings {
    pub binary: String,
    pub timeout_seconds: u64,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            binary: "easyeda2kicad".to_string(),
            timeout_seconds: 60,
        }
    }
}

impl ConverterSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Values that take precedence over any config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub library: Option<PathBuf>,
    pub converter: Option<String>,
    pub debug: bool,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Library root
    pub library: PathBuf,
    /// Debug logging enabled
    pub debug: bool,
    /// Converter invocation settings
    pub converter: ConverterSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Manager configuration derived from this config
    pub fn library_config(&self) -> LibraryConfig {
        LibraryConfig {
            root: self.library.clone(),
            converter_timeout: self.converter.timeout(),
        }
    }
}

/// Find a project config file by searching `start` and its parents
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(paths::project_config)
        .find(|candidate| candidate.is_file())
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Directory relative config paths are resolved against
fn config_base_dir(config_path: &Path) -> &Path {
    let parent = config_path.parent().unwrap_or(Path::new("."));
    // .kicad-lib/config.yaml resolves against the project root
    if parent.file_name().is_some_and(|n| n == paths::CONFIG_DIR) {
        parent.parent().unwrap_or(parent)
    } else {
        parent
    }
}

/// Merge a parsed config file (if any) with overrides and defaults
pub fn resolve(found: Option<(PathBuf, ConfigFile)>, overrides: &Overrides) -> ResolvedConfig {
    let (config_file, file) = match found {
        Some((path, file)) => (Some(path), file),
        None => (None, ConfigFile::default()),
    };

    let library = if let Some(ref library) = overrides.library {
        library.clone()
    } else if let Some(ref config_path) = config_file {
        let base = config_base_dir(config_path);
        resolve_path(
            base,
            file.library_path
                .as_deref()
                .unwrap_or(paths::DEFAULT_LIBRARY_DIR),
        )
    } else {
        paths::default_library()
    };

    let defaults = ConverterSettings::default();
    let converter_file = file.converter.unwrap_or_default();
    let converter = ConverterSettings {
        binary: overrides
            .converter
            .clone()
            .or(converter_file.binary)
            .unwrap_or(defaults.binary),
        timeout_seconds: converter_file
            .timeout_seconds
            .filter(|secs| *secs > 0)
            .unwrap_or(defaults.timeout_seconds),
    };

    ResolvedConfig {
        library,
        debug: overrides.debug || file.debug_mode.unwrap_or(false),
        converter,
        config_file,
    }
}

/// Load configuration from all sources
pub fn load_config(mut overrides: Overrides) -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;

    let config_path = find_config_file(&cwd)
        .or_else(|| paths::user_config().filter(|p| p.is_file()));

    let found = match config_path {
        Some(path) => {
            let file = load_config_file(&path)?;
            Some((path, file))
        }
        None => None,
    };

    if overrides.library.is_none() {
        overrides.library = std::env::var_os(ENV_LIBRARY).map(PathBuf::from);
    }
    if overrides.converter.is_none() {
        overrides.converter = std::env::var(ENV_CONVERTER).ok().filter(|s| !s.is_empty());
    }

    let mut config = resolve(found, &overrides);
    if config.library.is_relative() {
        config.library = cwd.join(&config.library);
    }

    Ok(config)
}
