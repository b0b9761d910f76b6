//! Canonical file and directory names.
//!
//! Single source of truth - import this instead of hardcoding names.
//!
//! ## Layout
//!
//! ```text
//! <project>/
//! ├── .kicad-lib/config.yaml        # project config (optional)
//! └── library/                      # library root
//!     ├── .staging-XXXXXX/          # in-flight fetch (hidden, transient)
//!     ├── .trash-XXXXXX/            # in-flight delete/replace (hidden, transient)
//!     └── C12345/
//!         ├── metadata.json
//!         ├── C12345.kicad_sym
//!         ├── C12345.pretty/*.kicad_mod
//!         └── C12345.3dshapes/*
//! ```

use std::path::{Path, PathBuf};

/// Metadata record inside each component directory
pub const METADATA_FILE: &str = "metadata.json";

/// Prefix of temporary files used for atomic writes
pub const TEMP_FILE_PREFIX: &str = ".tmp-";

/// Prefix of fetch staging directories in the library root
pub const STAGING_PREFIX: &str = ".staging-";

/// Prefix of holder directories for components being removed
pub const TRASH_PREFIX: &str = ".trash-";

/// Project config directory name
pub const CONFIG_DIR: &str = ".kicad-lib";

/// Config file name inside [`CONFIG_DIR`] or the user config directory
pub const CONFIG_FILE: &str = "config.yaml";

/// Library directory name used when nothing else is configured
pub const DEFAULT_LIBRARY_DIR: &str = "library";

/// Application directory name under platform config/data dirs
pub const APP_DIR: &str = "kicad-lib";

/// Project config path for a candidate project root
pub fn project_config(root: &Path) -> PathBuf {
    root.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// User-level config (`~/.config/kicad-lib/config.yaml` on Linux)
pub fn user_config() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}

/// Library used when neither config nor environment names one
pub fn default_library() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(DEFAULT_LIBRARY_DIR)
}

/// Whether a library root entry was left behind by an interrupted run
pub fn is_transient(name: &str) -> bool {
    name.starts_with(STAGING_PREFIX) || name.starts_with(TRASH_PREFIX)
}
