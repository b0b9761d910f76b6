//! kicad-lib - Local library manager for EasyEDA components in KiCad
//!
//! Keeps a git-friendly directory of symbols and footprints downloaded with
//! the `easyeda2kicad` converter so they can be shared between projects.
//!
//! # Modules
//!
//! - `library`: Component directories, metadata and the `LibraryManager`
//! - `adapters`: External converter integration (easyeda2kicad)
//! - `config`: Layered configuration resolution
//! - `diagnostics`: Environment health checks
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Add a component
//! kicad-lib get C12345 --type both
//!
//! # Show what is in the library
//! kicad-lib list --verbose
//!
//! # Remove a component
//! kicad-lib delete C12345 --force
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod library;

// Re-export main types at crate root for convenience
pub use adapters::{ConversionError, ConversionRequest, Converter, ConverterOutput};
pub use config::ResolvedConfig;
pub use library::{
    ArtifactSelector, ArtifactType, ComponentId, ComponentInfo, ComponentMetadata, ErrorKind,
    FetchOutcome, LibraryConfig, LibraryError, LibraryManager, ListEntry, OrphanReason,
};
