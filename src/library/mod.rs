//! Component library management.
//!
//! The library is a plain directory that can be committed to version
//! control. Each component lives in its own directory named after its
//! identifier.
//!
//! # Storage Layout
//!
//! ```text
//! <library root>/
//! └── <identifier>/                 # e.g. C12345
//!     ├── metadata.json             # identifier, artifact_types, created_at, updated_at
//!     ├── C12345.kicad_sym          # symbol
//!     ├── C12345.pretty/*.kicad_mod # footprint
//!     └── C12345.3dshapes/*         # 3D models (opaque)
//! ```

pub mod error;
pub mod files;
pub mod identifier;
pub mod manager;
pub mod metadata;

pub use error::{ErrorKind, LibraryError};
pub use identifier::ComponentId;
pub use manager::{
    ComponentInfo, ComponentSummary, FetchOutcome, LibraryConfig, LibraryManager, ListEntry,
    OrphanReason, OrphanedEntry,
};
pub use metadata::{join_types, ArtifactSelector, ArtifactType, ComponentMetadata};
