//! Per-component metadata records.
//!
//! Each component directory holds exactly one `metadata.json`. The record is
//! only ever replaced whole: it is written to a temporary file in the same
//! directory and renamed over the old one.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use super::identifier::ComponentId;
use crate::config::paths;

/// Current metadata schema version
pub const METADATA_VERSION: u32 = 1;

/// One facet of a component produced by the converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    /// Schematic symbol (`.kicad_sym`)
    Symbol,

    /// PCB footprint (`.kicad_mod`)
    Footprint,
}

impl ArtifactType {
    /// File extension the converter gives this artifact
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactType::Symbol => "kicad_sym",
            ArtifactType::Footprint => "kicad_mod",
        }
    }

    /// Classify a file by its extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        [ArtifactType::Symbol, ArtifactType::Footprint]
            .into_iter()
            .find(|t| t.extension() == ext)
    }
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactType::Symbol => write!(f, "symbol"),
            ArtifactType::Footprint => write!(f, "footprint"),
        }
    }
}

/// Which artifacts a fetch should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtifactSelector {
    Symbol,
    Footprint,
    #[default]
    Both,
}

impl ArtifactSelector {
    /// Artifact types covered by this selector
    pub fn types(self) -> BTreeSet<ArtifactType> {
        match self {
            ArtifactSelector::Symbol => BTreeSet::from([ArtifactType::Symbol]),
            ArtifactSelector::Footprint => BTreeSet::from([ArtifactType::Footprint]),
            ArtifactSelector::Both => {
                BTreeSet::from([ArtifactType::Symbol, ArtifactType::Footprint])
            }
        }
    }

    pub fn includes(self, artifact: ArtifactType) -> bool {
        self.types().contains(&artifact)
    }
}

impl std::fmt::Display for ArtifactSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactSelector::Symbol => write!(f, "symbol"),
            ArtifactSelector::Footprint => write!(f, "footprint"),
            ArtifactSelector::Both => write!(f, "both"),
        }
    }
}

/// Comma-separated artifact types, or "none"
pub fn join_types(types: &BTreeSet<ArtifactType>) -> String {
    if types.is_empty() {
        return "none".to_string();
    }
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Metadata record stored as `<component>/metadata.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentMetadata {
    /// Schema version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Component identifier, always equal to the directory name
    pub identifier: ComponentId,

    /// Artifact types present
    pub artifact_types: BTreeSet<ArtifactType>,

    /// When the component was first fetched
    pub created_at: DateTime<Utc>,

    /// When the component was last fetched
    pub updated_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    METADATA_VERSION
}

impl ComponentMetadata {
    /// Create a record for a first fetch
    pub fn new(identifier: ComponentId, artifact_types: BTreeSet<ArtifactType>) -> Self {
        let now = Utc::now();
        Self {
            version: METADATA_VERSION,
            identifier,
            artifact_types,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a repeated fetch: take the types now present and bump
    /// `updated_at`, keeping `created_at`
    pub fn refreshed(&self, present: BTreeSet<ArtifactType>) -> Self {
        Self {
            version: METADATA_VERSION,
            identifier: self.identifier.clone(),
            artifact_types: present,
            created_at: self.created_at,
            updated_at: Utc::now().max(self.created_at),
        }
    }

    /// Load the record from a component directory
    pub async fn load(component_dir: &Path) -> Result<Self, MetadataError> {
        let path = component_dir.join(paths::METADATA_FILE);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MetadataError::Missing)
            }
            Err(e) => return Err(MetadataError::Unreadable(e)),
        };

        serde_json::from_str(&content).map_err(MetadataError::Malformed)
    }

    /// Atomically write the record into a component directory
    pub fn save(&self, component_dir: &Path) -> std::io::Result<()> {
        let mut content = serde_json::to_vec_pretty(self)?;
        content.push(b'\n');
        write_atomic(&component_dir.join(paths::METADATA_FILE), &content)
    }
}

/// Why a metadata record could not be loaded
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("metadata file is missing")]
    Missing,

    #[error("metadata file is unreadable: {0}")]
    Unreadable(#[source] std::io::Error),

    #[error("metadata file is malformed: {0}")]
    Malformed(#[source] serde_json::Error),
}

/// Write `content` to `path` via a sibling temporary file and rename.
///
/// Readers observe either the old file or the complete new one.
pub fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(paths::TEMP_FILE_PREFIX)
        .tempfile_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
