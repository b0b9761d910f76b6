//! The library manager.
//!
//! Owns the library root and performs every operation on component
//! directories. Mutating operations stage their work in hidden directories
//! under the root and commit with a rename, so a component directory is
//! either fully replaced or left as it was.
//!
//! There is no locking between processes: two concurrent fetches of the same
//! identifier race at commit time. The last commit wins or the second fails
//! with a filesystem error.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tokio::fs;
use tracing::{debug, error, info, warn};

use super::error::LibraryError;
use super::files::{artifact_types_in, copy_missing, is_hidden, is_real_dir, list_files};
use super::identifier::ComponentId;
use super::metadata::{
    join_types, ArtifactSelector, ArtifactType, ComponentMetadata, MetadataError,
};
use crate::adapters::{ConversionError, ConversionRequest, Converter};
use crate::config::paths;

/// Default bound on a single converter run
pub const DEFAULT_CONVERTER_TIMEOUT: Duration = Duration::from_secs(60);

/// Manager configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryConfig {
    /// Library root directory
    pub root: PathBuf,

    /// Upper bound on a single converter run
    pub converter_timeout: Duration,
}

impl LibraryConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            converter_timeout: DEFAULT_CONVERTER_TIMEOUT,
        }
    }

    pub fn with_converter_timeout(mut self, timeout: Duration) -> Self {
        self.converter_timeout = timeout;
        self
    }
}

/// Result of a successful fetch
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Metadata as written
    pub metadata: ComponentMetadata,

    /// What was asked for
    pub requested: ArtifactSelector,

    /// Component directory
    pub path: PathBuf,

    /// Whether an existing component was updated
    pub updated: bool,
}

impl FetchOutcome {
    /// Human-readable summary
    pub fn summary(&self) -> String {
        let verb = if self.updated {
            "updated in"
        } else {
            "added to"
        };
        format!(
            "Component {} {} library ({})",
            self.metadata.identifier,
            verb,
            join_types(&self.metadata.artifact_types)
        )
    }
}

/// One entry of a library listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEntry {
    /// Directory with valid metadata
    Component(ComponentSummary),

    /// Directory that is not a valid component
    Orphaned(OrphanedEntry),
}

impl ListEntry {
    /// Directory name of the entry
    pub fn name(&self) -> &str {
        match self {
            ListEntry::Component(c) => c.identifier.as_str(),
            ListEntry::Orphaned(o) => &o.name,
        }
    }

    pub fn is_orphaned(&self) -> bool {
        matches!(self, ListEntry::Orphaned(_))
    }
}

/// Listing record for a valid component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSummary {
    pub identifier: ComponentId,
    pub artifact_types: BTreeSet<ArtifactType>,
    /// Files on disk, excluding metadata
    pub file_count: usize,
    /// Present when listed verbosely
    pub created_at: Option<DateTime<Utc>>,
    /// Present when listed verbosely
    pub updated_at: Option<DateTime<Utc>>,
    /// Present when listed verbosely
    pub files: Option<Vec<String>>,
}

/// Listing record for a directory that is not a valid component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanedEntry {
    pub name: String,
    pub reason: OrphanReason,
    pub file_count: usize,
}

/// Why a directory is orphaned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrphanReason {
    /// No metadata.json
    MissingMetadata,

    /// metadata.json unreadable, malformed or for another identifier
    CorruptMetadata(String),

    /// Directory name is not a valid identifier
    InvalidName,

    /// Directory contents could not be read
    Unreadable(String),
}

impl std::fmt::Display for OrphanReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrphanReason::MissingMetadata => write!(f, "missing metadata"),
            OrphanReason::CorruptMetadata(detail) => write!(f, "corrupt metadata: {}", detail),
            OrphanReason::InvalidName => write!(f, "not a valid component ID"),
            OrphanReason::Unreadable(detail) => write!(f, "unreadable: {}", detail),
        }
    }
}

/// Full details of one component
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    pub metadata: ComponentMetadata,

    /// Component directory
    pub path: PathBuf,

    /// Files actually on disk (relative, `/`-separated, sorted)
    pub files: Vec<String>,

    /// Declared in metadata but no matching file on disk
    pub missing_artifacts: BTreeSet<ArtifactType>,

    /// Found on disk but not declared in metadata
    pub untracked_artifacts: BTreeSet<ArtifactType>,
}

impl ComponentInfo {
    /// Whether metadata and disk disagree
    pub fn has_drift(&self) -> bool {
        !self.missing_artifacts.is_empty() || !self.untracked_artifacts.is_empty()
    }
}

/// Manages a library root of component directories
pub struct LibraryManager {
    config: LibraryConfig,
    converter: Box<dyn Converter>,
}

impl LibraryManager {
    /// Create a manager over `config.root` using `converter` for fetches
    pub fn new(config: LibraryConfig, converter: Box<dyn Converter>) -> Self {
        Self { config, converter }
    }

    /// Library root directory
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// The converter used for fetches
    pub fn converter(&self) -> &dyn Converter {
        self.converter.as_ref()
    }

    /// Download a component (or more artifacts of one) into the library
    pub async fn fetch(
        &self,
        identifier: &str,
        selector: ArtifactSelector,
    ) -> Result<FetchOutcome, LibraryError> {
        let id = ComponentId::parse(identifier)?;
        info!(identifier = %id, artifacts = %selector, "Getting component");

        let root = self.root();
        fs::create_dir_all(root)
            .await
            .map_err(|e| LibraryError::filesystem("create library directory", root, e))?;

        let dir = id.dir_in(root);
        let previous = self.existing_metadata(&id, &dir).await?;
        if previous.is_some() {
            debug!(identifier = %id, "Component exists, updating in place");
        }

        let staging = tempfile::Builder::new()
            .prefix(paths::STAGING_PREFIX)
            .tempdir_in(root)
            .map_err(|e| LibraryError::filesystem("create staging directory in", root, e))?;

        self.convert_into(&id, selector, staging.path()).await?;

        if previous.is_some() {
            let carried = copy_missing(&dir, staging.path()).await.map_err(|e| {
                LibraryError::filesystem("carry over existing files from", &dir, e)
            })?;
            debug!(identifier = %id, files = ?carried, "Carried over existing files");
        }

        // Record what is actually staged, carried-over files included
        let staged = list_files(staging.path())
            .await
            .map_err(|e| LibraryError::filesystem("read staging directory", staging.path(), e))?;
        let present = artifact_types_in(&staged);

        let metadata = match &previous {
            Some(prev) => prev.refreshed(present),
            None => ComponentMetadata::new(id.clone(), present),
        };
        metadata
            .save(staging.path())
            .map_err(|e| LibraryError::filesystem("write metadata in", staging.path(), e))?;

        self.commit(&id, staging, &dir).await?;

        info!(
            identifier = %id,
            artifacts = %join_types(&metadata.artifact_types),
            "Component stored"
        );

        Ok(FetchOutcome {
            metadata,
            requested: selector,
            path: dir,
            updated: previous.is_some(),
        })
    }

    /// Enumerate the library in identifier order
    pub async fn list_components(&self, verbose: bool) -> Result<Vec<ListEntry>, LibraryError> {
        let root = self.root();
        let mut entries = match fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(root = %root.display(), "Library directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(LibraryError::filesystem("read library directory", root, e)),
        };

        let mut listed = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LibraryError::filesystem("read library directory", root, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_hidden(&name) {
                continue;
            }
            match entry.file_type().await {
                Ok(file_type) if file_type.is_dir() => {}
                Ok(_) => continue,
                Err(e) => {
                    warn!(entry = %name, error = %e, "Skipping unreadable library entry");
                    continue;
                }
            }

            let listed_entry = self.describe(name, &entry.path(), verbose).await;
            if let ListEntry::Orphaned(ref orphan) = listed_entry {
                warn!(entry = %orphan.name, reason = %orphan.reason, "Orphaned library entry");
            }
            listed.push(listed_entry);
        }

        listed.sort_by(|a, b| a.name().cmp(b.name()));
        info!(count = listed.len(), "Listed library");
        Ok(listed)
    }

    /// Metadata plus a live view of the files on disk
    pub async fn get_info(&self, identifier: &str) -> Result<ComponentInfo, LibraryError> {
        let id = ComponentId::parse(identifier)?;
        let dir = id.dir_in(self.root());

        if !self.component_exists(&dir).await? {
            return Err(LibraryError::NotFound(id));
        }

        let metadata = self.load_checked(&id, &dir).await?;
        let files = list_files(&dir)
            .await
            .map_err(|e| LibraryError::filesystem("read component directory", &dir, e))?;

        let present = artifact_types_in(&files);
        let missing_artifacts = metadata
            .artifact_types
            .difference(&present)
            .copied()
            .collect();
        let untracked_artifacts = present
            .difference(&metadata.artifact_types)
            .copied()
            .collect();

        Ok(ComponentInfo {
            metadata,
            path: dir,
            files,
            missing_artifacts,
            untracked_artifacts,
        })
    }

    /// Remove a component directory.
    ///
    /// Confirmation is the caller's job; `force` is recorded in the log only.
    pub async fn delete(&self, identifier: &str, force: bool) -> Result<(), LibraryError> {
        let id = ComponentId::parse(identifier)?;
        let dir = id.dir_in(self.root());

        if !self.component_exists(&dir).await? {
            warn!(identifier = %id, "Component not found in library");
            return Err(LibraryError::NotFound(id));
        }

        info!(identifier = %id, force, "Deleting component");

        let holder = self.move_aside(&id, &dir).await?;
        let leftover = holder.path().to_path_buf();
        holder.close().map_err(|e| {
            error!(
                identifier = %id,
                leftover = %leftover.display(),
                error = %e,
                "Component moved out of the library but not fully removed"
            );
            LibraryError::filesystem("remove", leftover, e)
        })?;

        info!(identifier = %id, "Component deleted");
        Ok(())
    }

    async fn component_exists(&self, dir: &Path) -> Result<bool, LibraryError> {
        is_real_dir(dir)
            .await
            .map_err(|e| LibraryError::filesystem("inspect", dir, e))
    }

    /// Metadata of an existing component, or `None` if there is none
    async fn existing_metadata(
        &self,
        id: &ComponentId,
        dir: &Path,
    ) -> Result<Option<ComponentMetadata>, LibraryError> {
        match fs::symlink_metadata(dir).await {
            Ok(meta) if meta.is_dir() => self.load_checked(id, dir).await.map(Some),
            Ok(_) => Err(LibraryError::filesystem(
                "replace",
                dir,
                std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "entry exists and is not a directory",
                ),
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LibraryError::filesystem("inspect", dir, e)),
        }
    }

    /// Load metadata; I/O failures are filesystem errors, anything else is corrupt
    async fn load_checked(
        &self,
        id: &ComponentId,
        dir: &Path,
    ) -> Result<ComponentMetadata, LibraryError> {
        let metadata = ComponentMetadata::load(dir).await.map_err(|e| match e {
            MetadataError::Unreadable(source) => {
                LibraryError::filesystem("read", dir.join(paths::METADATA_FILE), source)
            }
            other => LibraryError::CorruptMetadata {
                identifier: id.clone(),
                detail: other.to_string(),
            },
        })?;

        if &metadata.identifier != id {
            return Err(LibraryError::CorruptMetadata {
                identifier: id.clone(),
                detail: format!("metadata records identifier {}", metadata.identifier),
            });
        }

        Ok(metadata)
    }

    /// Run the converter into `output_dir` and check it produced what was asked
    async fn convert_into(
        &self,
        id: &ComponentId,
        selector: ArtifactSelector,
        output_dir: &Path,
    ) -> Result<(), LibraryError> {
        let request = ConversionRequest {
            identifier: id,
            selector,
            output_dir,
        };
        let failed = |source: ConversionError| {
            error!(identifier = %id, error = %source, "Component download failed");
            LibraryError::ConversionFailed {
                identifier: id.clone(),
                source,
            }
        };

        let limit = self.config.converter_timeout;
        let output = tokio::time::timeout(limit, self.converter.convert(request, limit))
            .await
            .map_err(|_| failed(ConversionError::TimedOut(limit)))?
            .map_err(failed)?;
        debug!(converter = self.converter.name(), log = %output.log.trim(), "Conversion finished");

        let produced = list_files(output_dir)
            .await
            .map_err(|e| LibraryError::filesystem("read staging directory", output_dir, e))?;
        let produced_types = artifact_types_in(&produced);

        match selector.types().difference(&produced_types).next() {
            Some(missing) => Err(failed(ConversionError::MissingOutput(*missing))),
            None => Ok(()),
        }
    }

    /// Replace `dir` with the staged directory
    async fn commit(
        &self,
        id: &ComponentId,
        staging: TempDir,
        dir: &Path,
    ) -> Result<(), LibraryError> {
        let holder = if self.component_exists(dir).await? {
            Some(self.move_aside(id, dir).await?)
        } else {
            None
        };

        if let Err(e) = fs::rename(staging.path(), dir).await {
            if let Some(holder) = &holder {
                let held = holder.path().join(id.as_str());
                if let Err(restore) = fs::rename(&held, dir).await {
                    error!(
                        identifier = %id,
                        held = %held.display(),
                        error = %restore,
                        "Failed to restore previous component"
                    );
                }
            }
            return Err(LibraryError::filesystem("move staged component to", dir, e));
        }

        // The staging path no longer exists, so dropping the guard removes nothing
        drop(staging);

        if let Some(holder) = holder {
            let leftover = holder.path().to_path_buf();
            if let Err(e) = holder.close() {
                warn!(
                    leftover = %leftover.display(),
                    error = %e,
                    "Failed to remove previous component copy"
                );
            }
        }

        Ok(())
    }

    /// Move `dir` into a fresh hidden holder directory in the root
    async fn move_aside(&self, id: &ComponentId, dir: &Path) -> Result<TempDir, LibraryError> {
        let root = self.root();
        let holder = tempfile::Builder::new()
            .prefix(paths::TRASH_PREFIX)
            .tempdir_in(root)
            .map_err(|e| LibraryError::filesystem("create holding directory in", root, e))?;

        fs::rename(dir, holder.path().join(id.as_str()))
            .await
            .map_err(|e| LibraryError::filesystem("move aside", dir, e))?;

        Ok(holder)
    }

    /// Build the listing record for one directory
    async fn describe(&self, name: String, dir: &Path, verbose: bool) -> ListEntry {
        let files = match list_files(dir).await {
            Ok(files) => files,
            Err(e) => {
                return ListEntry::Orphaned(OrphanedEntry {
                    name,
                    reason: OrphanReason::Unreadable(e.to_string()),
                    file_count: 0,
                })
            }
        };
        let file_count = files.len();
        let orphan = |name: String, reason| {
            ListEntry::Orphaned(OrphanedEntry {
                name,
                reason,
                file_count,
            })
        };

        let id = match ComponentId::parse(&name) {
            Ok(id) => id,
            Err(_) => return orphan(name, OrphanReason::InvalidName),
        };

        let metadata = match ComponentMetadata::load(dir).await {
            Ok(metadata) if metadata.identifier == id => metadata,
            Ok(metadata) => {
                let detail = format!("metadata records identifier {}", metadata.identifier);
                return orphan(name, OrphanReason::CorruptMetadata(detail));
            }
            Err(MetadataError::Missing) => return orphan(name, OrphanReason::MissingMetadata),
            Err(MetadataError::Unreadable(e)) => {
                return orphan(name, OrphanReason::Unreadable(e.to_string()))
            }
            Err(e) => return orphan(name, OrphanReason::CorruptMetadata(e.to_string())),
        };

        ListEntry::Component(ComponentSummary {
            identifier: id,
            artifact_types: metadata.artifact_types,
            file_count,
            created_at: verbose.then_some(metadata.created_at),
            updated_at: verbose.then_some(metadata.updated_at),
            files: verbose.then_some(files),
        })
    }
}
