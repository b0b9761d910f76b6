//! Library Manager Integration Tests
//!
//! Exercises fetch/list/info/delete against a temporary library root with a
//! scripted in-process converter.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kicad_lib::{
    ArtifactSelector, ArtifactType, ConversionError, ConversionRequest, Converter,
    ConverterOutput, ErrorKind, LibraryConfig, LibraryError, LibraryManager, ListEntry,
    OrphanReason,
};
use tempfile::TempDir;

/// What the scripted converter does when invoked
#[derive(Debug, Clone, Copy)]
enum Behaviour {
    /// Write the requested artifacts
    Produce,
    /// Exit with diagnostics
    Fail(&'static str),
    /// Report success without writing anything
    ProduceNothing,
    /// Write some files, then fail
    FailHalfway,
    /// Never return
    Hang,
}

struct ScriptedConverter {
    behaviour: Behaviour,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Converter for ScriptedConverter {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn convert(
        &self,
        request: ConversionRequest<'_>,
        _timeout: Duration,
    ) -> Result<ConverterOutput, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match self.behaviour {
            Behaviour::Produce => {
                write_artifacts(&request);
                Ok(ConverterOutput::new("ok"))
            }
            Behaviour::Fail(diagnostics) => Err(ConversionError::Failed {
                exit_code: 1,
                diagnostics: diagnostics.to_string(),
            }),
            Behaviour::ProduceNothing => Ok(ConverterOutput::default()),
            Behaviour::FailHalfway => {
                write_artifacts(&request);
                Err(ConversionError::Failed {
                    exit_code: 2,
                    diagnostics: "connection reset".to_string(),
                })
            }
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(ConverterOutput::default())
            }
        }
    }

    async fn version(&self) -> Result<String, ConversionError> {
        Ok("scripted 1.0".to_string())
    }
}

/// Mimic easyeda2kicad's output layout
fn write_artifacts(request: &ConversionRequest<'_>) {
    let id = request.identifier.as_str();
    if request.selector.includes(ArtifactType::Symbol) {
        std::fs::write(
            request.output_dir.join(format!("{}.kicad_sym", id)),
            format!("(kicad_symbol_lib {})", id),
        )
        .unwrap();
    }
    if request.selector.includes(ArtifactType::Footprint) {
        let pretty = request.output_dir.join(format!("{}.pretty", id));
        std::fs::create_dir_all(&pretty).unwrap();
        std::fs::write(pretty.join("SOT-23.kicad_mod"), "(footprint SOT-23)").unwrap();
    }
}

struct TestLibrary {
    _temp: TempDir,
    root: PathBuf,
    calls: Arc<AtomicUsize>,
}

impl TestLibrary {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("library");
        Self {
            _temp: temp,
            root,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn manager(&self, behaviour: Behaviour) -> LibraryManager {
        let config =
            LibraryConfig::new(&self.root).with_converter_timeout(Duration::from_millis(200));
        LibraryManager::new(
            config,
            Box::new(ScriptedConverter {
                behaviour,
                calls: Arc::clone(&self.calls),
            }),
        )
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every entry name directly under the root, hidden ones included
    fn root_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    fn component_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }
}

fn types(selector: ArtifactSelector) -> BTreeSet<ArtifactType> {
    selector.types()
}

fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut out = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current).unwrap() {
            let entry = entry.unwrap();
            if entry.file_type().unwrap().is_dir() {
                pending.push(entry.path());
            } else {
                let rel = entry.path().strip_prefix(dir).unwrap().display().to_string();
                out.push((rel, std::fs::read(entry.path()).unwrap()));
            }
        }
    }
    out.sort();
    out
}

// ============================================================================
// fetch
// ============================================================================

#[tokio::test]
async fn test_fetch_then_info_has_requested_types() {
    for selector in [
        ArtifactSelector::Symbol,
        ArtifactSelector::Footprint,
        ArtifactSelector::Both,
    ] {
        let lib = TestLibrary::new();
        let manager = lib.manager(Behaviour::Produce);

        let outcome = manager.fetch("C2040", selector).await.unwrap();
        assert!(!outcome.updated);
        assert_eq!(outcome.path, lib.component_dir("C2040"));

        let info = manager.get_info("C2040").await.unwrap();
        assert!(info.metadata.artifact_types.is_superset(&types(selector)));
        assert!(!info.has_drift());
    }
}

#[tokio::test]
async fn test_fetch_footprint_then_symbol_unions_types() {
    let lib = TestLibrary::new();
    let manager = lib.manager(Behaviour::Produce);

    manager
        .fetch("C12345", ArtifactSelector::Footprint)
        .await
        .unwrap();
    let info = manager.get_info("C12345").await.unwrap();
    assert_eq!(info.metadata.artifact_types, types(ArtifactSelector::Footprint));

    let outcome = manager.fetch("C12345", ArtifactSelector::Symbol).await.unwrap();
    assert!(outcome.updated);

    let info = manager.get_info("C12345").await.unwrap();
    assert_eq!(info.metadata.artifact_types, types(ArtifactSelector::Both));

    // The footprint from the first fetch survived the second
    assert_eq!(
        info.files,
        vec!["C12345.kicad_sym", "C12345.pretty/SOT-23.kicad_mod"]
    );
}

#[tokio::test]
async fn test_fetch_both_twice_is_idempotent() {
    let lib = TestLibrary::new();
    let manager = lib.manager(Behaviour::Produce);

    let first = manager.fetch("C2040", ArtifactSelector::Both).await.unwrap();
    let second = manager.fetch("C2040", ArtifactSelector::Both).await.unwrap();

    assert_eq!(lib.root_entries(), vec!["C2040"]);
    assert_eq!(second.metadata.artifact_types, types(ArtifactSelector::Both));
    assert_eq!(second.metadata.created_at, first.metadata.created_at);
    assert!(second.metadata.updated_at >= first.metadata.updated_at);

    let entries = manager.list_components(false).await.unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_refetch_records_only_types_on_disk() {
    let lib = TestLibrary::new();
    let manager = lib.manager(Behaviour::Produce);
    manager.fetch("C1", ArtifactSelector::Footprint).await.unwrap();

    // Footprint removed by hand before the next fetch
    std::fs::remove_dir_all(lib.component_dir("C1").join("C1.pretty")).unwrap();

    let outcome = manager.fetch("C1", ArtifactSelector::Symbol).await.unwrap();
    assert_eq!(outcome.metadata.artifact_types, types(ArtifactSelector::Symbol));

    let info = manager.get_info("C1").await.unwrap();
    assert_eq!(info.metadata.artifact_types, types(ArtifactSelector::Symbol));
    assert_eq!(info.files, vec!["C1.kicad_sym"]);
    assert!(!info.has_drift());
}

#[tokio::test]
async fn test_fetch_writes_metadata_schema() {
    let lib = TestLibrary::new();
    let manager = lib.manager(Behaviour::Produce);
    manager.fetch("C2040", ArtifactSelector::Both).await.unwrap();

    let raw = std::fs::read_to_string(lib.component_dir("C2040").join("metadata.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();

    assert_eq!(json["identifier"], "C2040");
    assert_eq!(json["artifact_types"], serde_json::json!(["symbol", "footprint"]));
    assert!(json["created_at"].is_string());
    assert!(json["updated_at"].is_string());
}

#[tokio::test]
async fn test_fetch_rejects_traversal_before_touching_disk() {
    let lib = TestLibrary::new();
    let manager = lib.manager(Behaviour::Produce);

    for bad in ["../etc", ".git", "a/b", "", "-rf"] {
        let err = manager.fetch(bad, ArtifactSelector::Both).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidIdentifier, "{bad:?}");
    }

    assert_eq!(lib.calls(), 0);
    assert!(!lib.root.exists(), "library root must not be created");
}

#[tokio::test]
async fn test_fetch_creates_missing_root() {
    let lib = TestLibrary::new();
    assert!(!lib.root.exists());

    lib.manager(Behaviour::Produce)
        .fetch("C2040", ArtifactSelector::Symbol)
        .await
        .unwrap();
    assert!(lib.component_dir("C2040").is_dir());
}

#[tokio::test]
async fn test_converter_failure_leaves_nothing_behind() {
    let lib = TestLibrary::new();
    let manager = lib.manager(Behaviour::Fail("LCSC part C99999 not found"));

    let err = manager.fetch("C99999", ArtifactSelector::Both).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConversionFailed);
    assert!(err.to_string().contains("LCSC part C99999 not found"));
    assert!(lib.root_entries().is_empty(), "got {:?}", lib.root_entries());
}

#[tokio::test]
async fn test_partial_conversion_is_discarded() {
    let lib = TestLibrary::new();
    let manager = lib.manager(Behaviour::FailHalfway);

    let err = manager.fetch("C2040", ArtifactSelector::Both).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConversionFailed);
    assert!(lib.root_entries().is_empty());
}

#[tokio::test]
async fn test_converter_failure_keeps_existing_component() {
    let lib = TestLibrary::new();
    lib.manager(Behaviour::Produce)
        .fetch("C2040", ArtifactSelector::Footprint)
        .await
        .unwrap();
    let before = snapshot(&lib.component_dir("C2040"));

    let err = lib
        .manager(Behaviour::FailHalfway)
        .fetch("C2040", ArtifactSelector::Symbol)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConversionFailed);
    assert_eq!(snapshot(&lib.component_dir("C2040")), before);
    assert_eq!(lib.root_entries(), vec!["C2040"]);
}

#[tokio::test]
async fn test_success_without_output_is_a_conversion_failure() {
    let lib = TestLibrary::new();
    let manager = lib.manager(Behaviour::ProduceNothing);

    let err = manager.fetch("C2040", ArtifactSelector::Footprint).await.unwrap_err();

    match err {
        LibraryError::ConversionFailed {
            source: ConversionError::MissingOutput(ArtifactType::Footprint),
            ..
        } => {}
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(lib.root_entries().is_empty());
}

#[tokio::test]
async fn test_hanging_converter_times_out() {
    let lib = TestLibrary::new();
    let manager = lib.manager(Behaviour::Hang);

    let started = std::time::Instant::now();
    let err = manager.fetch("C2040", ArtifactSelector::Both).await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(10));
    match err {
        LibraryError::ConversionFailed {
            source: ConversionError::TimedOut(limit),
            ..
        } => assert_eq!(limit, Duration::from_millis(200)),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(lib.root_entries().is_empty());
}

#[tokio::test]
async fn test_fetch_refuses_corrupt_existing_component() {
    let lib = TestLibrary::new();
    let dir = lib.component_dir("C2040");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("C2040.kicad_sym"), "hand made").unwrap();

    let err = lib
        .manager(Behaviour::Produce)
        .fetch("C2040", ArtifactSelector::Both)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CorruptMetadata);
    assert_eq!(lib.calls(), 0);
    assert_eq!(
        std::fs::read_to_string(dir.join("C2040.kicad_sym")).unwrap(),
        "hand made"
    );
}

// ============================================================================
// list_components
// ============================================================================

#[tokio::test]
async fn test_list_missing_or_empty_root() {
    let lib = TestLibrary::new();
    let manager = lib.manager(Behaviour::Produce);

    assert!(manager.list_components(false).await.unwrap().is_empty());

    std::fs::create_dir_all(&lib.root).unwrap();
    assert!(manager.list_components(true).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_is_lexically_ordered() {
    let lib = TestLibrary::new();
    let manager = lib.manager(Behaviour::Produce);

    for id in ["C3", "C20", "C1", "B7"] {
        manager.fetch(id, ArtifactSelector::Symbol).await.unwrap();
    }

    for _ in 0..3 {
        let names: Vec<String> = manager
            .list_components(false)
            .await
            .unwrap()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["B7", "C1", "C20", "C3"]);
    }
}

#[tokio::test]
async fn test_list_reports_orphans_without_aborting() {
    let lib = TestLibrary::new();
    let manager = lib.manager(Behaviour::Produce);
    manager.fetch("C1", ArtifactSelector::Both).await.unwrap();
    manager.fetch("C3", ArtifactSelector::Symbol).await.unwrap();

    // No metadata
    std::fs::create_dir_all(lib.component_dir("C2")).unwrap();
    // Corrupt metadata
    std::fs::create_dir_all(lib.component_dir("C4")).unwrap();
    std::fs::write(lib.component_dir("C4").join("metadata.json"), "{not json").unwrap();
    // Not an identifier
    std::fs::create_dir_all(lib.root.join("my part")).unwrap();
    // Ignored: hidden entries and plain files
    std::fs::create_dir_all(lib.root.join(".git")).unwrap();
    std::fs::write(lib.root.join("README.md"), "parts").unwrap();

    let entries = manager.list_components(false).await.unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["C1", "C2", "C3", "C4", "my part"]);

    assert!(matches!(entries[0], ListEntry::Component(_)));
    assert!(matches!(entries[2], ListEntry::Component(_)));

    let reason = |i: usize| match &entries[i] {
        ListEntry::Orphaned(o) => o.reason.clone(),
        other => panic!("expected orphan, got {other:?}"),
    };
    assert_eq!(reason(1), OrphanReason::MissingMetadata);
    assert!(matches!(reason(3), OrphanReason::CorruptMetadata(_)));
    assert_eq!(reason(4), OrphanReason::InvalidName);
}

#[tokio::test]
async fn test_list_flags_mismatched_identifier() {
    let lib = TestLibrary::new();
    let manager = lib.manager(Behaviour::Produce);
    manager.fetch("C1", ArtifactSelector::Symbol).await.unwrap();

    // Copy a component under another name
    std::fs::create_dir_all(lib.component_dir("C9")).unwrap();
    std::fs::copy(
        lib.component_dir("C1").join("metadata.json"),
        lib.component_dir("C9").join("metadata.json"),
    )
    .unwrap();

    let entries = manager.list_components(false).await.unwrap();
    assert!(matches!(
        &entries[1],
        ListEntry::Orphaned(o) if matches!(o.reason, OrphanReason::CorruptMetadata(_))
    ));
    assert_eq!(
        manager.get_info("C9").await.unwrap_err().kind(),
        ErrorKind::CorruptMetadata
    );
}

#[tokio::test]
async fn test_list_verbose_adds_details() {
    let lib = TestLibrary::new();
    let manager = lib.manager(Behaviour::Produce);
    manager.fetch("C1", ArtifactSelector::Both).await.unwrap();

    let brief = manager.list_components(false).await.unwrap();
    let ListEntry::Component(ref summary) = brief[0] else {
        panic!("expected component");
    };
    assert_eq!(summary.file_count, 2);
    assert!(summary.created_at.is_none());
    assert!(summary.files.is_none());

    let verbose = manager.list_components(true).await.unwrap();
    let ListEntry::Component(ref summary) = verbose[0] else {
        panic!("expected component");
    };
    assert!(summary.created_at.is_some());
    assert!(summary.updated_at.is_some());
    assert_eq!(
        summary.files.as_deref(),
        Some(&["C1.kicad_sym".to_string(), "C1.pretty/SOT-23.kicad_mod".to_string()][..])
    );
}

// ============================================================================
// get_info
// ============================================================================

#[tokio::test]
async fn test_info_not_found_and_invalid() {
    let lib = TestLibrary::new();
    let manager = lib.manager(Behaviour::Produce);

    assert_eq!(
        manager.get_info("C404").await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        manager.get_info("../C404").await.unwrap_err().kind(),
        ErrorKind::InvalidIdentifier
    );
}

#[tokio::test]
async fn test_info_on_directory_without_metadata() {
    let lib = TestLibrary::new();
    std::fs::create_dir_all(lib.component_dir("C2")).unwrap();

    let err = lib.manager(Behaviour::Produce).get_info("C2").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptMetadata);
}

#[tokio::test]
async fn test_info_reports_drift() {
    let lib = TestLibrary::new();
    let manager = lib.manager(Behaviour::Produce);
    manager.fetch("C1", ArtifactSelector::Footprint).await.unwrap();

    // Footprint removed by hand, symbol added by hand
    std::fs::remove_dir_all(lib.component_dir("C1").join("C1.pretty")).unwrap();
    std::fs::write(lib.component_dir("C1").join("C1.kicad_sym"), "manual").unwrap();

    let info = manager.get_info("C1").await.unwrap();
    assert!(info.has_drift());
    assert_eq!(info.missing_artifacts, BTreeSet::from([ArtifactType::Footprint]));
    assert_eq!(info.untracked_artifacts, BTreeSet::from([ArtifactType::Symbol]));
    assert_eq!(info.files, vec!["C1.kicad_sym"]);
}

// ============================================================================
// delete
// ============================================================================

#[tokio::test]
async fn test_delete_then_info_is_not_found() {
    let lib = TestLibrary::new();
    let manager = lib.manager(Behaviour::Produce);
    manager.fetch("C1", ArtifactSelector::Both).await.unwrap();
    manager.fetch("C2", ArtifactSelector::Both).await.unwrap();

    manager.delete("C1", true).await.unwrap();

    assert_eq!(
        manager.get_info("C1").await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(lib.root_entries(), vec!["C2"]);
}

#[tokio::test]
async fn test_delete_missing_component() {
    let lib = TestLibrary::new();
    let manager = lib.manager(Behaviour::Produce);

    let err = manager.delete("C1", false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = manager.delete("..", true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);
}

#[tokio::test]
async fn test_delete_removes_orphaned_directory() {
    let lib = TestLibrary::new();
    let manager = lib.manager(Behaviour::Produce);
    std::fs::create_dir_all(lib.component_dir("C2").join("nested")).unwrap();
    std::fs::write(lib.component_dir("C2").join("nested").join("x"), "x").unwrap();

    manager.delete("C2", false).await.unwrap();

    assert!(lib.root_entries().is_empty());
}

#[tokio::test]
async fn test_delete_then_fetch_again() {
    let lib = TestLibrary::new();
    let manager = lib.manager(Behaviour::Produce);
    manager.fetch("C1", ArtifactSelector::Both).await.unwrap();
    manager.delete("C1", true).await.unwrap();

    let outcome = manager.fetch("C1", ArtifactSelector::Symbol).await.unwrap();
    assert!(!outcome.updated);
    assert_eq!(outcome.metadata.artifact_types, types(ArtifactSelector::Symbol));
}

// ============================================================================
// filesystem errors
// ============================================================================

#[tokio::test]
async fn test_fetch_with_root_that_is_a_file() {
    let lib = TestLibrary::new();
    std::fs::write(&lib.root, "not a directory").unwrap();

    let err = lib
        .manager(Behaviour::Produce)
        .fetch("C1", ArtifactSelector::Both)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::FilesystemError);
    assert!(err.to_string().contains("create library directory"));
    assert_eq!(lib.calls(), 0);
    assert_eq!(std::fs::read_to_string(&lib.root).unwrap(), "not a directory");
}

#[tokio::test]
async fn test_fetch_will_not_replace_a_plain_file() {
    let lib = TestLibrary::new();
    std::fs::create_dir_all(&lib.root).unwrap();
    std::fs::write(lib.component_dir("C1"), "notes").unwrap();

    let err = lib
        .manager(Behaviour::Produce)
        .fetch("C1", ArtifactSelector::Both)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::FilesystemError);
    assert_eq!(lib.calls(), 0);
    assert_eq!(lib.root_entries(), vec!["C1"]);
    assert_eq!(
        std::fs::read_to_string(lib.component_dir("C1")).unwrap(),
        "notes"
    );
}

#[tokio::test]
async fn test_unreadable_metadata_is_a_filesystem_error() {
    let lib = TestLibrary::new();
    let manager = lib.manager(Behaviour::Produce);

    // A directory where the metadata file should be cannot be read as a file
    std::fs::create_dir_all(lib.component_dir("C1").join("metadata.json")).unwrap();

    let err = manager.get_info("C1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FilesystemError);
    assert!(err.to_string().contains("metadata.json"));

    let err = manager.fetch("C1", ArtifactSelector::Symbol).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FilesystemError);
    assert_eq!(lib.calls(), 0);

    let entries = manager.list_components(false).await.unwrap();
    assert!(matches!(
        &entries[0],
        ListEntry::Orphaned(o) if matches!(o.reason, OrphanReason::Unreadable(_))
    ));
}
