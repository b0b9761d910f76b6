//! Directory walking and copying for component directories.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tokio::fs;

use super::metadata::ArtifactType;
use crate::config::paths;

/// Every regular file under `dir`, as sorted `/`-separated relative paths.
///
/// The metadata record and leftover temporary files are excluded. Symlinks
/// are not followed.
pub async fn list_files(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut files = Vec::new();
    let mut pending = vec![PathBuf::new()];

    while let Some(relative) = pending.pop() {
        let mut entries = fs::read_dir(dir.join(&relative)).await?;

        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let child = relative.join(entry.file_name());

            if file_type.is_dir() {
                pending.push(child);
            } else if file_type.is_file() && !is_bookkeeping(&child) {
                files.push(to_slash(&child));
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Artifact types that have at least one matching file in `files`
pub fn artifact_types_in(files: &[String]) -> BTreeSet<ArtifactType> {
    files
        .iter()
        .filter_map(|f| ArtifactType::from_path(Path::new(f)))
        .collect()
}

/// Copy files from `src` into `dst` that `dst` does not already have.
///
/// Returns the relative paths that were copied.
pub async fn copy_missing(src: &Path, dst: &Path) -> std::io::Result<Vec<String>> {
    let mut copied = Vec::new();

    for relative in list_files(src).await? {
        let target = dst.join(&relative);
        if fs::try_exists(&target).await? {
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(src.join(&relative), &target).await?;
        copied.push(relative);
    }

    Ok(copied)
}

/// Whether `path` is a directory (not following symlinks)
pub async fn is_real_dir(path: &Path) -> std::io::Result<bool> {
    match fs::symlink_metadata(path).await {
        Ok(meta) => Ok(meta.is_dir()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Names the tool reserves for its own use
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn is_bookkeeping(relative: &Path) -> bool {
    if relative == Path::new(paths::METADATA_FILE) {
        return true;
    }
    relative
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(paths::TEMP_FILE_PREFIX))
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
