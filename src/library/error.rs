//! Error taxonomy for library operations.
//!
//! Every failure surfaced by [`LibraryManager`](super::LibraryManager) is one
//! of five kinds. The kind to exit code mapping in [`ErrorKind::exit_code`] is
//! part of the command-line contract and must not change between releases.

use std::path::PathBuf;

use thiserror::Error;

use super::identifier::ComponentId;
use crate::adapters::ConversionError;

/// Errors returned by library operations
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Invalid component ID {identifier:?}: {reason}")]
    InvalidIdentifier {
        identifier: String,
        reason: &'static str,
    },

    #[error("Component {0} not found in library")]
    NotFound(ComponentId),

    #[error("Failed to download component {identifier}: {source}")]
    ConversionFailed {
        identifier: ComponentId,
        #[source]
        source: ConversionError,
    },

    #[error("Metadata for component {identifier} is missing or corrupt: {detail}")]
    CorruptMetadata {
        identifier: ComponentId,
        detail: String,
    },

    #[error("Failed to {action} {}: {source}", .path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LibraryError {
    /// Build a filesystem error for `action` on `path`
    pub fn filesystem(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Filesystem {
            action,
            path: path.into(),
            source,
        }
    }

    /// The programmatic kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIdentifier { .. } => ErrorKind::InvalidIdentifier,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::ConversionFailed { .. } => ErrorKind::ConversionFailed,
            Self::CorruptMetadata { .. } => ErrorKind::CorruptMetadata,
            Self::Filesystem { .. } => ErrorKind::FilesystemError,
        }
    }
}

/// Fieldless discriminant of [`LibraryError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidIdentifier,
    NotFound,
    ConversionFailed,
    CorruptMetadata,
    FilesystemError,
}

impl ErrorKind {
    /// Process exit code for this kind.
    ///
    /// 0 is success, 1 is any failure outside the library, 2 is reserved for
    /// argument parsing errors.
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::InvalidIdentifier => 3,
            ErrorKind::NotFound => 4,
            ErrorKind::ConversionFailed => 5,
            ErrorKind::CorruptMetadata => 6,
            ErrorKind::FilesystemError => 7,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidIdentifier => "invalid_identifier",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ConversionFailed => "conversion_failed",
            ErrorKind::CorruptMetadata => "corrupt_metadata",
            ErrorKind::FilesystemError => "filesystem_error",
        };
        write!(f, "{}", name)
    }
}
