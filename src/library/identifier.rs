//! Component identifiers.
//!
//! An identifier names a part in the external catalog (usually an LCSC part
//! number such as `C12345`) and doubles as the component's directory name
//! under the library root. Validation happens before any path is built from
//! it, so a `ComponentId` is always safe to `join` onto the root.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::LibraryError;

/// Shortest accepted identifier
pub const MIN_LEN: usize = 2;

/// Longest accepted identifier
pub const MAX_LEN: usize = 64;

/// Validated component identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComponentId(String);

impl ComponentId {
    /// Validate a raw identifier.
    ///
    /// Accepts ASCII letters, digits, `-` and `_`, between [`MIN_LEN`] and
    /// [`MAX_LEN`] characters, starting with a letter or digit.
    pub fn parse(raw: &str) -> Result<Self, LibraryError> {
        let reject = |reason: &'static str| LibraryError::InvalidIdentifier {
            identifier: raw.to_string(),
            reason,
        };

        if raw.len() < MIN_LEN {
            return Err(reject("must be at least 2 characters"));
        }
        if raw.len() > MAX_LEN {
            return Err(reject("must be at most 64 characters"));
        }

        let mut chars = raw.chars();
        // Leading '-' would be read as a flag by the converter
        if !chars.next().is_some_and(|c| c.is_ascii_alphanumeric()) {
            return Err(reject("must start with a letter or digit"));
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(reject(
                "may only contain ASCII letters, digits, '-' and '_'",
            ));
        }

        Ok(Self(raw.to_string()))
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory for this component under `root`
    pub fn dir_in(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ComponentId {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ComponentId {
    type Error = LibraryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ComponentId> for String {
    fn from(id: ComponentId) -> Self {
        id.0
    }
}

impl AsRef<str> for ComponentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
