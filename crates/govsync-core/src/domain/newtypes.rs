//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// UUID-based ID types
// ============================================================================

/// Identifier for SyncSession entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random SessionId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a SessionId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// First eight hex digits, used in audit file names
    #[must_use]
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid SessionId: {e}")))
    }
}

// ============================================================================
// Repository identity
// ============================================================================

/// A hosted repository, identified as `owner/name`
///
/// Ordering is lexicographic on `owner/name`, which is the order used for
/// the final run report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryId {
    owner: String,
    name: String,
}

impl RepositoryId {
    /// Create a new RepositoryId
    ///
    /// # Errors
    /// Returns error if either part is empty, contains `/`, or contains whitespace
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, DomainError> {
        let owner = owner.into();
        let name = name.into();
        for part in [&owner, &name] {
            if part.is_empty() || part.contains('/') || part.chars().any(char::is_whitespace) {
                return Err(DomainError::InvalidRepository(format!("{owner}/{name}")));
            }
        }
        Ok(Self { owner, name })
    }

    /// The owning organization or user
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The repository name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Filesystem-safe form, `owner__name`
    #[must_use]
    pub fn slug(&self) -> String {
        format!("{}__{}", self.owner, self.name)
    }
}

impl Display for RepositoryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepositoryId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name)) => Self::new(owner, name),
            None => Err(DomainError::InvalidRepository(s.to_string())),
        }
    }
}

impl TryFrom<String> for RepositoryId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RepositoryId> for String {
    fn from(id: RepositoryId) -> Self {
        id.to_string()
    }
}

// ============================================================================
// Repository-relative paths
// ============================================================================

/// A path inside a repository, relative to its root
///
/// Always uses `/` separators. Construction drops `.` and empty segments
/// (`./docs//x` becomes `docs/x`) and rejects anything that could resolve
/// outside the repository: absolute paths, drive prefixes, backslashes,
/// `..` segments and control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoPath(String);

impl RepoPath {
    /// Create a new RepoPath
    ///
    /// # Errors
    /// Returns [`DomainError::UnsafePath`] if the path is not relative or
    /// names nothing once normalized
    pub fn new(path: impl Into<String>) -> Result<Self, DomainError> {
        let path = path.into();

        if path.trim().is_empty() {
            return Err(DomainError::UnsafePath("empty path".to_string()));
        }

        if path.starts_with('/') || path.contains('\\') {
            return Err(DomainError::UnsafePath(path));
        }

        // Windows drive prefix such as `C:`
        let bytes = path.as_bytes();
        if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
            return Err(DomainError::UnsafePath(path));
        }

        if path.chars().any(char::is_control) {
            return Err(DomainError::UnsafePath(path));
        }

        if path.split('/').any(|segment| segment == "..") {
            return Err(DomainError::UnsafePath(path));
        }

        let normalized = path
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .collect::<Vec<_>>()
            .join("/");
        if normalized.is_empty() {
            return Err(DomainError::UnsafePath(path));
        }

        Ok(Self(normalized))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the file name component
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl Display for RepoPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RepoPath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RepoPath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RepoPath> for String {
    fn from(path: RepoPath) -> Self {
        path.0
    }
}

impl AsRef<str> for RepoPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
