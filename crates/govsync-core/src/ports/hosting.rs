//! Hosting platform port (driven/secondary port)
//!
//! This module defines the narrow interface the engine needs from a
//! source-control hosting platform: discover repositories and read, write
//! and delete single files on the target branch.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific
//!   and don't need domain-level classification.
//! - Uses `#[async_trait]` for async trait methods.
//! - Implementations are shared across concurrent repository sessions and
//!   must enforce their own rate limits.

use serde::{Deserialize, Serialize};

use crate::domain::newtypes::{RepoPath, RepositoryId};

/// Repository metadata returned by discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub id: RepositoryId,
    pub default_branch: String,
    pub archived: bool,
}

/// Hosting platform port
///
/// All file operations address the branch configured on the adapter, or
/// the repository's default branch when none is configured.
#[async_trait::async_trait]
pub trait IHostingPlatform: Send + Sync {
    /// Lists every repository owned by `organization`
    async fn list_repositories(&self, organization: &str) -> anyhow::Result<Vec<RepositoryInfo>>;

    /// Looks up a single repository
    async fn get_repository(&self, repository: &RepositoryId) -> anyhow::Result<RepositoryInfo>;

    /// Reads a file, returning `None` if it does not exist
    async fn read_file(
        &self,
        repository: &RepositoryId,
        path: &RepoPath,
    ) -> anyhow::Result<Option<Vec<u8>>>;

    /// Returns true if `path` exists in the repository
    async fn file_exists(&self, repository: &RepositoryId, path: &RepoPath)
        -> anyhow::Result<bool>;

    /// Creates or unconditionally overwrites a file
    ///
    /// # Arguments
    /// * `content` - Raw bytes to store
    /// * `message` - Commit message for the change
    async fn write_file(
        &self,
        repository: &RepositoryId,
        path: &RepoPath,
        content: &[u8],
        message: &str,
    ) -> anyhow::Result<()>;

    /// Deletes a file
    ///
    /// # Returns
    /// `true` if a file was deleted, `false` if it was already absent
    async fn delete_file(
        &self,
        repository: &RepositoryId,
        path: &RepoPath,
        message: &str,
    ) -> anyhow::Result<bool>;
}
