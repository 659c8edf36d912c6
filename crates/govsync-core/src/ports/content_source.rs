//! Catalog content source port
//!
//! Governed files are opaque payloads to the engine. This port supplies
//! the canonical bytes for a catalog path.

use crate::domain::newtypes::RepoPath;

/// Supplies canonical content for catalog paths
#[async_trait::async_trait]
pub trait ICatalogContentSource: Send + Sync {
    /// Fetches the canonical content of `path`
    async fn fetch(&self, path: &RepoPath) -> anyhow::Result<Vec<u8>>;

    /// Short description used in logs, e.g. a directory or repository name
    fn describe(&self) -> String;
}
