//! Catalog content sources
//!
//! - [`DirectoryContentSource`]: a local directory laid out like a
//!   repository root, e.g. a checkout of the templates repository
//! - [`RepositoryContentSource`]: a template repository read through the
//!   hosting port, with an in-memory cache so every file is fetched once
//!   per run regardless of how many repositories receive it

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::RwLock;
use tracing::debug;

use govsync_core::domain::{RepoPath, RepositoryId};
use govsync_core::ports::{ICatalogContentSource, IHostingPlatform};

// ============================================================================
// DirectoryContentSource
// ============================================================================

/// Reads canonical files from a local directory
#[derive(Debug, Clone)]
pub struct DirectoryContentSource {
    root: PathBuf,
}

impl DirectoryContentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait::async_trait]
impl ICatalogContentSource for DirectoryContentSource {
    async fn fetch(&self, path: &RepoPath) -> Result<Vec<u8>> {
        // RepoPath is relative and free of `..`, so the join stays under root
        let full = path
            .as_str()
            .split('/')
            .fold(self.root.clone(), |acc, segment| acc.join(segment));
        tokio::fs::read(&full)
            .await
            .with_context(|| format!("failed to read template {}", full.display()))
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

// ============================================================================
// RepositoryContentSource
// ============================================================================

/// Reads canonical files from a template repository on the hosting platform
pub struct RepositoryContentSource {
    platform: Arc<dyn IHostingPlatform>,
    repository: RepositoryId,
    cache: RwLock<BTreeMap<RepoPath, Arc<Vec<u8>>>>,
}

impl RepositoryContentSource {
    pub fn new(platform: Arc<dyn IHostingPlatform>, repository: RepositoryId) -> Self {
        Self {
            platform,
            repository,
            cache: RwLock::new(BTreeMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl ICatalogContentSource for RepositoryContentSource {
    async fn fetch(&self, path: &RepoPath) -> Result<Vec<u8>> {
        if let Some(bytes) = self.cache.read().await.get(path) {
            return Ok(bytes.as_ref().clone());
        }

        let bytes = self
            .platform
            .read_file(&self.repository, path)
            .await?
            .with_context(|| format!("{path} is missing from template repository {}", self.repository))?;
        debug!(%path, template = %self.repository, bytes = bytes.len(), "Fetched template");

        self.cache
            .write()
            .await
            .insert(path.clone(), Arc::new(bytes.clone()));
        Ok(bytes)
    }

    fn describe(&self) -> String {
        self.repository.to_string()
    }
}
