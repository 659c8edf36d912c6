//! SyncExecutor - applies one repository's resolution
//!
//! The executor turns decisions into file actions and then rewrites the
//! override document:
//!
//! 1. Every decision is applied in resolution order. A failed file action
//!    is recorded and the remaining decisions are still attempted.
//! 2. The override is rewritten: canonical documents get their managed
//!    lines updated in place, legacy documents are rendered to the
//!    canonical location and the legacy file is deleted. Repositories
//!    without an override are left without one.
//!
//! Dry runs record every decision as planned and touch nothing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use govsync_core::domain::{
    Decision, ErrorKind, FileAction, OpenSession, Outcome, RepoPath, RepositoryId, Resolution,
    SchemaVersion, SyncSession,
};
use govsync_core::ports::{ICatalogContentSource, IHostingPlatform};
use govsync_enforce::override_file::{render_canonical, rewrite_for_sync, CANONICAL_LOCATION};

use crate::loader::{LoadedOverride, OverrideSource};
use crate::retry::{with_retry, RetryPolicy};

/// Per-session switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub dry_run: bool,
    /// Report Required decisions as forced in audit output
    pub force_override_reporting: bool,
}

/// Applies resolved decisions through the hosting port
///
/// Holds no per-repository state, so one executor serves every worker.
pub struct SyncExecutor {
    platform: Arc<dyn IHostingPlatform>,
    content: Arc<dyn ICatalogContentSource>,
    commit_message: String,
    retry: RetryPolicy,
}

impl SyncExecutor {
    pub fn new(platform: Arc<dyn IHostingPlatform>, content: Arc<dyn ICatalogContentSource>) -> Self {
        Self {
            platform,
            content,
            commit_message: "chore(governance): sync organization standards".to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_commit_message(mut self, message: impl Into<String>) -> Self {
        self.commit_message = message.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Apply `resolution` to `repository` and seal the session
    #[tracing::instrument(skip_all, fields(repository = %repository, dry_run = options.dry_run))]
    pub async fn execute(
        &self,
        repository: &RepositoryId,
        resolution: &Resolution,
        loaded: &LoadedOverride,
        options: &ExecuteOptions,
    ) -> SyncSession {
        let mut session = OpenSession::new(repository.clone())
            .with_dry_run(options.dry_run)
            .with_force_override_reporting(options.force_override_reporting);
        let before = loaded.schema_version_before();
        session.set_schema_version_before(before);
        session.add_notices(resolution.notices.iter().cloned());

        for notice in &resolution.notices {
            warn!(
                path = %notice.path(),
                code = %notice.code(),
                detail = notice.detail(),
                "Repository override not honored"
            );
        }

        for decision in &resolution.decisions {
            let action = if options.dry_run {
                FileAction::Planned
            } else {
                self.apply(repository, decision).await
            };
            if let FileAction::Failed { error } = &action {
                warn!(path = %decision.path(), error = %error, "File action failed");
            }
            session.record(decision.clone(), action);
        }

        if options.dry_run {
            debug!("Dry run, override left untouched");
            return session.seal(before);
        }

        let after = match self.rewrite_override(repository, loaded, Utc::now()).await {
            Ok(after) => after,
            Err((kind, message)) => {
                warn!(error = %message, "Override rewrite failed");
                session.fail(kind, message);
                before
            }
        };

        let session = session.seal(after);
        info!(
            status = %session.status(),
            synced = session.count(Outcome::Synced),
            skipped = session.count(Outcome::Skipped),
            removed = session.count(Outcome::Removed),
            failed = session.failed_count(),
            "Repository session complete"
        );
        session
    }

    // ========================================================================
    // File actions
    // ========================================================================

    async fn apply(&self, repository: &RepositoryId, decision: &Decision) -> FileAction {
        let path = decision.path();
        let result = match decision.outcome() {
            Outcome::Skipped => return FileAction::Recorded,
            Outcome::Synced => self.sync_file(repository, path).await,
            Outcome::Removed => self.remove_file(repository, path).await,
        };
        result.unwrap_or_else(|e| FileAction::Failed {
            error: format!("{e:#}"),
        })
    }

    async fn sync_file(&self, repository: &RepositoryId, path: &RepoPath) -> anyhow::Result<FileAction> {
        let content = with_retry(&self.retry, &format!("fetch template {path}"), || {
            self.content.fetch(path)
        })
        .await?;

        let message = self.message_for(path);
        with_retry(&self.retry, &format!("write {path}"), || {
            self.platform.write_file(repository, path, &content, &message)
        })
        .await?;

        debug!(%path, bytes = content.len(), "Wrote governed file");
        Ok(FileAction::Written)
    }

    async fn remove_file(&self, repository: &RepositoryId, path: &RepoPath) -> anyhow::Result<FileAction> {
        let message = self.message_for(path);
        let deleted = with_retry(&self.retry, &format!("delete {path}"), || {
            self.platform.delete_file(repository, path, &message)
        })
        .await?;

        if deleted {
            debug!(%path, "Deleted obsolete file");
            Ok(FileAction::Deleted)
        } else {
            debug!(%path, "Obsolete file already absent");
            Ok(FileAction::AlreadyAbsent)
        }
    }

    fn message_for(&self, path: &RepoPath) -> String {
        format!("{} ({path})", self.commit_message)
    }

    // ========================================================================
    // Override rewrite
    // ========================================================================

    /// Rewrite the override, returning the schema version now on disk
    async fn rewrite_override(
        &self,
        repository: &RepositoryId,
        loaded: &LoadedOverride,
        at: DateTime<Utc>,
    ) -> Result<Option<SchemaVersion>, (ErrorKind, String)> {
        let canonical = repo_path(CANONICAL_LOCATION)?;

        match &loaded.source {
            OverrideSource::Absent => Ok(None),

            OverrideSource::Canonical { raw } => {
                let rewritten = rewrite_for_sync(raw, CANONICAL_LOCATION, SchemaVersion::CURRENT, at)
                    .map_err(|e| (e.kind(), e.to_string()))?;
                self.write_override(repository, &canonical, rewritten.as_bytes())
                    .await?;
                debug!(location = CANONICAL_LOCATION, "Updated override metadata");
                Ok(Some(SchemaVersion::CURRENT))
            }

            OverrideSource::Legacy { location } => {
                let document = loaded
                    .document
                    .clone()
                    .with_schema_version(SchemaVersion::CURRENT)
                    .with_last_synced(Some(at));
                let rendered = render_canonical(&document).map_err(|e| (e.kind(), e.to_string()))?;
                self.write_override(repository, &canonical, rendered.as_bytes())
                    .await?;

                let legacy = repo_path(location)?;
                let message = self.message_for(&legacy);
                with_retry(&self.retry, &format!("delete {legacy}"), || {
                    self.platform.delete_file(repository, &legacy, &message)
                })
                .await
                .map_err(|e| {
                    (
                        ErrorKind::FileOperationError,
                        format!("failed to delete legacy override {legacy}: {e:#}"),
                    )
                })?;

                info!(
                    from = *location,
                    to = CANONICAL_LOCATION,
                    "Migrated legacy override"
                );
                Ok(Some(SchemaVersion::CURRENT))
            }
        }
    }

    async fn write_override(
        &self,
        repository: &RepositoryId,
        path: &RepoPath,
        content: &[u8],
    ) -> Result<(), (ErrorKind, String)> {
        let message = self.message_for(path);
        with_retry(&self.retry, &format!("write {path}"), || {
            self.platform.write_file(repository, path, content, &message)
        })
        .await
        .map_err(|e| {
            (
                ErrorKind::FileOperationError,
                format!("failed to write override {path}: {e:#}"),
            )
        })
    }
}

fn repo_path(location: &str) -> Result<RepoPath, (ErrorKind, String)> {
    RepoPath::new(location).map_err(|e| (ErrorKind::UnsafePath, e.to_string()))
}
