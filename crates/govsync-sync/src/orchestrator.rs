//! Orchestrator - runs repository sessions across an organization
//!
//! ## Flow
//!
//! 1. Discovery: list the organization, or look up explicit targets one
//!    by one. Archived repositories are dropped on request.
//! 2. One task per repository, at most `max_parallel` running at once.
//!    Each session is strictly sequential: load override, probe presence,
//!    resolve, execute, audit.
//! 3. Sessions are collected into a [`RunReport`] sorted by repository.
//!
//! ## Cancellation
//!
//! The token is checked before a session starts. A started session always
//! runs to completion so its override rewrite is never half-applied.
//! Repositories that never started are reported as abandoned.
//!
//! ## Isolation
//!
//! Every session runs in its own task. An error or panic in one repository
//! becomes that repository's `Failed` session and nothing else.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use govsync_audit::AuditLogger;
use govsync_core::domain::{
    Catalog, ErrorKind, OpenSession, OverrideDocument, RepoPath, RepositoryId, RunReport,
    SyncSession,
};
use govsync_core::ports::{IHostingPlatform, RepositoryInfo};
use govsync_enforce::resolve;

use crate::executor::{ExecuteOptions, SyncExecutor};
use crate::loader::load_override;
use crate::retry::{with_retry, RetryPolicy};
use crate::SyncError;

/// Which repositories a run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targets {
    /// Every repository of the organization
    Organization,
    /// Only these repositories
    Explicit(Vec<RepositoryId>),
}

/// Switches for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub dry_run: bool,
    pub skip_archived: bool,
    /// Report Required files as forced in audit output
    pub force_override: bool,
}

/// Drives a sync run across many repositories
pub struct Orchestrator {
    platform: Arc<dyn IHostingPlatform>,
    executor: Arc<SyncExecutor>,
    audit: Option<AuditLogger>,
    catalog: &'static Catalog,
    max_parallel: usize,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(platform: Arc<dyn IHostingPlatform>, executor: SyncExecutor) -> Self {
        Self {
            platform,
            executor: Arc::new(executor),
            audit: None,
            catalog: govsync_enforce::builtin(),
            max_parallel: 4,
            cancel: CancellationToken::new(),
        }
    }

    /// Record every session and the run report under this logger
    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_catalog(mut self, catalog: &'static Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Number of repositories synchronized at once (at least 1)
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops new sessions from starting
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Synchronize `targets` and return the aggregated report
    ///
    /// Only a failed organization listing is an error: nothing has been
    /// touched at that point. Everything later is reported per repository.
    #[tracing::instrument(skip(self, targets), fields(dry_run = options.dry_run))]
    pub async fn run(
        &self,
        organization: &str,
        targets: Targets,
        options: RunOptions,
    ) -> Result<RunReport, SyncError> {
        let ctx = Arc::new(SessionContext {
            platform: Arc::clone(&self.platform),
            executor: Arc::clone(&self.executor),
            audit: self.audit.clone(),
            catalog: self.catalog,
        });
        let mut report = RunReport::new(organization, options.dry_run);

        // ====================================================================
        // Discovery
        // ====================================================================

        let mut repositories = Vec::new();
        match targets {
            Targets::Organization => {
                let listed = with_retry(ctx.retry(), "list repositories", || {
                    self.platform.list_repositories(organization)
                })
                .await
                .map_err(|source| SyncError::Discovery {
                    organization: organization.to_string(),
                    source,
                })?;
                repositories.extend(listed);
            }
            Targets::Explicit(ids) => {
                for id in ids {
                    let lookup = with_retry(ctx.retry(), "get repository", || {
                        self.platform.get_repository(&id)
                    })
                    .await;
                    match lookup {
                        Ok(info) => repositories.push(info),
                        Err(e) => {
                            warn!(repository = %id, error = %format!("{e:#}"), "Repository lookup failed");
                            let session = failed_session(
                                id,
                                &options,
                                ErrorKind::FileOperationError,
                                format!("repository lookup failed: {e:#}"),
                            );
                            ctx.record(&session).await;
                            report.push(&session);
                        }
                    }
                }
            }
        }

        let repositories = filter_archived(repositories, options.skip_archived);
        info!(
            organization,
            repositories = repositories.len(),
            max_parallel = self.max_parallel,
            "Starting sync run"
        );

        // ====================================================================
        // Worker pool
        // ====================================================================

        let permits = Arc::new(Semaphore::new(self.max_parallel));
        let mut workers = JoinSet::new();

        for info in repositories {
            let ctx = Arc::clone(&ctx);
            let permits = Arc::clone(&permits);
            let cancel = self.cancel.clone();
            let repository = info.id;

            workers.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Worker::Abandoned(repository),
                    permit = permits.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return Worker::Abandoned(repository),
                    },
                };

                // Nested task so a panic is contained to this repository
                let session_ctx = Arc::clone(&ctx);
                let session_repo = repository.clone();
                let joined = tokio::spawn(async move {
                    session_ctx.sync_repository(&session_repo, options).await
                })
                .await;
                drop(permit);

                let session = match joined {
                    Ok(session) => session,
                    Err(e) => {
                        error!(repository = %repository, error = %e, "Repository session panicked");
                        let session = failed_session(
                            repository,
                            &options,
                            ErrorKind::FileOperationError,
                            format!("session aborted: {e}"),
                        );
                        ctx.record(&session).await;
                        session
                    }
                };
                Worker::Finished(Box::new(session))
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Worker::Finished(session)) => report.push(&session),
                Ok(Worker::Abandoned(repository)) => {
                    debug!(%repository, "Run cancelled before session started");
                    report.abandon(repository);
                }
                Err(e) => error!(error = %e, "Worker task failed"),
            }
        }

        let report = report.finish();
        if !report.abandoned.is_empty() {
            warn!(
                abandoned = report.abandoned.len(),
                "Run cancelled, some repositories were not synchronized"
            );
        }
        info!(
            repositories = report.repositories.len(),
            succeeded = report
                .repositories
                .iter()
                .filter(|r| r.status.is_success())
                .count(),
            "Sync run complete"
        );

        if let Some(audit) = &self.audit {
            if let Err(e) = audit.record_run(&report).await {
                error!(error = %e, "Failed to record run report");
            }
        }
        Ok(report)
    }
}

enum Worker {
    Finished(Box<SyncSession>),
    Abandoned(RepositoryId),
}

fn filter_archived(repositories: Vec<RepositoryInfo>, skip_archived: bool) -> Vec<RepositoryInfo> {
    if !skip_archived {
        return repositories;
    }
    repositories
        .into_iter()
        .filter(|info| {
            if info.archived {
                info!(repository = %info.id, "Skipping archived repository");
            }
            !info.archived
        })
        .collect()
}

fn failed_session(
    repository: RepositoryId,
    options: &RunOptions,
    kind: ErrorKind,
    message: String,
) -> SyncSession {
    let mut open = OpenSession::new(repository)
        .with_dry_run(options.dry_run)
        .with_force_override_reporting(options.force_override);
    open.fail(kind, message);
    open.seal(None)
}

// ============================================================================
// Per-repository session
// ============================================================================

/// What a worker task needs, shared across all of them
struct SessionContext {
    platform: Arc<dyn IHostingPlatform>,
    executor: Arc<SyncExecutor>,
    audit: Option<AuditLogger>,
    catalog: &'static Catalog,
}

impl SessionContext {
    fn retry(&self) -> &RetryPolicy {
        self.executor.retry_policy()
    }

    /// Run one repository to a sealed, audited session
    #[tracing::instrument(skip_all, fields(repository = %repository))]
    async fn sync_repository(&self, repository: &RepositoryId, options: RunOptions) -> SyncSession {
        let session = match self.prepare_and_execute(repository, options).await {
            Ok(session) => session,
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "Repository session failed");
                failed_session(repository.clone(), &options, e.kind(), e.to_string())
            }
        };
        self.record(&session).await;
        session
    }

    async fn prepare_and_execute(
        &self,
        repository: &RepositoryId,
        options: RunOptions,
    ) -> Result<SyncSession, SyncError> {
        let loaded = load_override(self.platform.as_ref(), repository, self.retry()).await?;
        let present = self.probe_presence(repository, &loaded.document).await?;
        let resolution = resolve(self.catalog, &loaded.document, &present);

        let execute = ExecuteOptions {
            dry_run: options.dry_run,
            force_override_reporting: options.force_override,
        };
        Ok(self
            .executor
            .execute(repository, &resolution, &loaded, &execute)
            .await)
    }

    /// Which catalog and obsolete paths exist in the repository
    async fn probe_presence(
        &self,
        repository: &RepositoryId,
        document: &OverrideDocument,
    ) -> Result<BTreeSet<RepoPath>, SyncError> {
        let candidates: BTreeSet<RepoPath> = self
            .catalog
            .entries()
            .map(|entry| entry.path().clone())
            .chain(document.obsolete_files().keys().cloned())
            .collect();

        let mut present = BTreeSet::new();
        for path in candidates {
            let operation = format!("probe {path}");
            let exists = with_retry(self.retry(), &operation, || {
                self.platform.file_exists(repository, &path)
            })
            .await
            .map_err(|e| SyncError::hosting(operation.clone(), e))?;
            if exists {
                present.insert(path);
            }
        }
        debug!(present = present.len(), "Probed file presence");
        Ok(present)
    }

    /// Audit failures are reported and never change the session
    async fn record(&self, session: &SyncSession) {
        let Some(audit) = &self.audit else {
            return;
        };
        match audit.record(session).await {
            Ok(artifacts) => debug!(log = %artifacts.log.display(), "Session audited"),
            Err(e) => error!(
                repository = %session.repository(),
                kind = %e.kind(),
                error = %e,
                "Failed to write audit log"
            ),
        }
    }
}
