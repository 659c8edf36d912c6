//! Aggregated run report
//!
//! The orchestrator folds every sealed session into a [`RunReport`].
//! Repositories complete in any order; [`RunReport::finish`] sorts them so
//! the printed table and JSON are deterministic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decision::Outcome;
use super::newtypes::RepositoryId;
use super::session::{SessionStatus, SyncSession};

/// One row of the final summary table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryReport {
    pub repository: RepositoryId,
    pub status: SessionStatus,
    pub synced: usize,
    pub skipped: usize,
    pub removed: usize,
    pub failed: usize,
    pub notices: usize,
    pub error: Option<String>,
}

impl From<&SyncSession> for RepositoryReport {
    fn from(session: &SyncSession) -> Self {
        Self {
            repository: session.repository().clone(),
            status: session.status(),
            synced: session.count(Outcome::Synced),
            skipped: session.count(Outcome::Skipped),
            removed: session.count(Outcome::Removed),
            failed: session.failed_count(),
            notices: session.notices().len(),
            error: session
                .failure()
                .map(|f| format!("{}: {}", f.kind, f.message)),
        }
    }
}

/// Result of one `sync` invocation across all target repositories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub organization: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub repositories: Vec<RepositoryReport>,
    /// Repositories queued but never started because the run was cancelled
    pub abandoned: Vec<RepositoryId>,
}

impl RunReport {
    pub fn new(organization: impl Into<String>, dry_run: bool) -> Self {
        Self {
            organization: organization.into(),
            started_at: Utc::now(),
            completed_at: None,
            dry_run,
            repositories: Vec::new(),
            abandoned: Vec::new(),
        }
    }

    pub fn push(&mut self, session: &SyncSession) {
        self.repositories.push(RepositoryReport::from(session));
    }

    pub fn abandon(&mut self, repository: RepositoryId) {
        self.abandoned.push(repository);
    }

    /// Stamp completion and sort by repository identifier
    pub fn finish(mut self) -> Self {
        self.repositories
            .sort_by(|a, b| a.repository.cmp(&b.repository));
        self.abandoned.sort();
        self.completed_at = Some(Utc::now());
        self
    }

    /// True when every repository finished with `Success` and none was abandoned
    pub fn all_succeeded(&self) -> bool {
        self.abandoned.is_empty() && self.repositories.iter().all(|r| r.status.is_success())
    }

    /// Process exit code for this report: `0` on full success, `1` otherwise
    pub fn exit_code(&self) -> u8 {
        if self.all_succeeded() {
            0
        } else {
            1
        }
    }
}
