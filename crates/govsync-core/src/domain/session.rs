//! Sync session entity
//!
//! One session per repository per run. An [`OpenSession`] accumulates
//! entries while the executor works; [`OpenSession::seal`] consumes it and
//! yields an immutable [`SyncSession`] whose status is derived from what
//! was recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decision::{Decision, EnforcementNotice, Outcome};
use super::errors::ErrorKind;
use super::newtypes::{RepositoryId, SessionId};
use super::override_doc::SchemaVersion;

/// Final status of a sync session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Every decision was applied
    Success,
    /// At least one file action failed; the rest were attempted
    PartialFailure,
    /// The session aborted; see [`SyncSession::failure`]
    Failed,
}

impl SessionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, SessionStatus::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Success => "success",
            SessionStatus::PartialFailure => "partial_failure",
            SessionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What actually happened for one decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileAction {
    /// Content written to the repository
    Written,
    /// File deleted from the repository
    Deleted,
    /// Removal requested but the file was already gone
    AlreadyAbsent,
    /// Skipped decision, nothing to do
    Recorded,
    /// Dry run, nothing executed
    Planned,
    /// The write or delete failed
    Failed { error: String },
}

impl FileAction {
    pub fn is_failed(&self) -> bool {
        matches!(self, FileAction::Failed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileAction::Written => "written",
            FileAction::Deleted => "deleted",
            FileAction::AlreadyAbsent => "already absent",
            FileAction::Recorded => "recorded",
            FileAction::Planned => "planned",
            FileAction::Failed { .. } => "FAILED",
        }
    }
}

/// A decision paired with the action taken for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    decision: Decision,
    action: FileAction,
}

impl SessionEntry {
    pub fn new(decision: Decision, action: FileAction) -> Self {
        Self { decision, action }
    }

    pub fn decision(&self) -> &Decision {
        &self.decision
    }

    pub fn action(&self) -> &FileAction {
        &self.action
    }
}

/// Why a session ended in [`SessionStatus::Failed`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFailure {
    pub kind: ErrorKind,
    pub message: String,
}

// ============================================================================
// OpenSession
// ============================================================================

/// A session still being recorded
#[derive(Debug)]
pub struct OpenSession {
    id: SessionId,
    repository: RepositoryId,
    started_at: DateTime<Utc>,
    entries: Vec<SessionEntry>,
    notices: Vec<EnforcementNotice>,
    schema_version_before: Option<SchemaVersion>,
    failure: Option<SessionFailure>,
    dry_run: bool,
    force_override_reporting: bool,
}

impl OpenSession {
    /// Start a session for `repository` now
    pub fn new(repository: RepositoryId) -> Self {
        Self {
            id: SessionId::new(),
            repository,
            started_at: Utc::now(),
            entries: Vec::new(),
            notices: Vec::new(),
            schema_version_before: None,
            failure: None,
            dry_run: false,
            force_override_reporting: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Report Required decisions as forced in audit output
    pub fn with_force_override_reporting(mut self, enabled: bool) -> Self {
        self.force_override_reporting = enabled;
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn repository(&self) -> &RepositoryId {
        &self.repository
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Version found in the repository before this session touched it
    pub fn set_schema_version_before(&mut self, version: Option<SchemaVersion>) {
        self.schema_version_before = version;
    }

    pub fn record(&mut self, decision: Decision, action: FileAction) {
        self.entries.push(SessionEntry::new(decision, action));
    }

    pub fn add_notices(&mut self, notices: impl IntoIterator<Item = EnforcementNotice>) {
        self.notices.extend(notices);
    }

    /// Mark the session as failed. The first failure wins.
    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) {
        if self.failure.is_none() {
            self.failure = Some(SessionFailure {
                kind,
                message: message.into(),
            });
        }
    }

    pub fn has_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Close the session. `schema_version_after` is the version now in the
    /// repository, or `None` when the override document was not rewritten.
    pub fn seal(self, schema_version_after: Option<SchemaVersion>) -> SyncSession {
        let status = if self.failure.is_some() {
            SessionStatus::Failed
        } else if self.entries.iter().any(|e| e.action().is_failed()) {
            SessionStatus::PartialFailure
        } else {
            SessionStatus::Success
        };

        SyncSession {
            id: self.id,
            repository: self.repository,
            started_at: self.started_at,
            completed_at: Utc::now(),
            entries: self.entries,
            notices: self.notices,
            schema_version_before: self.schema_version_before,
            schema_version_after,
            status,
            failure: self.failure,
            dry_run: self.dry_run,
            force_override_reporting: self.force_override_reporting,
        }
    }
}

// ============================================================================
// SyncSession
// ============================================================================

/// A sealed, immutable record of one repository's sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSession {
    id: SessionId,
    repository: RepositoryId,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    entries: Vec<SessionEntry>,
    notices: Vec<EnforcementNotice>,
    schema_version_before: Option<SchemaVersion>,
    schema_version_after: Option<SchemaVersion>,
    status: SessionStatus,
    failure: Option<SessionFailure>,
    dry_run: bool,
    force_override_reporting: bool,
}

impl SyncSession {
    /// A session that failed before any decision was made
    pub fn failed(repository: RepositoryId, kind: ErrorKind, message: impl Into<String>) -> Self {
        let mut open = OpenSession::new(repository);
        open.fail(kind, message);
        open.seal(None)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn repository(&self) -> &RepositoryId {
        &self.repository
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    pub fn notices(&self) -> &[EnforcementNotice] {
        &self.notices
    }

    pub fn schema_version_before(&self) -> Option<SchemaVersion> {
        self.schema_version_before
    }

    pub fn schema_version_after(&self) -> Option<SchemaVersion> {
        self.schema_version_after
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn failure(&self) -> Option<&SessionFailure> {
        self.failure.as_ref()
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn force_override_reporting(&self) -> bool {
        self.force_override_reporting
    }

    /// Decisions with `outcome` whose action did not fail
    pub fn count(&self, outcome: Outcome) -> usize {
        self.entries
            .iter()
            .filter(|e| e.decision().outcome() == outcome && !e.action().is_failed())
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.action().is_failed()).count()
    }
}
