//! Machine-readable session summary
//!
//! Written next to each session log as `<stem>.summary.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use govsync_core::domain::{
    EnforcementLevel, Outcome, RepositoryId, SchemaVersion, SessionFailure, SessionId,
    SessionStatus, SyncSession,
};

/// Decisions by outcome, excluding those whose file action failed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub synced: usize,
    pub skipped: usize,
    pub removed: usize,
}

/// Decisions by enforcement level as reported
///
/// With force-override reporting, Required decisions land in `forced`.
/// `unlisted` counts obsolete paths outside the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCounts {
    pub forced: usize,
    pub required: usize,
    pub suggested: usize,
    pub optional: usize,
    pub unlisted: usize,
}

/// JSON summary of one sealed session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub repository: RepositoryId,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub dry_run: bool,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SessionFailure>,
    pub schema_version_before: Option<SchemaVersion>,
    pub schema_version_after: Option<SchemaVersion>,
    pub outcomes: OutcomeCounts,
    pub levels: LevelCounts,
    /// Required decisions shown as forced in this session's reports
    pub reported_as_forced: usize,
    pub failed: usize,
    pub notices: usize,
    /// Session log path relative to the audit directory
    pub log: String,
}

impl SessionSummary {
    pub fn from_session(session: &SyncSession, log: impl Into<String>) -> Self {
        let mut levels = LevelCounts::default();
        let mut reported_as_forced = 0;

        for entry in session.entries() {
            match entry.decision().level() {
                Some(EnforcementLevel::Forced) => levels.forced += 1,
                Some(EnforcementLevel::Required) if session.force_override_reporting() => {
                    levels.forced += 1;
                    reported_as_forced += 1;
                }
                Some(EnforcementLevel::Required) => levels.required += 1,
                Some(EnforcementLevel::Suggested) => levels.suggested += 1,
                Some(EnforcementLevel::Optional) => levels.optional += 1,
                None => levels.unlisted += 1,
            }
        }

        Self {
            session_id: session.id(),
            repository: session.repository().clone(),
            started_at: session.started_at(),
            completed_at: session.completed_at(),
            dry_run: session.is_dry_run(),
            status: session.status(),
            error: session.failure().cloned(),
            schema_version_before: session.schema_version_before(),
            schema_version_after: session.schema_version_after(),
            outcomes: OutcomeCounts {
                synced: session.count(Outcome::Synced),
                skipped: session.count(Outcome::Skipped),
                removed: session.count(Outcome::Removed),
            },
            levels,
            reported_as_forced,
            failed: session.failed_count(),
            notices: session.notices().len(),
            log: log.into(),
        }
    }
}
