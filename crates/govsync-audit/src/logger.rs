//! AuditLogger - per-session audit artifacts
//!
//! Layout under the audit directory:
//!
//! ```text
//! latest                                   -> "sessions/<stem>.log"
//! sessions/<stem>.log                      human-readable session log
//! sessions/<stem>.summary.json             SessionSummary
//! runs/run-<stamp>.json                    RunReport
//! ```
//!
//! `<stem>` is `<started_at>-<owner>__<name>-<session8>`. Session files are
//! created with `create_new` and never rewritten. The `latest` pointer is
//! replaced atomically through a temporary file and a rename.
//!
//! Errors are returned to the caller, which reports them and carries on:
//! the sync's effects are already visible in the repository by the time a
//! session is recorded.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use govsync_core::domain::{
    EnforcementLevel, FileAction, Outcome, RunReport, SchemaVersion, SyncSession,
};

use crate::error::AuditError;
use crate::summary::SessionSummary;

const SESSIONS_DIR: &str = "sessions";
const RUNS_DIR: &str = "runs";
const LATEST: &str = "latest";

/// Paths written for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditArtifacts {
    pub log: PathBuf,
    pub summary: PathBuf,
    pub latest: PathBuf,
}

fn stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%S%.3fZ").to_string()
}

/// Writes audit artifacts for sealed sessions and finished runs
#[derive(Debug, Clone)]
pub struct AuditLogger {
    dir: PathBuf,
}

impl AuditLogger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Records a sealed session: log, summary, then the `latest` pointer.
    pub async fn record(&self, session: &SyncSession) -> Result<AuditArtifacts, AuditError> {
        let sessions = self.dir.join(SESSIONS_DIR);
        fs::create_dir_all(&sessions)
            .await
            .map_err(|e| AuditError::write(&sessions, e))?;

        let stem = format!(
            "{}-{}-{}",
            stamp(session.started_at()),
            session.repository().slug(),
            session.id().short()
        );
        let log_name = format!("{SESSIONS_DIR}/{stem}.log");
        let log = self.dir.join(&log_name);
        let summary = sessions.join(format!("{stem}.summary.json"));

        write_new(&log, render_log(session).as_bytes()).await?;

        let json = serde_json::to_vec_pretty(&SessionSummary::from_session(session, &log_name))?;
        write_new(&summary, &json).await?;

        let latest = self.dir.join(LATEST);
        self.replace_latest(&latest, &log_name, &stem).await?;

        debug!(
            repository = %session.repository(),
            log = %log.display(),
            "Recorded audit session"
        );
        Ok(AuditArtifacts {
            log,
            summary,
            latest,
        })
    }

    /// Records the aggregated report of a finished run
    pub async fn record_run(&self, report: &RunReport) -> Result<PathBuf, AuditError> {
        let runs = self.dir.join(RUNS_DIR);
        fs::create_dir_all(&runs)
            .await
            .map_err(|e| AuditError::write(&runs, e))?;

        let at = report.completed_at.unwrap_or(report.started_at);
        let path = runs.join(format!("run-{}.json", stamp(at)));
        let json = serde_json::to_vec_pretty(report)?;
        write_new(&path, &json).await?;

        info!(path = %path.display(), "Recorded run report");
        Ok(path)
    }

    async fn replace_latest(
        &self,
        latest: &Path,
        target: &str,
        stem: &str,
    ) -> Result<(), AuditError> {
        let tmp = self.dir.join(format!(".{LATEST}.{stem}.tmp"));
        fs::write(&tmp, format!("{target}\n"))
            .await
            .map_err(|e| AuditError::write(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, latest).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(AuditError::write(latest, e));
        }
        Ok(())
    }
}

async fn write_new(path: &Path, bytes: &[u8]) -> Result<(), AuditError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| AuditError::write(path, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| AuditError::write(path, e))?;
    file.flush().await.map_err(|e| AuditError::write(path, e))
}

// ============================================================================
// Log rendering
// ============================================================================

fn level_label(level: Option<EnforcementLevel>, force_reporting: bool) -> &'static str {
    match level {
        Some(EnforcementLevel::Required) if force_reporting => "forced*",
        Some(level) => level.as_str(),
        None => "-",
    }
}

fn version_label(version: Option<SchemaVersion>) -> String {
    version.map_or_else(|| "none".to_string(), |v| v.to_string())
}

/// Renders the human-readable session log
pub fn render_log(session: &SyncSession) -> String {
    let mut out = String::new();
    let force = session.force_override_reporting();

    // Writing to a String cannot fail
    let _ = writeln!(out, "govsync session {}", session.id());
    let _ = writeln!(out, "repository: {}", session.repository());
    let _ = writeln!(out, "started:    {}", session.started_at().to_rfc3339());
    let _ = writeln!(out, "completed:  {}", session.completed_at().to_rfc3339());
    let _ = writeln!(
        out,
        "mode:       {}",
        if session.is_dry_run() { "dry run" } else { "live" }
    );
    let _ = writeln!(
        out,
        "schema:     {} -> {}",
        version_label(session.schema_version_before()),
        version_label(session.schema_version_after())
    );
    if force {
        let _ = writeln!(out, "note:       required files reported as forced*");
    }
    out.push('\n');

    for entry in session.entries() {
        let decision = entry.decision();
        let _ = write!(
            out,
            "{:<8} {:<9} {} ({}) [{}]",
            decision.outcome().as_str(),
            level_label(decision.level(), force),
            decision.path(),
            decision.reason(),
            entry.action().label()
        );
        if let FileAction::Failed { error } = entry.action() {
            let _ = write!(out, " {error}");
        }
        out.push('\n');
    }

    if !session.notices().is_empty() {
        out.push_str("\nnotices:\n");
        for notice in session.notices() {
            let _ = writeln!(
                out,
                "  {:<7} {} {}: {}",
                format!("{:?}", notice.severity()).to_lowercase(),
                notice.code(),
                notice.path(),
                notice.detail()
            );
        }
    }

    out.push('\n');
    let _ = writeln!(
        out,
        "status: {} (synced {}, skipped {}, removed {}, failed {})",
        session.status(),
        session.count(Outcome::Synced),
        session.count(Outcome::Skipped),
        session.count(Outcome::Removed),
        session.failed_count()
    );
    if let Some(failure) = session.failure() {
        let _ = writeln!(out, "error: {}: {}", failure.kind, failure.message);
    }
    out
}
