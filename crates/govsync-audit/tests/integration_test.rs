//! Integration tests for the audit trail on a real filesystem

use govsync_audit::{AuditError, AuditLogger, SessionSummary};
use govsync_core::domain::{
    Decision, EnforcementLevel, FileAction, OpenSession, Outcome, RepoPath, RunReport,
    SchemaVersion, SessionStatus, SyncSession,
};

fn session(repo: &str) -> SyncSession {
    let mut open = OpenSession::new(repo.parse().unwrap());
    open.set_schema_version_before(Some(SchemaVersion::CURRENT));
    open.record(
        Decision::new(
            RepoPath::new("LICENSE").unwrap(),
            Some(EnforcementLevel::Forced),
            Outcome::Synced,
            "forced",
        )
        .with_forced_override(true),
        FileAction::Written,
    );
    open.seal(Some(SchemaVersion::CURRENT))
}

#[tokio::test]
async fn test_record_writes_all_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let logger = AuditLogger::new(dir.path());
    let session = session("acme/widgets");

    let artifacts = logger.record(&session).await.unwrap();

    let name = artifacts.log.file_name().unwrap().to_str().unwrap().to_string();
    assert!(name.contains("-acme__widgets-"));
    assert!(name.ends_with(&format!("{}.log", session.id().short())));
    assert_eq!(artifacts.log.parent().unwrap(), dir.path().join("sessions"));

    let log = std::fs::read_to_string(&artifacts.log).unwrap();
    assert!(log.contains("synced   forced    LICENSE (forced) [written]"));

    let latest = std::fs::read_to_string(&artifacts.latest).unwrap();
    assert_eq!(latest, format!("sessions/{name}\n"));

    let summary: SessionSummary =
        serde_json::from_slice(&std::fs::read(&artifacts.summary).unwrap()).unwrap();
    assert_eq!(summary.session_id, session.id());
    assert_eq!(summary.status, SessionStatus::Success);
    assert_eq!(summary.outcomes.synced, 1);
    assert_eq!(summary.levels.forced, 1);
    assert_eq!(summary.log, format!("sessions/{name}"));
}

#[tokio::test]
async fn test_latest_follows_newest_session() {
    let dir = tempfile::tempdir().unwrap();
    let logger = AuditLogger::new(dir.path());

    let first = logger.record(&session("acme/one")).await.unwrap();
    let second = logger.record(&session("acme/two")).await.unwrap();

    assert!(first.log.exists());
    assert!(second.log.exists());
    let latest = std::fs::read_to_string(dir.path().join("latest")).unwrap();
    assert!(latest.contains("acme__two"));

    // No temporary pointer files are left behind
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_session_is_logged_only_once() {
    let dir = tempfile::tempdir().unwrap();
    let logger = AuditLogger::new(dir.path());
    let session = session("acme/widgets");

    let artifacts = logger.record(&session).await.unwrap();
    let original = std::fs::read_to_string(&artifacts.log).unwrap();

    let err = logger.record(&session).await.unwrap_err();
    assert!(matches!(err, AuditError::Write { .. }));
    assert_eq!(std::fs::read_to_string(&artifacts.log).unwrap(), original);
}

#[tokio::test]
async fn test_unwritable_directory_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("audit");
    std::fs::write(&blocker, "not a directory").unwrap();
    let logger = AuditLogger::new(&blocker);

    match logger.record(&session("acme/widgets")).await {
        Err(AuditError::Write { path, .. }) => assert!(path.starts_with(&blocker)),
        other => panic!("expected write error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_record_run() {
    let dir = tempfile::tempdir().unwrap();
    let logger = AuditLogger::new(dir.path());

    let mut report = RunReport::new("acme", false);
    report.push(&session("acme/widgets"));
    report.abandon("acme/late".parse().unwrap());
    let report = report.finish();

    let path = logger.record_run(&report).await.unwrap();
    assert_eq!(path.parent().unwrap(), dir.path().join("runs"));

    let stored: RunReport = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(stored, report);
    assert_eq!(stored.exit_code(), 1);
}
