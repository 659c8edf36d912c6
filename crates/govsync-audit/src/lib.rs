//! govsync Audit - append-only session audit trail
//!
//! Provides:
//! - `AuditLogger`: writes one human-readable log and one JSON summary per
//!   sealed session, and keeps a `latest` pointer to the newest log
//! - `SessionSummary`: machine-readable counts by outcome and level
//! - `AuditError`: write failures, reported but never fatal to a sync

pub mod error;
pub mod logger;
pub mod summary;

pub use error::AuditError;
pub use logger::{AuditArtifacts, AuditLogger};
pub use summary::SessionSummary;
