//! Audit error type

use std::path::PathBuf;

use govsync_core::domain::ErrorKind;
use thiserror::Error;

/// Failure to persist an audit artifact
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to write audit artifact {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize audit summary: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl AuditError {
    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AuditError::Write {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::AuditWriteError
    }
}
