//! Domain error types
//!
//! This module defines the validation errors raised while building domain
//! values, and the [`ErrorKind`] taxonomy used to classify session failures
//! in audit artifacts and reports.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Path is absolute, escapes the repository root, or is otherwise malformed
    #[error("Unsafe path: {0}")]
    UnsafePath(String),

    /// Repository identifier is not of the form `owner/name`
    #[error("Invalid repository identifier: {0}")]
    InvalidRepository(String),

    /// Schema version is not of the form `MAJOR.MINOR`
    #[error("Invalid schema version: {0}")]
    InvalidSchemaVersion(String),

    /// Enum string that does not match any known variant
    #[error("Unknown {field} value: {value}")]
    UnknownVariant {
        /// Name of the field being parsed
        field: &'static str,
        /// The rejected value
        value: String,
    },

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}

/// Classification of every error a sync run can surface.
///
/// Configuration errors abort the process before any repository is touched.
/// Override errors fail one repository session. File operation errors fail
/// one decision. Audit write errors only reach stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigurationError,
    MalformedOverride,
    UnknownSchema,
    UnsafePath,
    FileOperationError,
    AuditWriteError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigurationError => "ConfigurationError",
            ErrorKind::MalformedOverride => "MalformedOverride",
            ErrorKind::UnknownSchema => "UnknownSchema",
            ErrorKind::UnsafePath => "UnsafePath",
            ErrorKind::FileOperationError => "FileOperationError",
            ErrorKind::AuditWriteError => "AuditWriteError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&DomainError> for ErrorKind {
    fn from(err: &DomainError) -> Self {
        match err {
            DomainError::UnsafePath(_) => ErrorKind::UnsafePath,
            DomainError::InvalidRepository(_) => ErrorKind::ConfigurationError,
            DomainError::InvalidSchemaVersion(_)
            | DomainError::UnknownVariant { .. }
            | DomainError::InvalidId(_) => ErrorKind::MalformedOverride,
        }
    }
}
