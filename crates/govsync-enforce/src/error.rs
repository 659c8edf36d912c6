//! Error types for override parsing

use govsync_core::domain::{ErrorKind, SchemaVersion};
use thiserror::Error;

/// Errors raised while reading or rewriting an override document.
///
/// Every variant is session-fatal: the repository is left untouched.
#[derive(Debug, Error)]
pub enum OverrideError {
    /// Syntax error, wrong value type or unknown enum string
    #[error("malformed override document {location}: {reason}")]
    Malformed { location: String, reason: String },

    /// Schema major version newer than this build understands
    #[error("override schema {found} is newer than supported {supported}")]
    UnknownSchema {
        found: SchemaVersion,
        supported: SchemaVersion,
    },

    /// A referenced path is absolute or escapes the repository
    #[error("unsafe path in {field}: {path}")]
    UnsafePath { field: &'static str, path: String },

    /// The document could not be serialized
    #[error("failed to render override document: {0}")]
    Render(#[from] serde_yaml::Error),
}

impl OverrideError {
    pub(crate) fn malformed(location: &str, reason: impl ToString) -> Self {
        OverrideError::Malformed {
            location: location.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Classification recorded in the failed session
    pub fn kind(&self) -> ErrorKind {
        match self {
            OverrideError::Malformed { .. } | OverrideError::Render(_) => {
                ErrorKind::MalformedOverride
            }
            OverrideError::UnknownSchema { .. } => ErrorKind::UnknownSchema,
            OverrideError::UnsafePath { .. } => ErrorKind::UnsafePath,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            OverrideError::malformed("x.yml", "bad").kind(),
            ErrorKind::MalformedOverride
        );
        assert_eq!(
            OverrideError::UnknownSchema {
                found: SchemaVersion::new(3, 0),
                supported: SchemaVersion::CURRENT,
            }
            .kind(),
            ErrorKind::UnknownSchema
        );
        assert_eq!(
            OverrideError::UnsafePath {
                field: "excludeFiles",
                path: "../x".into(),
            }
            .kind(),
            ErrorKind::UnsafePath
        );
    }

    #[test]
    fn test_display() {
        let err = OverrideError::UnknownSchema {
            found: SchemaVersion::new(3, 1),
            supported: SchemaVersion::CURRENT,
        };
        assert_eq!(
            err.to_string(),
            "override schema 3.1 is newer than supported 2.0"
        );
    }
}
