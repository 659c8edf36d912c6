//! govsync Sync - governance file synchronization engine
//!
//! Provides:
//! - Override loading with legacy-format probing
//! - The per-repository executor that applies resolved decisions
//! - The orchestrator that runs a bounded pool of repository sessions
//! - Catalog content sources (local directory or template repository)
//!
//! ## Modules
//!
//! - [`content`] - `ICatalogContentSource` adapters
//! - [`executor`] - Applies one repository's resolution and rewrites its override
//! - [`loader`] - Finds and parses the override document
//! - [`orchestrator`] - Discovery, worker pool, cancellation and run report
//! - [`retry`] - Backoff for transient hosting errors

pub mod content;
pub mod executor;
pub mod loader;
pub mod orchestrator;
pub mod retry;

pub use executor::{ExecuteOptions, SyncExecutor};
pub use loader::{load_override, LoadedOverride, OverrideSource};
pub use orchestrator::{Orchestrator, RunOptions, Targets};

use govsync_core::domain::ErrorKind;
use govsync_enforce::OverrideError;
use thiserror::Error;

/// Errors that end a repository session or a whole run
#[derive(Debug, Error)]
pub enum SyncError {
    /// The override document is malformed, too new or names unsafe paths
    #[error(transparent)]
    Override(#[from] OverrideError),

    /// A hosting call outside the per-file actions failed
    #[error("{operation}: {source:#}")]
    Hosting {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// The organization's repositories could not be listed
    #[error("failed to discover repositories of {organization}: {source:#}")]
    Discovery {
        organization: String,
        #[source]
        source: anyhow::Error,
    },
}

impl SyncError {
    pub(crate) fn hosting(operation: impl Into<String>, source: anyhow::Error) -> Self {
        SyncError::Hosting {
            operation: operation.into(),
            source,
        }
    }

    /// Classification recorded in a failed session
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Override(e) => e.kind(),
            SyncError::Hosting { .. } => ErrorKind::FileOperationError,
            SyncError::Discovery { .. } => ErrorKind::ConfigurationError,
        }
    }
}
