//! Override loading
//!
//! Probes every known override location in priority order. The first file
//! that exists is parsed; a parse failure there is final even when a
//! lower-priority location would also match.

use tracing::{debug, info};

use govsync_core::domain::{OverrideDocument, RepoPath, RepositoryId, SchemaVersion};
use govsync_core::ports::IHostingPlatform;
use govsync_enforce::migrate::parse_with;
use govsync_enforce::{probes, MigrationIntent};

use crate::retry::{with_retry, RetryPolicy};
use crate::SyncError;

/// Where the effective override document came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideSource {
    /// The canonical location; `raw` is kept for the in-place rewrite
    Canonical { raw: String },
    /// A legacy location to migrate away from
    Legacy { location: &'static str },
    /// No override file exists; defaults apply
    Absent,
}

/// The parsed override of one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedOverride {
    pub document: OverrideDocument,
    pub source: OverrideSource,
    pub migration: Option<MigrationIntent>,
}

impl LoadedOverride {
    /// No override file: every default applies
    pub fn absent() -> Self {
        Self {
            document: OverrideDocument::default(),
            source: OverrideSource::Absent,
            migration: None,
        }
    }

    /// Schema version found in the repository, `None` without a file
    pub fn schema_version_before(&self) -> Option<SchemaVersion> {
        match self.source {
            OverrideSource::Absent => None,
            _ => Some(self.document.schema_version()),
        }
    }
}

/// Find and parse the override document of `repository`
pub async fn load_override(
    platform: &dyn IHostingPlatform,
    repository: &RepositoryId,
    retry: &RetryPolicy,
) -> Result<LoadedOverride, SyncError> {
    for probe in probes() {
        let location = RepoPath::new(probe.location())
            .map_err(|e| SyncError::hosting("override location", e.into()))?;

        let operation = format!("read {location}");
        let bytes = with_retry(retry, &operation, || platform.read_file(repository, &location))
            .await
            .map_err(|e| SyncError::hosting(operation.clone(), e))?;

        let Some(bytes) = bytes else {
            debug!(%repository, location = probe.location(), "No override at location");
            continue;
        };

        let parsed = parse_with(*probe, &bytes)?;
        let source = if probe.is_legacy() {
            info!(
                %repository,
                location = probe.location(),
                "Found legacy override, will migrate"
            );
            OverrideSource::Legacy {
                location: probe.location(),
            }
        } else {
            // parse_with already rejected non-UTF-8 input
            OverrideSource::Canonical {
                raw: String::from_utf8_lossy(&bytes).into_owned(),
            }
        };

        return Ok(LoadedOverride {
            document: parsed.document,
            source,
            migration: parsed.migration,
        });
    }

    debug!(%repository, "No override document, using defaults");
    Ok(LoadedOverride::absent())
}
