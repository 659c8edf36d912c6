//! Resolver output
//!
//! A [`Decision`] says what happens to one path in one session. An
//! [`EnforcementNotice`] records a repository-local declaration that the
//! resolver ignored or overrode, so the audit trail shows it was seen.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::level::EnforcementLevel;
use super::newtypes::RepoPath;

/// What the executor will do with a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Synced,
    Skipped,
    Removed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Synced => "synced",
            Outcome::Skipped => "skipped",
            Outcome::Removed => "removed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resolved fate of one path
///
/// `level` is `None` only for obsolete paths that are not in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    path: RepoPath,
    level: Option<EnforcementLevel>,
    outcome: Outcome,
    reason: String,
    forced_override: bool,
}

impl Decision {
    pub fn new(
        path: RepoPath,
        level: Option<EnforcementLevel>,
        outcome: Outcome,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            path,
            level,
            outcome,
            reason: reason.into(),
            forced_override: false,
        }
    }

    /// Mark the decision as a forced override of repository-local declarations
    pub fn with_forced_override(mut self, forced: bool) -> Self {
        self.forced_override = forced;
        self
    }

    pub fn path(&self) -> &RepoPath {
        &self.path
    }

    pub fn level(&self) -> Option<EnforcementLevel> {
        self.level
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn forced_override(&self) -> bool {
        self.forced_override
    }
}

// ============================================================================
// Notices
// ============================================================================

/// Kind of ignored or overridden repository-local declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeCode {
    /// `excludeFiles` entry for a Forced path
    ForcedExclusionIgnored,
    /// `protectedFiles` entry for a Forced path
    ForcedProtectionIgnored,
    /// opt-out entry for a Forced path
    ForcedOptOutIgnored,
    /// `protectedFiles` entry for a Required path; the file is still written
    RequiredProtectionOverridden,
    /// `excludeFiles` or opt-out entry for a Required path
    RequiredExclusionIgnored,
    /// `requiredFiles` mirror names a path that is not Required in the catalog
    StaleRequiredMirror,
}

/// How loudly a notice is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeSeverity {
    Info,
    Warning,
}

impl NoticeCode {
    pub fn severity(&self) -> NoticeSeverity {
        match self {
            NoticeCode::StaleRequiredMirror => NoticeSeverity::Info,
            _ => NoticeSeverity::Warning,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeCode::ForcedExclusionIgnored => "forced_exclusion_ignored",
            NoticeCode::ForcedProtectionIgnored => "forced_protection_ignored",
            NoticeCode::ForcedOptOutIgnored => "forced_opt_out_ignored",
            NoticeCode::RequiredProtectionOverridden => "required_protection_overridden",
            NoticeCode::RequiredExclusionIgnored => "required_exclusion_ignored",
            NoticeCode::StaleRequiredMirror => "stale_required_mirror",
        }
    }
}

impl fmt::Display for NoticeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A repository-local declaration the resolver did not honor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcementNotice {
    path: RepoPath,
    code: NoticeCode,
    detail: String,
}

impl EnforcementNotice {
    pub fn new(path: RepoPath, code: NoticeCode, detail: impl Into<String>) -> Self {
        Self {
            path,
            code,
            detail: detail.into(),
        }
    }

    pub fn path(&self) -> &RepoPath {
        &self.path
    }

    pub fn code(&self) -> NoticeCode {
        self.code
    }

    /// The repository's stated reason, or other context
    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn severity(&self) -> NoticeSeverity {
        self.code.severity()
    }
}

/// Decisions in catalog-then-obsolete order, plus notices
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub decisions: Vec<Decision>,
    pub notices: Vec<EnforcementNotice>,
}

impl Resolution {
    /// Decision for `path`, if one was produced
    pub fn decision_for(&self, path: &RepoPath) -> Option<&Decision> {
        self.decisions.iter().find(|d| d.path() == path)
    }

    /// Number of decisions with the given outcome
    pub fn count(&self, outcome: Outcome) -> usize {
        self.decisions
            .iter()
            .filter(|d| d.outcome() == outcome)
            .count()
    }
}
