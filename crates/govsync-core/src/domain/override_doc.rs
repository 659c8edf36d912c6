//! Repository-local override document
//!
//! The validated, format-independent view of a repository's override
//! declaration. Parsing and rendering of the on-disk formats live in
//! `govsync-enforce`; every path stored here is already a [`RepoPath`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::RepoPath;

// ============================================================================
// SchemaVersion
// ============================================================================

/// `MAJOR.MINOR` version of the override document schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaVersion {
    major: u32,
    minor: u32,
}

impl SchemaVersion {
    /// The schema written by this build
    pub const CURRENT: SchemaVersion = SchemaVersion::new(2, 0);

    /// The schema of the legacy override formats
    pub const LEGACY: SchemaVersion = SchemaVersion::new(1, 0);

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub const fn major(&self) -> u32 {
        self.major
    }

    pub const fn minor(&self) -> u32 {
        self.minor
    }

    /// True when this build can interpret documents of this version.
    ///
    /// Minor versions within the current major are forward compatible.
    pub fn is_supported(&self) -> bool {
        self.major <= Self::CURRENT.major
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for SchemaVersion {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || DomainError::InvalidSchemaVersion(s.to_string());
        let (major, minor) = match trimmed.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (trimmed, "0"),
        };
        let major = major.parse::<u32>().map_err(|_| invalid())?;
        let minor = minor.parse::<u32>().map_err(|_| invalid())?;
        Ok(Self { major, minor })
    }
}

impl TryFrom<String> for SchemaVersion {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SchemaVersion> for String {
    fn from(v: SchemaVersion) -> Self {
        v.to_string()
    }
}

// ============================================================================
// CleanupMode
// ============================================================================

/// How aggressively files are removed from a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupMode {
    /// Never remove anything, not even declared obsolete files
    None,
    /// Remove declared obsolete files only
    #[default]
    Conservative,
    /// Also remove skipped suggested/optional files that are present
    Aggressive,
}

impl CleanupMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupMode::None => "none",
            CleanupMode::Conservative => "conservative",
            CleanupMode::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for CleanupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CleanupMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(CleanupMode::None),
            "conservative" => Ok(CleanupMode::Conservative),
            "aggressive" => Ok(CleanupMode::Aggressive),
            _ => Err(DomainError::UnknownVariant {
                field: "cleanupMode",
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// OverrideDocument
// ============================================================================

/// A repository's declaration of opt-ins, exclusions, protections and
/// obsolete files.
///
/// The absent document is [`OverrideDocument::default`]: current schema,
/// sync enabled, conservative cleanup, every section empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideDocument {
    schema_version: SchemaVersion,
    last_synced: Option<DateTime<Utc>>,
    sync_enabled: bool,
    cleanup_mode: CleanupMode,
    optional_includes: BTreeMap<RepoPath, String>,
    optional_excludes: BTreeMap<RepoPath, String>,
    excluded_files: BTreeMap<RepoPath, String>,
    protected_files: BTreeMap<RepoPath, String>,
    obsolete_files: BTreeMap<RepoPath, String>,
    declared_required: BTreeMap<RepoPath, String>,
}

impl Default for OverrideDocument {
    fn default() -> Self {
        Self {
            schema_version: SchemaVersion::CURRENT,
            last_synced: None,
            sync_enabled: true,
            cleanup_mode: CleanupMode::default(),
            optional_includes: BTreeMap::new(),
            optional_excludes: BTreeMap::new(),
            excluded_files: BTreeMap::new(),
            protected_files: BTreeMap::new(),
            obsolete_files: BTreeMap::new(),
            declared_required: BTreeMap::new(),
        }
    }
}

impl OverrideDocument {
    // --- builders ---

    pub fn with_schema_version(mut self, version: SchemaVersion) -> Self {
        self.schema_version = version;
        self
    }

    pub fn with_last_synced(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.last_synced = at;
        self
    }

    pub fn with_sync_enabled(mut self, enabled: bool) -> Self {
        self.sync_enabled = enabled;
        self
    }

    pub fn with_cleanup_mode(mut self, mode: CleanupMode) -> Self {
        self.cleanup_mode = mode;
        self
    }

    pub fn include_optional(mut self, path: RepoPath, reason: impl Into<String>) -> Self {
        self.optional_includes.insert(path, reason.into());
        self
    }

    pub fn exclude_optional(mut self, path: RepoPath, reason: impl Into<String>) -> Self {
        self.optional_excludes.insert(path, reason.into());
        self
    }

    pub fn exclude(mut self, path: RepoPath, reason: impl Into<String>) -> Self {
        self.excluded_files.insert(path, reason.into());
        self
    }

    pub fn protect(mut self, path: RepoPath, reason: impl Into<String>) -> Self {
        self.protected_files.insert(path, reason.into());
        self
    }

    pub fn mark_obsolete(mut self, path: RepoPath, reason: impl Into<String>) -> Self {
        self.obsolete_files.insert(path, reason.into());
        self
    }

    pub fn mirror_required(mut self, path: RepoPath, reason: impl Into<String>) -> Self {
        self.declared_required.insert(path, reason.into());
        self
    }

    // --- getters ---

    pub fn schema_version(&self) -> SchemaVersion {
        self.schema_version
    }

    pub fn last_synced(&self) -> Option<DateTime<Utc>> {
        self.last_synced
    }

    pub fn sync_enabled(&self) -> bool {
        self.sync_enabled
    }

    pub fn cleanup_mode(&self) -> CleanupMode {
        self.cleanup_mode
    }

    /// Paths explicitly opted in, with their reasons
    pub fn optional_includes(&self) -> &BTreeMap<RepoPath, String> {
        &self.optional_includes
    }

    /// Paths explicitly opted out, with their reasons
    pub fn optional_excludes(&self) -> &BTreeMap<RepoPath, String> {
        &self.optional_excludes
    }

    pub fn excluded_files(&self) -> &BTreeMap<RepoPath, String> {
        &self.excluded_files
    }

    pub fn protected_files(&self) -> &BTreeMap<RepoPath, String> {
        &self.protected_files
    }

    pub fn obsolete_files(&self) -> &BTreeMap<RepoPath, String> {
        &self.obsolete_files
    }

    /// The informational `requiredFiles` mirror; never authoritative
    pub fn declared_required(&self) -> &BTreeMap<RepoPath, String> {
        &self.declared_required
    }

    // --- queries ---

    pub fn is_opted_in(&self, path: &RepoPath) -> bool {
        self.optional_includes.contains_key(path)
    }

    /// Reason the repository refuses `path`, from `excludedFiles` first,
    /// then from the opt-out list.
    pub fn refusal_reason(&self, path: &RepoPath) -> Option<&str> {
        self.excluded_files
            .get(path)
            .or_else(|| self.optional_excludes.get(path))
            .map(String::as_str)
    }

    pub fn protection_reason(&self, path: &RepoPath) -> Option<&str> {
        self.protected_files.get(path).map(String::as_str)
    }

    /// Compare everything the repository owns, ignoring the two
    /// engine-managed fields (`schemaVersion`, `lastSynced`).
    pub fn same_local_sections(&self, other: &OverrideDocument) -> bool {
        self.sync_enabled == other.sync_enabled
            && self.cleanup_mode == other.cleanup_mode
            && self.optional_includes == other.optional_includes
            && self.optional_excludes == other.optional_excludes
            && self.excluded_files == other.excluded_files
            && self.protected_files == other.protected_files
            && self.obsolete_files == other.obsolete_files
            && self.declared_required == other.declared_required
    }
}
