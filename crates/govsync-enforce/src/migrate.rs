//! Override probes and legacy migration
//!
//! Override documents have lived in several places over time. Each known
//! location is an [`OverrideProbe`]; [`probes`] lists them in priority
//! order. The loader reads each location in turn and the first one that
//! exists wins, even if it then fails to parse.
//!
//! A hit on a legacy probe carries a [`MigrationIntent`]: the executor
//! writes the canonical document and deletes the legacy file at the end of
//! the session.

use serde::Deserialize;
use serde_yaml::Value;

use govsync_core::domain::{CleanupMode, OverrideDocument, SchemaVersion};

use crate::error::OverrideError;
use crate::override_file::{
    checked_path, ensure_no_contradictions, ensure_supported, parse_canonical,
    version_from_value, CANONICAL_LOCATION,
};

/// Legacy YAML format, schema 1.x
pub const LEGACY_YAML_LOCATION: &str = ".github/sync-overrides.yml";

/// Legacy plain-text exclude list
pub const SYNC_EXCLUDE_LOCATION: &str = ".sync-exclude";

/// One recognized override location and its parser
pub trait OverrideProbe: Send + Sync {
    /// Repository-relative path this probe reads
    fn location(&self) -> &'static str;

    /// True if a hit must be migrated to the canonical location
    fn is_legacy(&self) -> bool;

    /// Parse the document found at [`OverrideProbe::location`]
    fn parse(&self, raw: &str) -> Result<OverrideDocument, OverrideError>;
}

/// Instruction to move a legacy document to the canonical location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationIntent {
    pub legacy_location: &'static str,
    pub canonical_location: &'static str,
    pub target_version: SchemaVersion,
}

/// A parsed document and, for legacy sources, how to migrate it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOverride {
    pub document: OverrideDocument,
    pub migration: Option<MigrationIntent>,
}

static PROBES: [&(dyn OverrideProbe); 3] = [&CanonicalProbe, &LegacyYamlProbe, &SyncExcludeProbe];

/// All probes, highest priority first
pub fn probes() -> &'static [&'static dyn OverrideProbe] {
    &PROBES
}

/// Parse raw bytes found by `probe`
pub fn parse_with(
    probe: &dyn OverrideProbe,
    bytes: &[u8],
) -> Result<ParsedOverride, OverrideError> {
    let raw = std::str::from_utf8(bytes)
        .map_err(|e| OverrideError::malformed(probe.location(), e))?;
    let document = probe.parse(raw)?;

    let migration = probe.is_legacy().then(|| MigrationIntent {
        legacy_location: probe.location(),
        canonical_location: CANONICAL_LOCATION,
        target_version: SchemaVersion::CURRENT,
    });

    Ok(ParsedOverride {
        document,
        migration,
    })
}

// ============================================================================
// Canonical
// ============================================================================

/// `.github/governance-overrides.yml`
pub struct CanonicalProbe;

impl OverrideProbe for CanonicalProbe {
    fn location(&self) -> &'static str {
        CANONICAL_LOCATION
    }

    fn is_legacy(&self) -> bool {
        false
    }

    fn parse(&self, raw: &str) -> Result<OverrideDocument, OverrideError> {
        parse_canonical(raw, CANONICAL_LOCATION)
    }
}

// ============================================================================
// Legacy YAML (schema 1.x)
// ============================================================================

/// `.github/sync-overrides.yml`, flat lists keyed `include`, `exclude`,
/// `protect` and `obsolete`
pub struct LegacyYamlProbe;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyFile {
    sync: Option<bool>,
    cleanup: Option<String>,
    include: Vec<LegacyPath>,
    exclude: Vec<LegacyPath>,
    protect: Vec<LegacyPath>,
    obsolete: Vec<LegacyPath>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyPath {
    Bare(String),
    Detailed {
        path: String,
        #[serde(default)]
        reason: String,
    },
}

impl LegacyPath {
    fn into_parts(self) -> (String, String) {
        match self {
            LegacyPath::Bare(path) => (path, String::new()),
            LegacyPath::Detailed { path, reason } => (path, reason),
        }
    }
}

impl OverrideProbe for LegacyYamlProbe {
    fn location(&self) -> &'static str {
        LEGACY_YAML_LOCATION
    }

    fn is_legacy(&self) -> bool {
        true
    }

    fn parse(&self, raw: &str) -> Result<OverrideDocument, OverrideError> {
        let location = LEGACY_YAML_LOCATION;
        let value: Value =
            serde_yaml::from_str(raw).map_err(|e| OverrideError::malformed(location, e))?;
        if value.is_null() {
            return Ok(OverrideDocument::default().with_schema_version(SchemaVersion::LEGACY));
        }
        if !value.is_mapping() {
            return Err(OverrideError::malformed(location, "top level must be a mapping"));
        }

        let version = match value.get("version") {
            None | Some(Value::Null) => SchemaVersion::LEGACY,
            Some(v) => version_from_value(v, location)?,
        };
        ensure_supported(version, SchemaVersion::LEGACY)?;

        let file: LegacyFile =
            serde_yaml::from_value(value).map_err(|e| OverrideError::malformed(location, e))?;

        let mut doc = OverrideDocument::default()
            .with_schema_version(version)
            .with_sync_enabled(file.sync.unwrap_or(true));
        if let Some(mode) = file.cleanup.as_deref() {
            let mode: CleanupMode = mode
                .parse()
                .map_err(|e| OverrideError::malformed(location, e))?;
            doc = doc.with_cleanup_mode(mode);
        }

        for (path, reason) in file.include.into_iter().map(LegacyPath::into_parts) {
            doc = doc.include_optional(checked_path("include", &path)?, reason);
        }
        for (path, reason) in file.exclude.into_iter().map(LegacyPath::into_parts) {
            doc = doc.exclude(checked_path("exclude", &path)?, reason);
        }
        for (path, reason) in file.protect.into_iter().map(LegacyPath::into_parts) {
            doc = doc.protect(checked_path("protect", &path)?, reason);
        }
        for (path, reason) in file.obsolete.into_iter().map(LegacyPath::into_parts) {
            doc = doc.mark_obsolete(checked_path("obsolete", &path)?, reason);
        }

        ensure_no_contradictions(&doc, location)?;
        Ok(doc)
    }
}

// ============================================================================
// Legacy .sync-exclude
// ============================================================================

/// `.sync-exclude`: one path per line, `#` comments, optional trailing
/// `# reason`
pub struct SyncExcludeProbe;

impl OverrideProbe for SyncExcludeProbe {
    fn location(&self) -> &'static str {
        SYNC_EXCLUDE_LOCATION
    }

    fn is_legacy(&self) -> bool {
        true
    }

    fn parse(&self, raw: &str) -> Result<OverrideDocument, OverrideError> {
        let mut doc = OverrideDocument::default().with_schema_version(SchemaVersion::LEGACY);

        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (path, reason) = match line.find(" #").or_else(|| line.find("\t#")) {
                Some(idx) => (line[..idx].trim(), line[idx + 2..].trim()),
                None => (line, ""),
            };
            let reason = if reason.is_empty() {
                "listed in .sync-exclude"
            } else {
                reason
            };
            doc = doc.exclude(checked_path("sync-exclude", path)?, reason);
        }

        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::override_file::render_canonical;
    use govsync_core::domain::{ErrorKind, RepoPath};

    fn path(s: &str) -> RepoPath {
        RepoPath::new(s).unwrap()
    }

    #[test]
    fn test_probe_priority_order() {
        let locations: Vec<&str> = probes().iter().map(|p| p.location()).collect();
        assert_eq!(
            locations,
            vec![CANONICAL_LOCATION, LEGACY_YAML_LOCATION, SYNC_EXCLUDE_LOCATION]
        );
        assert!(!probes()[0].is_legacy());
        assert!(probes()[1..].iter().all(|p| p.is_legacy()));
    }

    #[test]
    fn test_canonical_hit_has_no_migration() {
        let parsed = parse_with(&CanonicalProbe, b"syncEnabled: false\n").unwrap();
        assert!(parsed.migration.is_none());
        assert!(!parsed.document.sync_enabled());
    }

    #[test]
    fn test_legacy_yaml_parse() {
        let raw = r#"
version: 1
sync: true
cleanup: none
include:
  - .github/workflows/release.yml
exclude:
  - path: CONTRIBUTING.md
    reason: own guide
protect:
  - .github/workflows/ci.yml
obsolete:
  - path: scripts/old.sh
    reason: deprecated
"#;
        let parsed = parse_with(&LegacyYamlProbe, raw.as_bytes()).unwrap();
        let doc = &parsed.document;

        assert_eq!(doc.schema_version(), SchemaVersion::LEGACY);
        assert_eq!(doc.cleanup_mode(), CleanupMode::None);
        assert!(doc.is_opted_in(&path(".github/workflows/release.yml")));
        assert_eq!(doc.refusal_reason(&path("CONTRIBUTING.md")), Some("own guide"));
        assert_eq!(doc.protection_reason(&path(".github/workflows/ci.yml")), Some(""));
        assert!(doc.obsolete_files().contains_key(&path("scripts/old.sh")));

        let intent = parsed.migration.unwrap();
        assert_eq!(intent.legacy_location, LEGACY_YAML_LOCATION);
        assert_eq!(intent.canonical_location, CANONICAL_LOCATION);
        assert_eq!(intent.target_version, SchemaVersion::CURRENT);
    }

    #[test]
    fn test_legacy_yaml_rejects_v2() {
        let err = parse_with(&LegacyYamlProbe, b"version: 2\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownSchema);
    }

    #[test]
    fn test_legacy_yaml_unsafe_path() {
        let err = parse_with(&LegacyYamlProbe, b"exclude:\n  - ../../etc/passwd\n").unwrap_err();
        assert!(matches!(err, OverrideError::UnsafePath { field: "exclude", .. }));
    }

    #[test]
    fn test_sync_exclude_parse() {
        let raw = "# legacy list\n\nCONTRIBUTING.md  # we have our own\n.editorconfig\n";
        let parsed = parse_with(&SyncExcludeProbe, raw.as_bytes()).unwrap();
        let doc = &parsed.document;

        assert_eq!(doc.excluded_files().len(), 2);
        assert_eq!(
            doc.refusal_reason(&path("CONTRIBUTING.md")),
            Some("we have our own")
        );
        assert_eq!(
            doc.refusal_reason(&path(".editorconfig")),
            Some("listed in .sync-exclude")
        );
        assert_eq!(
            parsed.migration.unwrap().legacy_location,
            SYNC_EXCLUDE_LOCATION
        );
    }

    #[test]
    fn test_sync_exclude_unsafe_path() {
        let err = parse_with(&SyncExcludeProbe, b"/etc/passwd\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsafePath);
    }

    #[test]
    fn test_non_utf8_is_malformed() {
        let err = parse_with(&CanonicalProbe, &[0xff, 0xfe, 0x00]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedOverride);
    }

    #[test]
    fn test_legacy_migration_round_trip() {
        for (probe, raw) in [
            (
                &LegacyYamlProbe as &dyn OverrideProbe,
                "sync: false\ninclude: [a.yml]\nexclude: [{path: b.yml, reason: nope}]\nobsolete: [c.sh]\n",
            ),
            (&SyncExcludeProbe as &dyn OverrideProbe, "b.yml # no\nd.md\n"),
        ] {
            let before = parse_with(probe, raw.as_bytes()).unwrap().document;
            let rendered =
                render_canonical(&before.clone().with_schema_version(SchemaVersion::CURRENT))
                    .unwrap();
            let after = parse_with(&CanonicalProbe, rendered.as_bytes())
                .unwrap()
                .document;

            assert!(before.same_local_sections(&after), "{}", probe.location());
            assert_eq!(after.schema_version(), SchemaVersion::CURRENT);
        }
    }
}
