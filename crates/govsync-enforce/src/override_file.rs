//! Canonical override document format
//!
//! Parses `.github/governance-overrides.yml` into an [`OverrideDocument`],
//! renders a document back to canonical YAML, and rewrites the two
//! engine-managed fields of an existing file without touching any other
//! byte.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use govsync_core::domain::{CleanupMode, OverrideDocument, RepoPath, SchemaVersion};

use crate::error::OverrideError;

/// Where the canonical override document lives in every repository
pub const CANONICAL_LOCATION: &str = ".github/governance-overrides.yml";

const RENDER_HEADER: &str = "# Repository overrides for organization governance files.\n\
# schemaVersion and lastSynced are maintained by govsync.\n";

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CanonicalFile {
    // Read from the raw value before deserializing, so numeric versions work.
    #[serde(skip_deserializing)]
    schema_version: Option<String>,
    last_synced: Option<String>,
    sync_enabled: Option<bool>,
    cleanup_mode: Option<String>,
    enforcement_levels: LevelsSection,
    exclude_files: Vec<PathEntry>,
    protected_files: Vec<PathEntry>,
    obsolete_files: Vec<PathEntry>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LevelsSection {
    optional_files: Vec<OptionalEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    suggested_files: Vec<SuggestedEntry>,
    required_files: Vec<PathEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PathEntry {
    path: String,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct OptionalEntry {
    path: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    include: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct SuggestedEntry {
    path: String,
    #[serde(default)]
    reason: String,
    #[serde(default = "default_true")]
    include: bool,
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a canonical override document.
///
/// An empty document yields [`OverrideDocument::default`]. A missing
/// `schemaVersion` is read as the current version.
pub fn parse_canonical(raw: &str, location: &str) -> Result<OverrideDocument, OverrideError> {
    let value: Value =
        serde_yaml::from_str(raw).map_err(|e| OverrideError::malformed(location, e))?;

    if value.is_null() {
        return Ok(OverrideDocument::default());
    }
    if !value.is_mapping() {
        return Err(OverrideError::malformed(
            location,
            "top level must be a mapping",
        ));
    }

    let version = match value.get("schemaVersion") {
        None | Some(Value::Null) => SchemaVersion::CURRENT,
        Some(v) => version_from_value(v, location)?,
    };
    ensure_supported(version, SchemaVersion::CURRENT)?;

    let file: CanonicalFile =
        serde_yaml::from_value(value).map_err(|e| OverrideError::malformed(location, e))?;

    let mut doc = OverrideDocument::default()
        .with_schema_version(version)
        .with_sync_enabled(file.sync_enabled.unwrap_or(true));

    if let Some(ts) = file.last_synced.as_deref() {
        doc = doc.with_last_synced(Some(parse_timestamp(ts, location)?));
    }
    if let Some(mode) = file.cleanup_mode.as_deref() {
        let mode: CleanupMode = mode
            .parse()
            .map_err(|e| OverrideError::malformed(location, e))?;
        doc = doc.with_cleanup_mode(mode);
    }

    for entry in file.enforcement_levels.optional_files {
        let path = checked_path("enforcementLevels.optionalFiles", &entry.path)?;
        doc = if entry.include {
            doc.include_optional(path, entry.reason)
        } else {
            doc.exclude_optional(path, entry.reason)
        };
    }
    for entry in file.enforcement_levels.suggested_files {
        let path = checked_path("enforcementLevels.suggestedFiles", &entry.path)?;
        if !entry.include {
            doc = doc.exclude_optional(path, entry.reason);
        }
    }
    for entry in file.enforcement_levels.required_files {
        let path = checked_path("enforcementLevels.requiredFiles", &entry.path)?;
        doc = doc.mirror_required(path, entry.reason);
    }
    for entry in file.exclude_files {
        let path = checked_path("excludeFiles", &entry.path)?;
        doc = doc.exclude(path, entry.reason);
    }
    for entry in file.protected_files {
        let path = checked_path("protectedFiles", &entry.path)?;
        doc = doc.protect(path, entry.reason);
    }
    for entry in file.obsolete_files {
        let path = checked_path("obsoleteFiles", &entry.path)?;
        doc = doc.mark_obsolete(path, entry.reason);
    }

    ensure_no_contradictions(&doc, location)?;
    Ok(doc)
}

pub(crate) fn version_from_value(
    value: &Value,
    location: &str,
) -> Result<SchemaVersion, OverrideError> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(OverrideError::malformed(
                location,
                format!("schemaVersion must be a string, got {other:?}"),
            ))
        }
    };
    text.parse()
        .map_err(|e| OverrideError::malformed(location, e))
}

/// Reject versions whose major component is newer than `supported`
pub(crate) fn ensure_supported(
    found: SchemaVersion,
    supported: SchemaVersion,
) -> Result<(), OverrideError> {
    if found.major() > supported.major() {
        return Err(OverrideError::UnknownSchema { found, supported });
    }
    Ok(())
}

pub(crate) fn checked_path(field: &'static str, raw: &str) -> Result<RepoPath, OverrideError> {
    RepoPath::new(raw.trim()).map_err(|_| OverrideError::UnsafePath {
        field,
        path: raw.to_string(),
    })
}

pub(crate) fn ensure_no_contradictions(
    doc: &OverrideDocument,
    location: &str,
) -> Result<(), OverrideError> {
    if let Some(path) = doc
        .optional_includes()
        .keys()
        .find(|p| doc.optional_excludes().contains_key(*p))
    {
        return Err(OverrideError::malformed(
            location,
            format!("{path} is both included and excluded"),
        ));
    }
    Ok(())
}

fn parse_timestamp(raw: &str, location: &str) -> Result<DateTime<Utc>, OverrideError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| OverrideError::malformed(location, format!("lastSynced: {e}")))
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ============================================================================
// Rendering
// ============================================================================

/// Render `doc` as a fresh canonical document.
///
/// Used when migrating from a legacy format; opt-outs are written as
/// `optionalFiles` entries with `include: false`.
pub fn render_canonical(doc: &OverrideDocument) -> Result<String, OverrideError> {
    let entries = |map: &std::collections::BTreeMap<RepoPath, String>| -> Vec<PathEntry> {
        map.iter()
            .map(|(path, reason)| PathEntry {
                path: path.to_string(),
                reason: reason.clone(),
            })
            .collect()
    };

    let optional_files = doc
        .optional_includes()
        .iter()
        .map(|(p, r)| (p, r, true))
        .chain(doc.optional_excludes().iter().map(|(p, r)| (p, r, false)))
        .map(|(path, reason, include)| OptionalEntry {
            path: path.to_string(),
            reason: reason.clone(),
            include,
        })
        .collect();

    let file = CanonicalFile {
        schema_version: Some(doc.schema_version().to_string()),
        last_synced: doc.last_synced().map(format_timestamp),
        sync_enabled: Some(doc.sync_enabled()),
        cleanup_mode: Some(doc.cleanup_mode().to_string()),
        enforcement_levels: LevelsSection {
            optional_files,
            suggested_files: Vec::new(),
            required_files: entries(doc.declared_required()),
        },
        exclude_files: entries(doc.excluded_files()),
        protected_files: entries(doc.protected_files()),
        obsolete_files: entries(doc.obsolete_files()),
    };

    Ok(format!("{RENDER_HEADER}{}", serde_yaml::to_string(&file)?))
}

// ============================================================================
// In-place rewrite
// ============================================================================

/// Replace (or insert) the top-level `schemaVersion` and `lastSynced`
/// values. Every other byte of `raw` is preserved, line endings and
/// trailing comments on the managed lines included.
pub fn rewrite_managed_fields(raw: &str, version: SchemaVersion, at: DateTime<Utc>) -> String {
    let eol = if raw.contains("\r\n") { "\r\n" } else { "\n" };
    let version_line = format!("schemaVersion: \"{version}\"");
    let synced_line = format!("lastSynced: \"{}\"", format_timestamp(at));

    let mut out = String::with_capacity(raw.len() + version_line.len() + synced_line.len() + 4);
    let mut after_version: Option<usize> = None;
    let mut saw_synced = false;

    for line in raw.split_inclusive('\n') {
        let (body, ending) = split_line_ending(line);
        if after_version.is_none() && is_top_level_key(body, "schemaVersion") {
            out.push_str(&version_line);
            out.push_str(trailing_comment(body));
            out.push_str(ending);
            after_version = Some(out.len());
        } else if !saw_synced && is_top_level_key(body, "lastSynced") {
            out.push_str(&synced_line);
            out.push_str(trailing_comment(body));
            out.push_str(ending);
            saw_synced = true;
        } else {
            out.push_str(line);
        }
    }

    if !saw_synced {
        let at = after_version.unwrap_or_else(|| head_offset(&out));
        insert_line(&mut out, at, &synced_line, eol);
    }
    if after_version.is_none() {
        let at = head_offset(&out);
        insert_line(&mut out, at, &version_line, eol);
    }
    out
}

/// Rewrite a canonical document for the end of a sync session.
///
/// Tries the byte-preserving line edit first and verifies it by parsing
/// the result. Documents the line edit cannot handle (flow style, for
/// instance) are re-rendered from their parsed form instead.
pub fn rewrite_for_sync(
    raw: &str,
    location: &str,
    version: SchemaVersion,
    at: DateTime<Utc>,
) -> Result<String, OverrideError> {
    let before = parse_canonical(raw, location)?;
    let edited = rewrite_managed_fields(raw, version, at);

    match parse_canonical(&edited, location) {
        Ok(after) if after.same_local_sections(&before) && after.schema_version() == version => {
            Ok(edited)
        }
        _ => {
            tracing::warn!(
                location,
                "In-place override rewrite did not verify, rendering canonical document"
            );
            render_canonical(
                &before
                    .with_schema_version(version)
                    .with_last_synced(Some(at)),
            )
        }
    }
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

fn is_top_level_key(body: &str, key: &str) -> bool {
    body.strip_prefix(key)
        .map(|rest| rest.trim_start().starts_with(':'))
        .unwrap_or(false)
}

/// The ` # comment` after a `key: value`, with its leading whitespace
fn trailing_comment(body: &str) -> &str {
    let Some(colon) = body.find(':') else {
        return "";
    };
    let mut quote: Option<char> = None;
    let mut after_space = true;
    for (i, c) in body[colon + 1..].char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '#' && after_space => {
                let start = body[..colon + 1 + i].trim_end().len();
                return &body[start..];
            }
            None => {}
        }
        after_space = c.is_whitespace();
    }
    ""
}

/// Byte offset just past leading comments, blank lines, directives and `---`
fn head_offset(text: &str) -> usize {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.starts_with('%')
            || trimmed == "---"
        {
            offset += line.len();
        } else {
            break;
        }
    }
    offset
}

fn insert_line(out: &mut String, at: usize, line: &str, eol: &str) {
    let mut chunk = String::with_capacity(line.len() + 2 * eol.len());
    if at > 0 && !out[..at].ends_with('\n') {
        chunk.push_str(eol);
    }
    chunk.push_str(line);
    chunk.push_str(eol);
    out.insert_str(at, &chunk);
}
