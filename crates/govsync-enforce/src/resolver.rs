//! Enforcement resolver
//!
//! [`resolve`] is a pure function of the catalog, the repository's override
//! document and the set of candidate paths that currently exist in the
//! repository. It produces one decision per catalog entry, then decisions
//! for obsolete files, plus notices for every repository-local declaration
//! that was ignored or overridden.

use std::collections::BTreeSet;

use tracing::{debug, trace};

use govsync_core::domain::{
    Catalog, CatalogEntry, CleanupMode, Decision, EnforcementLevel, EnforcementNotice,
    NoticeCode, OverrideDocument, Outcome, RepoPath, Resolution,
};

pub const REASON_FORCED: &str = "forced";
pub const REASON_FORCED_IGNORED: &str = "forced, repository override ignored";
pub const REASON_REQUIRED: &str = "required";
pub const REASON_REQUIRED_PROTECTION: &str = "required, protection overridden";
pub const REASON_REQUIRED_EXCLUSION: &str = "required, exclusion ignored";
pub const REASON_SUGGESTED: &str = "suggested";
pub const REASON_EXCLUDED_DEFAULT: &str = "excluded by repository";
pub const REASON_PROTECTED: &str = "protected by repository";
pub const REASON_OPTED_IN: &str = "opted in";
pub const REASON_NOT_OPTED_IN: &str = "not opted in";
pub const REASON_SYNC_DISABLED: &str = "sync disabled";
pub const REASON_CANNOT_REMOVE: &str = "cannot remove enforced file";
pub const REASON_SCHEDULED: &str = "cannot remove file scheduled for sync";
pub const REASON_CLEANUP_DISABLED: &str = "cleanup disabled";

/// Resolve every catalog entry and obsolete file against `doc`.
///
/// `present` must contain every catalog and obsolete path that exists in
/// the repository; paths not in it are treated as absent.
pub fn resolve(catalog: &Catalog, doc: &OverrideDocument, present: &BTreeSet<RepoPath>) -> Resolution {
    let mut resolution = Resolution::default();

    for entry in catalog.entries() {
        let decision = match entry.level() {
            EnforcementLevel::Forced => resolve_forced(entry, doc, &mut resolution.notices),
            _ if !doc.sync_enabled() => skipped(entry, REASON_SYNC_DISABLED),
            EnforcementLevel::Required => resolve_required(entry, doc, &mut resolution.notices),
            EnforcementLevel::Suggested => resolve_suggested(entry, doc),
            EnforcementLevel::Optional => resolve_optional(entry, doc),
        };
        let decision = apply_aggressive_cleanup(decision, doc, present);
        trace!(
            path = %decision.path(),
            outcome = %decision.outcome(),
            reason = decision.reason(),
            "Resolved catalog entry"
        );
        resolution.decisions.push(decision);
    }

    for (path, reason) in doc.obsolete_files() {
        resolve_obsolete(catalog, doc, present, path, reason, &mut resolution);
    }

    for (path, _) in doc.declared_required() {
        let level = catalog.level_of(path);
        if level != Some(EnforcementLevel::Required) {
            let detail = match level {
                Some(level) => format!("catalog level is {level}"),
                None => "not in catalog".to_string(),
            };
            resolution.notices.push(EnforcementNotice::new(
                path.clone(),
                NoticeCode::StaleRequiredMirror,
                detail,
            ));
        }
    }

    debug!(
        decisions = resolution.decisions.len(),
        notices = resolution.notices.len(),
        synced = resolution.count(Outcome::Synced),
        skipped = resolution.count(Outcome::Skipped),
        removed = resolution.count(Outcome::Removed),
        "Resolution complete"
    );
    resolution
}

fn skipped(entry: &CatalogEntry, reason: impl Into<String>) -> Decision {
    Decision::new(entry.path().clone(), Some(entry.level()), Outcome::Skipped, reason)
}

fn synced(entry: &CatalogEntry, reason: impl Into<String>) -> Decision {
    Decision::new(entry.path().clone(), Some(entry.level()), Outcome::Synced, reason)
}

fn non_empty(reason: &str, fallback: &str) -> String {
    if reason.trim().is_empty() {
        fallback.to_string()
    } else {
        reason.to_string()
    }
}

// ============================================================================
// Per-level rules
// ============================================================================

fn resolve_forced(
    entry: &CatalogEntry,
    doc: &OverrideDocument,
    notices: &mut Vec<EnforcementNotice>,
) -> Decision {
    let path = entry.path();
    let before = notices.len();

    if let Some(reason) = doc.excluded_files().get(path) {
        notices.push(EnforcementNotice::new(
            path.clone(),
            NoticeCode::ForcedExclusionIgnored,
            reason.clone(),
        ));
    }
    if let Some(reason) = doc.protected_files().get(path) {
        notices.push(EnforcementNotice::new(
            path.clone(),
            NoticeCode::ForcedProtectionIgnored,
            reason.clone(),
        ));
    }
    if let Some(reason) = doc.optional_excludes().get(path) {
        notices.push(EnforcementNotice::new(
            path.clone(),
            NoticeCode::ForcedOptOutIgnored,
            reason.clone(),
        ));
    }
    if !doc.sync_enabled() {
        debug!(path = %path, "Sync disabled, forced file still synchronized");
    }

    let reason = if notices.len() > before {
        REASON_FORCED_IGNORED
    } else {
        REASON_FORCED
    };
    synced(entry, reason).with_forced_override(true)
}

fn resolve_required(
    entry: &CatalogEntry,
    doc: &OverrideDocument,
    notices: &mut Vec<EnforcementNotice>,
) -> Decision {
    let path = entry.path();

    let refusal = doc.refusal_reason(path);
    if let Some(reason) = refusal {
        notices.push(EnforcementNotice::new(
            path.clone(),
            NoticeCode::RequiredExclusionIgnored,
            reason,
        ));
    }

    if let Some(reason) = doc.protection_reason(path) {
        notices.push(EnforcementNotice::new(
            path.clone(),
            NoticeCode::RequiredProtectionOverridden,
            reason,
        ));
        return synced(entry, REASON_REQUIRED_PROTECTION);
    }

    if refusal.is_some() {
        synced(entry, REASON_REQUIRED_EXCLUSION)
    } else {
        synced(entry, REASON_REQUIRED)
    }
}

fn resolve_suggested(entry: &CatalogEntry, doc: &OverrideDocument) -> Decision {
    let path = entry.path();
    if let Some(reason) = doc.refusal_reason(path) {
        return skipped(entry, non_empty(reason, REASON_EXCLUDED_DEFAULT));
    }
    if doc.protection_reason(path).is_some() {
        return skipped(entry, REASON_PROTECTED);
    }
    synced(entry, REASON_SUGGESTED)
}

fn resolve_optional(entry: &CatalogEntry, doc: &OverrideDocument) -> Decision {
    let path = entry.path();
    if !doc.is_opted_in(path) {
        return skipped(entry, REASON_NOT_OPTED_IN);
    }
    if let Some(reason) = doc.excluded_files().get(path) {
        return skipped(entry, non_empty(reason, REASON_EXCLUDED_DEFAULT));
    }
    if doc.protection_reason(path).is_some() {
        return skipped(entry, REASON_PROTECTED);
    }
    synced(entry, REASON_OPTED_IN)
}

/// Aggressive cleanup removes skipped, present, non-enforced files
fn apply_aggressive_cleanup(
    decision: Decision,
    doc: &OverrideDocument,
    present: &BTreeSet<RepoPath>,
) -> Decision {
    let removable = doc.cleanup_mode() == CleanupMode::Aggressive
        && doc.sync_enabled()
        && decision.outcome() == Outcome::Skipped
        && decision.level().map_or(false, |l| !l.is_enforced())
        && doc.protection_reason(decision.path()).is_none()
        && present.contains(decision.path());

    if !removable {
        return decision;
    }
    let reason = format!("{}; aggressive cleanup", decision.reason());
    Decision::new(decision.path().clone(), decision.level(), Outcome::Removed, reason)
}

// ============================================================================
// Obsolete files
// ============================================================================

fn resolve_obsolete(
    catalog: &Catalog,
    doc: &OverrideDocument,
    present: &BTreeSet<RepoPath>,
    path: &RepoPath,
    reason: &str,
    resolution: &mut Resolution,
) {
    let level = catalog.level_of(path);
    let record = |outcome: Outcome, why: String| Decision::new(path.clone(), level, outcome, why);

    if level.map_or(false, |l| l.is_enforced()) {
        resolution
            .decisions
            .push(record(Outcome::Skipped, REASON_CANNOT_REMOVE.to_string()));
        return;
    }

    // Absent obsolete files produce no decision so reruns stay identical.
    if !present.contains(path) {
        trace!(path = %path, "Obsolete file already absent");
        return;
    }

    let existing = resolution
        .decisions
        .iter()
        .position(|d| d.path() == path);

    let decision = if !doc.sync_enabled() {
        record(Outcome::Skipped, REASON_SYNC_DISABLED.to_string())
    } else if doc.cleanup_mode() == CleanupMode::None {
        record(Outcome::Skipped, REASON_CLEANUP_DISABLED.to_string())
    } else if existing.map_or(false, |i| resolution.decisions[i].outcome() == Outcome::Synced) {
        record(Outcome::Skipped, REASON_SCHEDULED.to_string())
    } else {
        record(Outcome::Removed, non_empty(reason, "obsolete"))
    };

    // A skipped catalog decision for the same path is superseded so each
    // path is acted on once.
    match existing {
        Some(i) if resolution.decisions[i].outcome() != Outcome::Synced => {
            if decision.outcome() == Outcome::Removed {
                resolution.decisions[i] = decision;
            }
        }
        _ => resolution.decisions.push(decision),
    }
}
