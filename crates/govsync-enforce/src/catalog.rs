//! Compiled-in enforcement catalog
//!
//! The table below is the only source of catalog entries. It is built once
//! on first use and shared by reference across all repository workers.

use std::sync::OnceLock;

use govsync_core::domain::{Catalog, CatalogEntry, EnforcementLevel, RepoPath};

use govsync_core::domain::EnforcementLevel::{Forced, Optional, Required, Suggested};

const ENTRIES: &[(&str, EnforcementLevel, &str)] = &[
    // Forced: the validation pipeline itself and licensing
    (
        ".github/workflows/standards-validation.yml",
        Forced,
        "organization standards validation pipeline",
    ),
    (
        "scripts/validate-standards.sh",
        Forced,
        "validator invoked by the standards pipeline",
    ),
    ("LICENSE", Forced, "organization license terms"),
    // Required
    (".github/workflows/ci.yml", Required, "baseline continuous integration"),
    (
        ".github/workflows/security-scan.yml",
        Required,
        "dependency and secret scanning",
    ),
    (".github/dependabot.yml", Required, "automated dependency updates"),
    ("SECURITY.md", Required, "vulnerability disclosure policy"),
    // Suggested
    (".editorconfig", Suggested, "shared editor settings"),
    (
        ".github/pull_request_template.md",
        Suggested,
        "pull request checklist",
    ),
    (".pre-commit-config.yaml", Suggested, "local pre-commit hooks"),
    ("CONTRIBUTING.md", Suggested, "contribution guidelines"),
    // Optional
    (
        ".github/workflows/performance.yml",
        Optional,
        "benchmark regression checks",
    ),
    (".github/workflows/release.yml", Optional, "tagged release automation"),
    (".github/workflows/stale.yml", Optional, "stale issue triage"),
];

static BUILTIN: OnceLock<Catalog> = OnceLock::new();

/// The organization catalog compiled into this binary
pub fn builtin() -> &'static Catalog {
    BUILTIN.get_or_init(|| {
        Catalog::new(ENTRIES.iter().filter_map(|(path, level, reason)| {
            match RepoPath::new(*path) {
                Ok(path) => Some(CatalogEntry::new(path, *level, *reason)),
                Err(e) => {
                    tracing::error!(path = %path, error = %e, "Invalid built-in catalog path");
                    None
                }
            }
        }))
    })
}
