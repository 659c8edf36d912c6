//! Explain command - Resolve an override file offline
//!
//! Provides the `govsync explain` CLI command which:
//! 1. Parses a local override file (canonical or legacy, chosen by file name)
//! 2. Resolves it against the compiled catalog
//! 3. Prints every decision with its reason, plus ignored declarations
//!
//! Nothing is read from or written to the hosting platform.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use govsync_core::domain::{RepoPath, Resolution};
use govsync_enforce::migrate::parse_with;
use govsync_enforce::{probes, OverrideProbe, ParsedOverride};

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ExplainCommand {
    /// Override file to resolve; without it, repository defaults apply
    #[arg(long = "override", value_name = "FILE")]
    pub override_file: Option<PathBuf>,

    /// Treat this repository path as present (for cleanup rules); can be repeated
    #[arg(long = "present", value_name = "PATH")]
    pub present: Vec<String>,
}

impl ExplainCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<ExitCode> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json), false);

        let parsed = match &self.override_file {
            Some(path) => Some(read_override(path).await?),
            None => None,
        };
        let present = self
            .present
            .iter()
            .map(|p| RepoPath::new(p.as_str()).with_context(|| format!("Invalid --present '{p}'")))
            .collect::<Result<BTreeSet<_>>>()?;

        let document = parsed
            .as_ref()
            .map(|p| p.document.clone())
            .unwrap_or_default();
        let resolution = govsync_enforce::resolve(govsync_enforce::builtin(), &document, &present);
        info!(
            decisions = resolution.decisions.len(),
            notices = resolution.notices.len(),
            "Resolved override"
        );

        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "schema_version": document.schema_version().to_string(),
                "migrate_from": parsed
                    .as_ref()
                    .and_then(|p| p.migration.as_ref())
                    .map(|m| m.legacy_location),
                "resolution": serde_json::to_value(&resolution)?,
            }));
            return Ok(ExitCode::SUCCESS);
        }

        match (&self.override_file, &parsed) {
            (Some(path), Some(parsed)) => {
                formatter.success(&format!(
                    "{} (schema {})",
                    path.display(),
                    document.schema_version()
                ));
                if let Some(migration) = &parsed.migration {
                    formatter.info(&format!(
                        "Legacy format: a sync migrates it to {}",
                        migration.canonical_location
                    ));
                }
            }
            _ => formatter.success("No override file: repository defaults"),
        }
        print!("{}", render_resolution(&resolution));
        Ok(ExitCode::SUCCESS)
    }
}

/// Parser for `path`, matched on file name; canonical when nothing matches
fn probe_for(path: &Path) -> &'static dyn OverrideProbe {
    let name = path.file_name();
    probes()
        .iter()
        .copied()
        .find(|probe| Path::new(probe.location()).file_name() == name)
        .unwrap_or(probes()[0])
}

async fn read_override(path: &Path) -> Result<ParsedOverride> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let probe = probe_for(path);
    info!(path = %path.display(), format = probe.location(), "Parsing override file");
    Ok(parse_with(probe, &bytes)?)
}

fn render_resolution(resolution: &Resolution) -> String {
    let mut out = String::new();
    let width = resolution
        .decisions
        .iter()
        .map(|d| d.path().as_str().len())
        .max()
        .unwrap_or(4);

    out.push_str(&format!(
        "{:<8} {:<9} {:<width$}  REASON\n",
        "OUTCOME", "LEVEL", "PATH"
    ));
    for decision in &resolution.decisions {
        out.push_str(&format!(
            "{:<8} {:<9} {:<width$}  {}\n",
            decision.outcome().as_str(),
            decision.level().map_or("-", |l| l.as_str()),
            decision.path().as_str(),
            decision.reason()
        ));
    }
    if !resolution.notices.is_empty() {
        out.push_str("\nIgnored or overridden declarations:\n");
        for notice in &resolution.notices {
            out.push_str(&format!(
                "  {} {}: {}\n",
                notice.code(),
                notice.path(),
                notice.detail()
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_chosen_by_file_name() {
        assert_eq!(
            probe_for(Path::new("/tmp/x/.sync-exclude")).location(),
            ".sync-exclude"
        );
        assert_eq!(
            probe_for(Path::new("sync-overrides.yml")).location(),
            ".github/sync-overrides.yml"
        );
        assert_eq!(
            probe_for(Path::new("anything.yaml")).location(),
            ".github/governance-overrides.yml"
        );
    }

    #[tokio::test]
    async fn test_explain_legacy_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".sync-exclude");
        std::fs::write(&path, "CONTRIBUTING.md # own guide\nLICENSE\n").unwrap();

        let parsed = read_override(&path).await.unwrap();
        assert!(parsed.migration.is_some());

        let resolution = govsync_enforce::resolve(
            govsync_enforce::builtin(),
            &parsed.document,
            &BTreeSet::new(),
        );
        let text = render_resolution(&resolution);

        assert!(text.contains("own guide"));
        assert!(text.contains("forced_exclusion_ignored LICENSE"));
    }

    #[tokio::test]
    async fn test_explain_rejects_unsafe_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("governance-overrides.yml");
        std::fs::write(&path, "protectedFiles:\n  - path: /etc/passwd\n    reason: x\n").unwrap();

        let err = read_override(&path).await.unwrap_err();
        assert!(err.to_string().contains("unsafe path"));
    }
}
