//! Catalog command - Print the compiled enforcement catalog

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use govsync_core::domain::EnforcementLevel;

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct CatalogCommand {
    /// Only show entries at this level
    #[arg(long, value_parser = parse_level)]
    pub level: Option<EnforcementLevel>,
}

fn parse_level(raw: &str) -> Result<EnforcementLevel, String> {
    raw.parse().map_err(|e| format!("{e}"))
}

impl CatalogCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<ExitCode> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json), false);
        let catalog = govsync_enforce::builtin();

        // Highest level first, then by path
        let mut entries: Vec<_> = catalog
            .entries()
            .filter(|e| self.level.map_or(true, |level| e.level() == level))
            .collect();
        entries.sort_by(|a, b| b.level().cmp(&a.level()).then_with(|| a.path().cmp(b.path())));

        if matches!(format, OutputFormat::Json) {
            let json: Vec<serde_json::Value> = entries
                .iter()
                .map(|e| {
                    serde_json::json!({
                        "path": e.path().as_str(),
                        "level": e.level().as_str(),
                        "reason": e.reason(),
                    })
                })
                .collect();
            formatter.print_json(&serde_json::Value::Array(json));
            return Ok(ExitCode::SUCCESS);
        }

        let width = entries
            .iter()
            .map(|e| e.path().as_str().len())
            .max()
            .unwrap_or(4);
        println!("{:<9}  {:<width$}  REASON", "LEVEL", "PATH");
        for entry in &entries {
            println!(
                "{:<9}  {:<width$}  {}",
                entry.level().as_str(),
                entry.path().as_str(),
                entry.reason()
            );
        }
        formatter.info(&format!("{} entries", entries.len()));
        Ok(ExitCode::SUCCESS)
    }
}
