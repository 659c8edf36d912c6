//! govsync CLI - Command-line interface for govsync
//!
//! Provides commands for:
//! - Synchronizing governance files across an organization
//! - Printing the compiled enforcement catalog
//! - Explaining how an override file resolves, offline
//! - Generating shell completions
//!
//! Exit codes: `0` every repository succeeded, `1` at least one did not,
//! `2` invocation or configuration error.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use govsync_core::config::Config;

mod commands;
mod output;

use commands::{
    catalog::CatalogCommand, completions::CompletionsCommand, explain::ExplainCommand,
    sync::SyncCommand, EXIT_USAGE,
};
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(
    name = "govsync",
    version,
    about = "Synchronize organization governance files across repositories"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Synchronize governance files into repositories
    Sync(SyncCommand),
    /// Print the compiled enforcement catalog
    Catalog(CatalogCommand),
    /// Show how an override file resolves against the catalog
    Explain(ExplainCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// Explicit `--config` must load; the default path may be missing
fn load_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => {
            let path = Config::default_path();
            if path.exists() {
                Config::load(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))
            } else {
                Ok(Config::default())
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());

    // Setup tracing
    let filter = match (cli.verbose, cli.quiet) {
        (0, true) => "warn".to_string(),
        (0, false) => config
            .as_ref()
            .map(|c| c.logging.level.clone())
            .unwrap_or_else(|_| "info".to_string()),
        (1, _) => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let formatter = get_formatter(cli.json, cli.quiet);

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let result = match cli.command {
        Commands::Sync(cmd) => cmd.execute(format, cli.quiet, &config).await,
        Commands::Catalog(cmd) => cmd.execute(format).await,
        Commands::Explain(cmd) => cmd.execute(format).await,
        Commands::Completions(cmd) => cmd.execute(format).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            ExitCode::from(EXIT_USAGE)
        }
    }
}
