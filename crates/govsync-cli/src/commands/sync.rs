//! Sync command - Synchronize governance files into repositories
//!
//! Provides the `govsync sync` CLI command which:
//! 1. Validates configuration and reads the API token from the environment
//! 2. Creates the GitHub adapter and the catalog content source
//! 3. Runs the Orchestrator with Ctrl+C / SIGTERM wired to cancellation
//! 4. Prints the per-repository summary table (or the report as JSON),
//!    empty when the organization could not be listed

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use govsync_audit::AuditLogger;
use govsync_core::config::Config;
use govsync_core::domain::{RepositoryId, RunReport};
use govsync_core::ports::{ICatalogContentSource, IHostingPlatform};
use govsync_hosting::{GitHubPlatform, HostingClient};
use govsync_sync::content::{DirectoryContentSource, RepositoryContentSource};
use govsync_sync::retry::RetryPolicy;
use govsync_sync::{Orchestrator, RunOptions, SyncError, SyncExecutor, Targets};

use super::EXIT_FAILURE;
use crate::output::{get_formatter, render_summary, OutputFormat};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Organization (or user) owning the repositories
    #[arg(long)]
    pub org: String,

    /// Only synchronize this repository; can be repeated
    #[arg(long = "repo", value_name = "NAME")]
    pub repos: Vec<String>,

    /// Show what would be done without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Leave archived repositories alone
    #[arg(long)]
    pub skip_archived: bool,

    /// Report required files as forced in audit logs
    #[arg(long)]
    pub force_override: bool,
}

impl SyncCommand {
    pub async fn execute(&self, format: OutputFormat, quiet: bool, config: &Config) -> Result<ExitCode> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json), quiet);

        // Step 1: Configuration and credentials, before any network access
        let errors = config.validate();
        if !errors.is_empty() {
            let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
            bail!("Invalid configuration: {}", details.join("; "));
        }
        let targets = self.targets()?;
        let token = read_token(&config.hosting.token_env)?;

        // Step 2: Adapters
        let client = Arc::new(HostingClient::from_config(&config.hosting, token));
        let platform: Arc<dyn IHostingPlatform> = Arc::new(
            GitHubPlatform::new(Arc::clone(&client)).with_branch(config.hosting.branch.clone()),
        );
        let content = content_source(config, &client)?;
        info!(source = %content.describe(), "Using catalog content source");

        let retry = RetryPolicy {
            max_retries: config.hosting.max_retries,
            base_delay: Duration::from_secs(1),
        };
        let executor = SyncExecutor::new(Arc::clone(&platform), content)
            .with_commit_message(config.sync.commit_message.clone())
            .with_retry(retry);

        // Step 3: Run with cancellation on Ctrl+C / SIGTERM
        let cancel = CancellationToken::new();
        let orchestrator = Orchestrator::new(platform, executor)
            .with_audit(AuditLogger::new(&config.audit.dir))
            .with_max_parallel(config.sync.max_parallel_repositories as usize)
            .with_cancellation(cancel.clone());

        let signal = tokio::spawn(shutdown_signal(cancel));

        if self.dry_run {
            formatter.info("Dry run mode - no changes will be made");
        }
        let report = orchestrator
            .run(
                &self.org,
                targets,
                RunOptions {
                    dry_run: self.dry_run,
                    skip_archived: self.skip_archived,
                    force_override: self.force_override,
                },
            )
            .await;
        signal.abort();
        let (report, code) = match report {
            Ok(report) => {
                let code = report.exit_code();
                (report, code)
            }
            Err(e @ SyncError::Discovery { .. }) => {
                formatter.error(&format!("{e:#}"));
                discovery_failed(&self.org, self.dry_run)
            }
            Err(e) => return Err(e.into()),
        };

        // Step 4: Display results
        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::to_value(&report)?);
        } else {
            print!("{}", render_summary(&report));
            for row in report.repositories.iter().filter(|r| r.error.is_some()) {
                formatter.warn(&format!(
                    "{}: {}",
                    row.repository,
                    row.error.as_deref().unwrap_or_default()
                ));
            }
            if !report.abandoned.is_empty() {
                formatter.warn(&format!(
                    "Cancelled: {} repositor{} not synchronized",
                    report.abandoned.len(),
                    if report.abandoned.len() == 1 { "y" } else { "ies" }
                ));
            }
            if code == 0 {
                formatter.success(&format!(
                    "{} repositor{} in sync",
                    report.repositories.len(),
                    if report.repositories.len() == 1 { "y" } else { "ies" }
                ));
            }
            formatter.info(&format!("Audit logs: {}", config.audit.dir.display()));
        }

        Ok(ExitCode::from(code))
    }

    /// `--repo` accepts `name` (within `--org`) or `owner/name`
    fn targets(&self) -> Result<Targets> {
        if self.repos.is_empty() {
            return Ok(Targets::Organization);
        }
        let ids = self
            .repos
            .iter()
            .map(|repo| {
                let id = if repo.contains('/') {
                    repo.parse::<RepositoryId>()
                } else {
                    RepositoryId::new(self.org.as_str(), repo.as_str())
                };
                id.with_context(|| format!("Invalid --repo value '{repo}'"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Targets::Explicit(ids))
    }
}

/// An unlistable organization has already been contacted over the network,
/// so it fails the run rather than the invocation and still gets a table
fn discovery_failed(org: &str, dry_run: bool) -> (RunReport, u8) {
    (RunReport::new(org, dry_run).finish(), EXIT_FAILURE)
}

fn read_token(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => bail!("Environment variable {var} is not set; it must hold the API token"),
    }
}

/// Template repository when configured, else the local templates directory
fn content_source(
    config: &Config,
    client: &Arc<HostingClient>,
) -> Result<Arc<dyn ICatalogContentSource>> {
    if let Some(repo) = &config.catalog.template_repository {
        let repository: RepositoryId = repo
            .parse()
            .with_context(|| format!("Invalid catalog.template_repository '{repo}'"))?;
        // Templates are read from the default branch, not the sync branch
        let templates: Arc<dyn IHostingPlatform> =
            Arc::new(GitHubPlatform::new(Arc::clone(client)));
        return Ok(Arc::new(RepositoryContentSource::new(templates, repository)));
    }

    let dir = config
        .catalog
        .templates_dir
        .as_ref()
        .context("catalog.templates_dir is not set")?;
    if !dir.is_dir() {
        bail!("Templates directory {} does not exist", dir.display());
    }
    Ok(Arc::new(DirectoryContentSource::new(dir)))
}

/// Cancels `token` on Ctrl+C or SIGTERM; sessions already running finish
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
    warn!("Cancelling: running repositories will finish, the rest are skipped");
    token.cancel();
}
