//! Configuration module for govsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::newtypes::RepositoryId;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for govsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub hosting: HostingConfig,
    pub sync: SyncConfig,
    pub catalog: CatalogConfig,
    pub audit: AuditConfig,
    pub logging: LoggingConfig,
}

/// Hosting platform API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostingConfig {
    /// Base URL of the REST API.
    pub api_url: String,
    /// Name of the environment variable holding the API token.
    pub token_env: String,
    /// Maximum in-flight API requests across all repository workers.
    pub max_concurrent_requests: u32,
    /// Steady-state request budget per minute.
    pub requests_per_minute: u32,
    /// Retries for rate-limited or transient API failures.
    pub max_retries: u32,
    /// Branch to commit to. `None` uses each repository's default branch.
    pub branch: Option<String>,
}

/// Orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Repositories processed concurrently.
    pub max_parallel_repositories: u32,
    /// Commit message used for every file write and delete.
    pub commit_message: String,
}

/// Where canonical file content comes from.
///
/// Exactly one of `templates_dir` and `template_repository` is used;
/// `template_repository` wins when both are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Local directory laid out like a repository root.
    pub templates_dir: Option<PathBuf>,
    /// Repository (`owner/name`) holding the canonical files.
    pub template_repository: Option<String>,
}

/// Audit artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Directory receiving session logs, summaries and the `latest` pointer.
    pub dir: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/govsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("govsync")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for HostingConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            token_env: "GOVSYNC_TOKEN".to_string(),
            max_concurrent_requests: 8,
            requests_per_minute: 300,
            max_retries: 3,
            branch: None,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_parallel_repositories: 4,
            commit_message: "chore(governance): sync organization standards".to_string(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            templates_dir: Some(
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("~/.config"))
                    .join("govsync")
                    .join("templates"),
            ),
            template_repository: None,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("govsync")
                .join("audit"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.max_parallel_repositories"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ValidationError {
                field: field.into(),
                message,
            });
        };

        // --- hosting ---
        if !(self.hosting.api_url.starts_with("https://")
            || self.hosting.api_url.starts_with("http://"))
        {
            push(
                "hosting.api_url",
                format!("must be an http(s) URL: {}", self.hosting.api_url),
            );
        }
        if self.hosting.token_env.trim().is_empty() {
            push("hosting.token_env", "must not be empty".into());
        }
        if self.hosting.max_concurrent_requests == 0 {
            push("hosting.max_concurrent_requests", "must be greater than 0".into());
        }
        if self.hosting.requests_per_minute == 0 {
            push("hosting.requests_per_minute", "must be greater than 0".into());
        }
        if matches!(&self.hosting.branch, Some(b) if b.trim().is_empty()) {
            push("hosting.branch", "must not be empty when set".into());
        }

        // --- sync ---
        if self.sync.max_parallel_repositories == 0 || self.sync.max_parallel_repositories > 64 {
            push(
                "sync.max_parallel_repositories",
                "must be in range 1..=64".into(),
            );
        }
        if self.sync.commit_message.trim().is_empty() {
            push("sync.commit_message", "must not be empty".into());
        }

        // --- catalog ---
        match (&self.catalog.templates_dir, &self.catalog.template_repository) {
            (None, None) => push(
                "catalog",
                "one of templates_dir or template_repository must be set".into(),
            ),
            (_, Some(repo)) => {
                if repo.parse::<RepositoryId>().is_err() {
                    push(
                        "catalog.template_repository",
                        format!("expected owner/name, got '{repo}'"),
                    );
                }
            }
            (Some(_), None) => {}
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use govsync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .hosting_api_url("https://github.example.com/api/v3")
///     .sync_max_parallel_repositories(8)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- hosting ---

    pub fn hosting_api_url(mut self, url: impl Into<String>) -> Self {
        self.config.hosting.api_url = url.into();
        self
    }

    pub fn hosting_token_env(mut self, name: impl Into<String>) -> Self {
        self.config.hosting.token_env = name.into();
        self
    }

    pub fn hosting_max_concurrent_requests(mut self, n: u32) -> Self {
        self.config.hosting.max_concurrent_requests = n;
        self
    }

    pub fn hosting_requests_per_minute(mut self, n: u32) -> Self {
        self.config.hosting.requests_per_minute = n;
        self
    }

    pub fn hosting_max_retries(mut self, n: u32) -> Self {
        self.config.hosting.max_retries = n;
        self
    }

    pub fn hosting_branch(mut self, branch: impl Into<String>) -> Self {
        self.config.hosting.branch = Some(branch.into());
        self
    }

    // --- sync ---

    pub fn sync_max_parallel_repositories(mut self, n: u32) -> Self {
        self.config.sync.max_parallel_repositories = n;
        self
    }

    pub fn sync_commit_message(mut self, message: impl Into<String>) -> Self {
        self.config.sync.commit_message = message.into();
        self
    }

    // --- catalog ---

    pub fn catalog_templates_dir(mut self, dir: PathBuf) -> Self {
        self.config.catalog.templates_dir = Some(dir);
        self
    }

    pub fn catalog_template_repository(mut self, repo: impl Into<String>) -> Self {
        self.config.catalog.template_repository = Some(repo.into());
        self
    }

    // --- audit ---

    pub fn audit_dir(mut self, dir: PathBuf) -> Self {
        self.config.audit.dir = dir;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert_eq!(cfg.hosting.api_url, "https://api.github.com");
        assert_eq!(cfg.hosting.token_env, "GOVSYNC_TOKEN");
        assert_eq!(cfg.hosting.max_concurrent_requests, 8);
        assert_eq!(cfg.hosting.requests_per_minute, 300);
        assert_eq!(cfg.hosting.max_retries, 3);
        assert!(cfg.hosting.branch.is_none());
        assert_eq!(cfg.sync.max_parallel_repositories, 4);
        assert!(cfg.catalog.templates_dir.is_some());
        assert!(cfg.catalog.template_repository.is_none());
        assert!(cfg.audit.dir.ends_with("govsync/audit"));
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
hosting:
  api_url: https://github.example.com/api/v3
  token_env: GHE_TOKEN
  max_concurrent_requests: 2
  requests_per_minute: 60
  max_retries: 5
  branch: governance
sync:
  max_parallel_repositories: 10
  commit_message: "ci: standards"
catalog:
  template_repository: acme/standards
audit:
  dir: /tmp/govsync-audit
logging:
  level: debug
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.hosting.api_url, "https://github.example.com/api/v3");
        assert_eq!(cfg.hosting.token_env, "GHE_TOKEN");
        assert_eq!(cfg.hosting.max_concurrent_requests, 2);
        assert_eq!(cfg.hosting.requests_per_minute, 60);
        assert_eq!(cfg.hosting.max_retries, 5);
        assert_eq!(cfg.hosting.branch.as_deref(), Some("governance"));
        assert_eq!(cfg.sync.max_parallel_repositories, 10);
        assert_eq!(cfg.sync.commit_message, "ci: standards");
        assert_eq!(
            cfg.catalog.template_repository.as_deref(),
            Some("acme/standards")
        );
        assert_eq!(cfg.audit.dir, PathBuf::from("/tmp/govsync-audit"));
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn load_partial_yaml_fills_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"sync:\n  max_parallel_repositories: 2\n")
            .unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.sync.max_parallel_repositories, 2);
        assert_eq!(cfg.hosting.api_url, "https://api.github.com");
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg.sync.max_parallel_repositories, 4);
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }

    // -- Validation --

    #[test]
    fn validate_catches_zero_concurrency() {
        let mut cfg = Config::default();
        cfg.hosting.max_concurrent_requests = 0;
        cfg.hosting.requests_per_minute = 0;
        cfg.sync.max_parallel_repositories = 0;
        let errors = cfg.validate();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"hosting.max_concurrent_requests"));
        assert!(fields.contains(&"hosting.requests_per_minute"));
        assert!(fields.contains(&"sync.max_parallel_repositories"));
    }

    #[test]
    fn validate_catches_bad_api_url() {
        let mut cfg = Config::default();
        cfg.hosting.api_url = "api.github.com".to_string();
        assert!(cfg.validate().iter().any(|e| e.field == "hosting.api_url"));
    }

    #[test]
    fn validate_requires_a_catalog_source() {
        let mut cfg = Config::default();
        cfg.catalog.templates_dir = None;
        cfg.catalog.template_repository = None;
        assert!(cfg.validate().iter().any(|e| e.field == "catalog"));
    }

    #[test]
    fn validate_catches_malformed_template_repository() {
        let mut cfg = Config::default();
        cfg.catalog.template_repository = Some("standards".to_string());
        assert!(cfg
            .validate()
            .iter()
            .any(|e| e.field == "catalog.template_repository"));
    }

    #[test]
    fn validate_catches_invalid_log_level() {
        let mut cfg = Config::default();
        cfg.logging.level = "verbose".to_string();
        assert!(cfg.validate().iter().any(|e| e.field == "logging.level"));
    }

    #[test]
    fn validate_accepts_all_valid_log_levels() {
        for level in VALID_LOG_LEVELS {
            let mut cfg = Config::default();
            cfg.logging.level = level.to_string();
            assert!(
                !cfg.validate().iter().any(|e| e.field == "logging.level"),
                "level '{level}' should be valid"
            );
        }
    }

    // -- Builder --

    #[test]
    fn builder_overrides_fields() {
        let cfg = ConfigBuilder::new()
            .hosting_api_url("http://127.0.0.1:9000")
            .hosting_token_env("TOKEN")
            .hosting_max_concurrent_requests(1)
            .hosting_requests_per_minute(30)
            .hosting_max_retries(0)
            .hosting_branch("main")
            .sync_max_parallel_repositories(2)
            .sync_commit_message("sync")
            .catalog_template_repository("acme/standards")
            .audit_dir(PathBuf::from("/tmp/audit"))
            .logging_level("trace")
            .build();

        assert_eq!(cfg.hosting.api_url, "http://127.0.0.1:9000");
        assert_eq!(cfg.hosting.token_env, "TOKEN");
        assert_eq!(cfg.hosting.max_concurrent_requests, 1);
        assert_eq!(cfg.hosting.requests_per_minute, 30);
        assert_eq!(cfg.hosting.max_retries, 0);
        assert_eq!(cfg.hosting.branch.as_deref(), Some("main"));
        assert_eq!(cfg.sync.max_parallel_repositories, 2);
        assert_eq!(cfg.sync.commit_message, "sync");
        assert_eq!(
            cfg.catalog.template_repository.as_deref(),
            Some("acme/standards")
        );
        assert_eq!(cfg.audit.dir, PathBuf::from("/tmp/audit"));
        assert_eq!(cfg.logging.level, "trace");
    }

    #[test]
    fn builder_build_validated_rejects_invalid() {
        let result = ConfigBuilder::new().logging_level("loud").build_validated();
        let errors = result.unwrap_err();
        assert!(errors.iter().any(|e| e.field == "logging.level"));
    }
}
