//! Shared helpers for GitHub API integration tests
//!
//! Each helper mounts the endpoints a test needs on a wiremock server and
//! returns a GitHubPlatform pointed at it.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use govsync_core::domain::{RepoPath, RepositoryId};
use govsync_hosting::client::HostingClient;
use govsync_hosting::rate_limit::{AdaptiveRateLimiter, RateLimitConfig};
use govsync_hosting::GitHubPlatform;

/// Starts a mock server and a platform with generous buckets and
/// `max_retries` throttle retries.
pub async fn setup_github_mock(max_retries: u32) -> (MockServer, GitHubPlatform) {
    let server = MockServer::start().await;
    let limiter = Arc::new(AdaptiveRateLimiter::new(RateLimitConfig::per_minute(
        6000,
        max_retries,
    )));
    let client = HostingClient::with_base_url("test-token", server.uri()).with_rate_limiter(limiter);
    (server, GitHubPlatform::new(Arc::new(client)))
}

pub fn repo() -> RepositoryId {
    RepositoryId::new("acme", "widgets").unwrap()
}

pub fn repo_path(raw: &str) -> RepoPath {
    RepoPath::new(raw).unwrap()
}

pub fn contents_path(raw: &str) -> String {
    format!("/repos/acme/widgets/contents/{raw}")
}

/// Mounts `GET contents/{file}` returning inline base64 content
pub async fn mount_file(server: &MockServer, file: &str, content: &[u8], sha: &str) {
    let encoded = STANDARD.encode(content);
    // GitHub wraps inline content at 60 columns
    let wrapped = encoded
        .as_bytes()
        .chunks(60)
        .map(|c| std::str::from_utf8(c).unwrap())
        .collect::<Vec<_>>()
        .join("\n");

    Mock::given(method("GET"))
        .and(path(contents_path(file)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "type": "file",
            "name": file.rsplit('/').next().unwrap(),
            "path": file,
            "sha": sha,
            "encoding": "base64",
            "content": format!("{wrapped}\n"),
        })))
        .mount(server)
        .await;
}

/// Mounts `GET contents/{file}` answering 404
pub async fn mount_missing(server: &MockServer, file: &str) {
    Mock::given(method("GET"))
        .and(path(contents_path(file)))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "message": "Not Found",
        })))
        .mount(server)
        .await;
}

pub fn repo_json(owner: &str, name: &str, archived: bool) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "full_name": format!("{owner}/{name}"),
        "owner": { "login": owner },
        "default_branch": "main",
        "archived": archived,
    })
}
