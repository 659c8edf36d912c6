//! Single-file operations through the contents endpoint

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use govsync_core::ports::IHostingPlatform;
use govsync_hosting::{GitHubPlatform, HostingClient};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_read_file_decodes_wrapped_base64() {
    let (server, platform) = common::setup_github_mock(0).await;
    let content = "root = true\n".repeat(20);
    common::mount_file(&server, ".editorconfig", content.as_bytes(), "abc").await;

    let bytes = platform
        .read_file(&common::repo(), &common::repo_path(".editorconfig"))
        .await
        .unwrap();

    assert_eq!(bytes.as_deref(), Some(content.as_bytes()));
}

#[tokio::test]
async fn test_read_missing_file_is_none() {
    let (server, platform) = common::setup_github_mock(0).await;
    common::mount_missing(&server, "SECURITY.md").await;

    let bytes = platform
        .read_file(&common::repo(), &common::repo_path("SECURITY.md"))
        .await
        .unwrap();
    assert!(bytes.is_none());
}

#[tokio::test]
async fn test_read_large_file_uses_raw_media_type() {
    let (server, platform) = common::setup_github_mock(0).await;

    Mock::given(method("GET"))
        .and(path(common::contents_path("assets/big.bin")))
        .and(header("accept", "application/vnd.github.raw"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 2048]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(common::contents_path("assets/big.bin")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "type": "file",
            "sha": "big",
            "encoding": "none",
            "content": ""
        })))
        .mount(&server)
        .await;

    let bytes = platform
        .read_file(&common::repo(), &common::repo_path("assets/big.bin"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bytes.len(), 2048);
}

#[tokio::test]
async fn test_file_exists() {
    let (server, platform) = common::setup_github_mock(0).await;
    common::mount_file(&server, "LICENSE", b"MIT", "lic").await;
    common::mount_missing(&server, "CONTRIBUTING.md").await;

    let repo = common::repo();
    assert!(platform
        .file_exists(&repo, &common::repo_path("LICENSE"))
        .await
        .unwrap());
    assert!(!platform
        .file_exists(&repo, &common::repo_path("CONTRIBUTING.md"))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_directory_is_not_a_file() {
    let (server, platform) = common::setup_github_mock(0).await;
    Mock::given(method("GET"))
        .and(path(common::contents_path(".github")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"type": "dir", "name": "workflows", "sha": "d1"}
        ])))
        .mount(&server)
        .await;

    let result = platform
        .file_exists(&common::repo(), &common::repo_path(".github"))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_write_new_file_omits_sha() {
    let (server, platform) = common::setup_github_mock(0).await;
    common::mount_missing(&server, "SECURITY.md").await;

    Mock::given(method("PUT"))
        .and(path(common::contents_path("SECURITY.md")))
        .and(body_partial_json(serde_json::json!({
            "message": "chore: sync",
            "content": STANDARD.encode(b"# Security"),
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    platform
        .write_file(
            &common::repo(),
            &common::repo_path("SECURITY.md"),
            b"# Security",
            "chore: sync",
        )
        .await
        .unwrap();

    let put = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.method.as_str() == "PUT")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&put.body).unwrap();
    assert!(body.get("sha").is_none());
    assert!(body.get("branch").is_none());
}

#[tokio::test]
async fn test_overwrite_sends_existing_sha() {
    let (server, platform) = common::setup_github_mock(0).await;
    common::mount_file(&server, ".github/workflows/ci.yml", b"old", "sha-old").await;

    Mock::given(method("PUT"))
        .and(path(common::contents_path(".github/workflows/ci.yml")))
        .and(body_partial_json(serde_json::json!({ "sha": "sha-old" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    platform
        .write_file(
            &common::repo(),
            &common::repo_path(".github/workflows/ci.yml"),
            b"new",
            "m",
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_write_retries_once_on_conflict() {
    let (server, platform) = common::setup_github_mock(0).await;
    common::mount_file(&server, "LICENSE", b"old", "s1").await;

    Mock::given(method("PUT"))
        .and(path(common::contents_path("LICENSE")))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "message": "LICENSE does not match s1"
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(common::contents_path("LICENSE")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    platform
        .write_file(&common::repo(), &common::repo_path("LICENSE"), b"new", "m")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_write_targets_configured_branch() {
    let server = MockServer::start().await;
    let client = Arc::new(HostingClient::with_base_url("t", server.uri()));
    let platform = GitHubPlatform::new(client).with_branch(Some("governance".to_string()));

    Mock::given(method("GET"))
        .and(path(common::contents_path("LICENSE")))
        .and(query_param("ref", "governance"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(common::contents_path("LICENSE")))
        .and(body_partial_json(serde_json::json!({ "branch": "governance" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    platform
        .write_file(&common::repo(), &common::repo_path("LICENSE"), b"x", "m")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_existing_file() {
    let (server, platform) = common::setup_github_mock(0).await;
    common::mount_file(&server, "legacy/old.yml", b"x", "sha-x").await;

    Mock::given(method("DELETE"))
        .and(path(common::contents_path("legacy/old.yml")))
        .and(body_partial_json(serde_json::json!({
            "message": "m",
            "sha": "sha-x"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let deleted = platform
        .delete_file(&common::repo(), &common::repo_path("legacy/old.yml"), "m")
        .await
        .unwrap();
    assert!(deleted);
}

#[tokio::test]
async fn test_delete_absent_file_is_noop() {
    let (server, platform) = common::setup_github_mock(0).await;
    common::mount_missing(&server, "legacy/old.yml").await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let deleted = platform
        .delete_file(&common::repo(), &common::repo_path("legacy/old.yml"), "m")
        .await
        .unwrap();
    assert!(!deleted);
}
