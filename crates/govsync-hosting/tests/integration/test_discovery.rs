//! Repository discovery against the orgs, users and repos endpoints

use govsync_core::ports::IHostingPlatform;
use govsync_hosting::HostingError;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_list_repositories_follows_pages() {
    let (server, platform) = common::setup_github_mock(0).await;

    let first: Vec<_> = (0..100)
        .map(|i| common::repo_json("acme", &format!("repo-{i:03}"), false))
        .collect();
    Mock::given(method("GET"))
        .and(path("/orgs/acme/repos"))
        .and(query_param("page", "1"))
        .and(query_param("per_page", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(first))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orgs/acme/repos"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(vec![common::repo_json("acme", "aaa-last-page", true)]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let repos = platform.list_repositories("acme").await.unwrap();

    assert_eq!(repos.len(), 101);
    assert_eq!(repos[0].id.to_string(), "acme/aaa-last-page");
    assert!(repos[0].archived);
    assert_eq!(repos[100].id.to_string(), "acme/repo-099");
}

#[tokio::test]
async fn test_list_repositories_falls_back_to_user() {
    let (server, platform) = common::setup_github_mock(0).await;

    Mock::given(method("GET"))
        .and(path("/orgs/octo/repos"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "message": "Not Found"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/octo/repos"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(vec![common::repo_json("octo", "dotfiles", false)]),
        )
        .mount(&server)
        .await;

    let repos = platform.list_repositories("octo").await.unwrap();
    assert_eq!(repos.len(), 1);
    assert_eq!(repos[0].id.to_string(), "octo/dotfiles");
}

#[tokio::test]
async fn test_get_repository() {
    let (server, platform) = common::setup_github_mock(0).await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "widgets",
            "owner": { "login": "acme" },
            "default_branch": "trunk",
            "archived": false
        })))
        .mount(&server)
        .await;

    let info = platform.get_repository(&common::repo()).await.unwrap();
    assert_eq!(info.id, common::repo());
    assert_eq!(info.default_branch, "trunk");
    assert!(!info.archived);
}

#[tokio::test]
async fn test_get_repository_unauthorized() {
    let (server, platform) = common::setup_github_mock(0).await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "message": "Bad credentials"
        })))
        .mount(&server)
        .await;

    let err = platform.get_repository(&common::repo()).await.unwrap_err();
    match err.downcast_ref::<HostingError>() {
        Some(HostingError::Unauthorized(detail)) => assert!(detail.contains("Bad credentials")),
        other => panic!("expected Unauthorized, got {other:?}"),
    }
}
