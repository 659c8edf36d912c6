//! Rate-limit responses and adaptive backoff

use govsync_core::ports::IHostingPlatform;
use govsync_hosting::rate_limit::EndpointClass;
use govsync_hosting::HostingError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

fn repo_body() -> serde_json::Value {
    common::repo_json("acme", "widgets", false)
}

#[tokio::test]
async fn test_secondary_limit_is_retried() {
    let (server, platform) = common::setup_github_mock(2).await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repo_body()))
        .expect(1)
        .mount(&server)
        .await;

    let before = platform
        .client()
        .rate_limiter()
        .effective_capacity(EndpointClass::Discovery);
    let info = platform.get_repository(&common::repo()).await.unwrap();

    assert_eq!(info.id, common::repo());
    assert_eq!(
        platform
            .client()
            .rate_limiter()
            .effective_capacity(EndpointClass::Discovery),
        before / 2
    );
}

#[tokio::test]
async fn test_primary_limit_waits_for_reset() {
    let (server, platform) = common::setup_github_mock(1).await;
    let reset = (chrono::Utc::now().timestamp() - 1).to_string();

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("X-RateLimit-Remaining", "0")
                .insert_header("X-RateLimit-Reset", reset.as_str())
                .set_body_json(serde_json::json!({"message": "API rate limit exceeded"})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repo_body()))
        .mount(&server)
        .await;

    assert!(platform.get_repository(&common::repo()).await.is_ok());
}

#[tokio::test]
async fn test_retry_limit_exhausted() {
    let (server, platform) = common::setup_github_mock(1).await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .expect(2)
        .mount(&server)
        .await;

    let err = platform.get_repository(&common::repo()).await.unwrap_err();
    let hosting = err.downcast_ref::<HostingError>();
    assert!(
        matches!(hosting, Some(HostingError::RateLimited { .. })),
        "got {err:?}"
    );
    assert!(hosting.is_some_and(HostingError::is_transient));
}

#[tokio::test]
async fn test_permission_denied_is_not_retried() {
    let (server, platform) = common::setup_github_mock(3).await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("X-RateLimit-Remaining", "4000")
                .set_body_json(serde_json::json!({"message": "Resource not accessible"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = platform.get_repository(&common::repo()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HostingError>(),
        Some(HostingError::Forbidden(_))
    ));
}
