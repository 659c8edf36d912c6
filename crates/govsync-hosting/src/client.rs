//! GitHub REST API client
//!
//! Wraps `reqwest::Client` with the bearer token, the versioned media type
//! and the rate-limit machinery shared by every repository worker.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use govsync_hosting::client::HostingClient;
//! use govsync_hosting::rate_limit::EndpointClass;
//! use reqwest::Method;
//!
//! # async fn example() -> Result<(), govsync_hosting::HostingError> {
//! let client = HostingClient::new("token");
//! let url = client.endpoint(&["repos", "acme", "widgets"])?;
//! let response = client
//!     .execute_with_retry(EndpointClass::Discovery, || client.request(Method::GET, url.clone()))
//!     .await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use govsync_core::config::HostingConfig;
use reqwest::{header::HeaderMap, Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::rate_limit::{
    parse_rate_limit_reset, parse_retry_after, AdaptiveRateLimiter, EndpointClass,
    RateLimitConfig,
};
use crate::HostingError;

/// Public GitHub REST endpoint
pub const GITHUB_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";

const MEDIA_TYPE_JSON: &str = "application/vnd.github+json";

/// Wait used when a throttle response carries no usable header
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Default bound on concurrent in-flight requests
const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Error body GitHub returns for most failures
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

// ============================================================================
// HostingClient
// ============================================================================

/// Authenticated HTTP client for the GitHub REST API
///
/// Every call made through [`execute_with_retry`](Self::execute_with_retry)
/// holds a permit from a shared semaphore while in flight and takes a token
/// from the adaptive limiter before it is sent.
pub struct HostingClient {
    client: Client,
    base_url: String,
    token: String,
    user_agent: String,
    in_flight: Arc<Semaphore>,
    rate_limiter: Arc<AdaptiveRateLimiter>,
}

impl std::fmt::Debug for HostingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostingClient")
            .field("base_url", &self.base_url)
            .field("available_permits", &self.in_flight.available_permits())
            .finish()
    }
}

impl HostingClient {
    /// Creates a client for the public GitHub API with default limits
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, GITHUB_API_URL)
    }

    /// Creates a client against a custom base URL (GitHub Enterprise or tests)
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            user_agent: format!("govsync/{}", env!("CARGO_PKG_VERSION")),
            in_flight: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT)),
            rate_limiter: Arc::new(AdaptiveRateLimiter::with_defaults()),
        }
    }

    /// Creates a client from the `hosting` configuration section
    pub fn from_config(config: &HostingConfig, token: impl Into<String>) -> Self {
        Self::with_base_url(token, config.api_url.clone())
            .with_max_concurrent_requests(config.max_concurrent_requests as usize)
            .with_rate_limiter(Arc::new(AdaptiveRateLimiter::new(
                RateLimitConfig::per_minute(config.requests_per_minute, config.max_retries),
            )))
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<AdaptiveRateLimiter>) -> Self {
        self.rate_limiter = limiter;
        self
    }

    pub fn with_max_concurrent_requests(mut self, permits: usize) -> Self {
        self.in_flight = Arc::new(Semaphore::new(permits.max(1)));
        self
    }

    pub fn rate_limiter(&self) -> &Arc<AdaptiveRateLimiter> {
        &self.rate_limiter
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds an endpoint URL from raw path segments.
    ///
    /// Segments are percent-encoded individually, so a repository path like
    /// `docs/my file.md` must be passed split on `/`.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, HostingError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| HostingError::InvalidResponse(format!("invalid base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| {
                HostingError::InvalidResponse(format!(
                    "base URL cannot carry a path: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Creates an authenticated JSON request builder for `url`
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.request_with_accept(method, url, MEDIA_TYPE_JSON)
    }

    /// Same as [`request`](Self::request) with a different media type,
    /// e.g. `application/vnd.github.raw` for undecoded file bodies
    pub fn request_with_accept(&self, method: Method, url: Url, accept: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, accept)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    // ========================================================================
    // execute_with_retry
    // ========================================================================

    /// Sends a request with rate limiting and throttle retries.
    ///
    /// `build` is called once per attempt. Primary (`403` with
    /// `X-RateLimit-Remaining: 0`) and secondary (`429`) rate-limit
    /// responses are retried up to the limiter's `max_retries`, waiting for
    /// `Retry-After`, then `X-RateLimit-Reset`, then a 30 second default.
    ///
    /// Any other status is returned as-is; use [`check`](Self::check) to
    /// turn error statuses into [`HostingError`].
    pub async fn execute_with_retry<F>(
        &self,
        class: EndpointClass,
        build: F,
    ) -> Result<Response, HostingError>
    where
        F: Fn() -> RequestBuilder,
    {
        let max_retries = self.rate_limiter.max_retries();
        let mut attempt = 0;

        loop {
            let response = {
                let _permit = self.in_flight.acquire().await.map_err(|_| {
                    HostingError::InvalidResponse("request pool closed".to_string())
                })?;
                self.rate_limiter.acquire(class).await;
                build().send().await?
            };

            let Some(wait) = throttle_wait(response.status(), response.headers()) else {
                self.rate_limiter.on_success(class);
                if attempt > 0 {
                    info!(url = %response.url(), attempt, "Request succeeded after retry");
                }
                return Ok(response);
            };

            self.rate_limiter.on_throttle(class);
            if attempt >= max_retries {
                warn!(
                    url = %response.url(),
                    attempts = attempt + 1,
                    "Rate limit retries exhausted"
                );
                return Err(HostingError::RateLimited { retry_after: wait });
            }

            info!(
                url = %response.url(),
                attempt,
                retry_after_ms = wait.as_millis() as u64,
                "Rate limited, backing off"
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }

    /// Passes successful responses through and maps error statuses
    pub async fn check(response: Response) -> Result<Response, HostingError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| status.to_string());
        let detail = format!("{message} ({url})");
        debug!(status = status.as_u16(), %detail, "Hosting API error");

        Err(match status {
            StatusCode::UNAUTHORIZED => HostingError::Unauthorized(detail),
            StatusCode::FORBIDDEN => HostingError::Forbidden(detail),
            StatusCode::NOT_FOUND => HostingError::NotFound(detail),
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                HostingError::Conflict(detail)
            }
            s if s.is_server_error() => HostingError::ServerError(detail),
            s => HostingError::InvalidResponse(format!("unexpected status {s}: {detail}")),
        })
    }
}

/// Returns how long to wait if `status`/`headers` describe a rate limit
fn throttle_wait(status: StatusCode, headers: &HeaderMap) -> Option<Duration> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let exhausted = header("x-ratelimit-remaining").map(str::trim) == Some("0");

    let throttled = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && (exhausted || header("retry-after").is_some()));
    if !throttled {
        return None;
    }

    let now = Utc::now();
    let wait = header("retry-after")
        .and_then(|v| parse_retry_after(v, now))
        .or_else(|| {
            header("x-ratelimit-reset")
                .filter(|_| exhausted)
                .and_then(|v| parse_rate_limit_reset(v, now))
        })
        .unwrap_or(DEFAULT_RETRY_AFTER);
    Some(wait)
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_request_builder_sets_auth_and_media_type() {
        let client = HostingClient::new("test-token");
        let url = client.endpoint(&["repos", "acme", "widgets"]).unwrap();
        let request = client.request(Method::GET, url).build().unwrap();

        assert_eq!(
            request.url().as_str(),
            "https://api.github.com/repos/acme/widgets"
        );
        let h = request.headers();
        assert_eq!(h.get("authorization").unwrap(), "Bearer test-token");
        assert_eq!(h.get("accept").unwrap(), MEDIA_TYPE_JSON);
        assert_eq!(h.get("x-github-api-version").unwrap(), API_VERSION);
        assert!(h
            .get("user-agent")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("govsync/"));
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = HostingClient::with_base_url("t", "http://localhost:8080/api/v3/");
        let url = client
            .endpoint(&["repos", "acme", "w", "contents", "docs", "my file.md"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/v3/repos/acme/w/contents/docs/my%20file.md"
        );
    }

    #[test]
    fn test_from_config() {
        let config = HostingConfig {
            api_url: "http://localhost:9000".into(),
            max_concurrent_requests: 2,
            requests_per_minute: 60,
            max_retries: 7,
            ..HostingConfig::default()
        };
        let client = HostingClient::from_config(&config, "t");
        assert_eq!(client.base_url(), "http://localhost:9000");
        assert_eq!(client.rate_limiter().max_retries(), 7);
        assert_eq!(client.in_flight.available_permits(), 2);
    }

    #[test]
    fn test_throttle_wait_secondary_limit() {
        let wait = throttle_wait(StatusCode::TOO_MANY_REQUESTS, &headers(&[("retry-after", "12")]));
        assert_eq!(wait, Some(Duration::from_secs(12)));

        let wait = throttle_wait(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new());
        assert_eq!(wait, Some(DEFAULT_RETRY_AFTER));
    }

    #[test]
    fn test_throttle_wait_primary_limit() {
        let reset = (Utc::now().timestamp() - 1).to_string();
        let wait = throttle_wait(
            StatusCode::FORBIDDEN,
            &headers(&[("x-ratelimit-remaining", "0"), ("x-ratelimit-reset", &reset)]),
        );
        assert_eq!(wait, Some(Duration::ZERO));
    }

    #[test]
    fn test_plain_forbidden_is_not_throttle() {
        assert_eq!(
            throttle_wait(
                StatusCode::FORBIDDEN,
                &headers(&[("x-ratelimit-remaining", "4999")])
            ),
            None
        );
        assert_eq!(throttle_wait(StatusCode::OK, &HeaderMap::new()), None);
        assert_eq!(throttle_wait(StatusCode::NOT_FOUND, &HeaderMap::new()), None);
    }
}
