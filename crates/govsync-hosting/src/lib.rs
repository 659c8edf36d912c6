//! govsync Hosting - GitHub REST adapter
//!
//! Provides the [`IHostingPlatform`](govsync_core::ports::IHostingPlatform)
//! implementation used by the sync engine:
//! - Repository discovery for an organization
//! - Single-file read, write and delete through the contents API
//! - Proactive rate limiting and `Retry-After` / `X-RateLimit-*` handling
//!
//! ## Modules
//!
//! - [`client`] - Authenticated HTTP client with retry on throttling
//! - [`provider`] - `GitHubPlatform`, the port implementation
//! - [`rate_limit`] - Adaptive token buckets per endpoint class

pub mod client;
pub mod provider;
pub mod rate_limit;

pub use client::HostingClient;
pub use provider::GitHubPlatform;

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when talking to the hosting platform
#[derive(Debug, Error)]
pub enum HostingError {
    /// The token is missing, invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The token lacks permission for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested repository or file does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The file changed underneath us (stale blob sha)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limit still exceeded after all retries
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Wait the platform asked for on the last attempt
        retry_after: Duration,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The response could not be parsed or was not what the API documents
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl HostingError {
    /// Returns true for failures worth retrying after a backoff
    pub fn is_transient(&self) -> bool {
        match self {
            HostingError::RateLimited { .. } | HostingError::ServerError(_) => true,
            HostingError::NetworkError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}
