//! Backoff for transient hosting errors
//!
//! Transient errors (network failures and server errors) are retried
//! with exponential backoff: 1s, 2s, 4s by default. Anything else is
//! returned on the first failure.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use govsync_hosting::HostingError;
use tracing::{info, warn};

/// How often and how patiently to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Determines whether an error is worth retrying
///
/// Hosting errors are classified by variant. Their messages embed request
/// URLs, and repository or file names must not decide a retry. Rate limits
/// are not retried here: the client already waited out every throttle it
/// was allowed to. Any other error falls back to its rendered chain.
pub fn is_transient_error(err: &anyhow::Error) -> bool {
    if let Some(hosting) = err.chain().find_map(|e| e.downcast_ref::<HostingError>()) {
        return match hosting {
            HostingError::RateLimited { .. } => false,
            other => other.is_transient(),
        };
    }

    let text = format!("{err:#}").to_lowercase();
    const MARKERS: &[&str] = &[
        // Network
        "network error",
        "connection refused",
        "connection reset",
        "timed out",
        "reset by peer",
        "broken pipe",
        // Server side
        "server error",
    ];
    MARKERS.iter().any(|m| text.contains(m))
}

/// Runs `f` until it succeeds, fails permanently or retries run out
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation: &str, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(operation, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if attempt < policy.max_retries && is_transient_error(&err) => {
                let delay = policy.delay(attempt);
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %format!("{err:#}"),
                    "Transient error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
