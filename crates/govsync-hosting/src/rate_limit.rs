//! Rate limiting and adaptive throttling for the GitHub REST API
//!
//! GitHub enforces a primary hourly quota plus undocumented secondary
//! limits that are much tighter for content-creating requests. Sending
//! bursts from several repository workers at once is the fastest way to
//! trip them, so every request first takes a token from a bucket sized for
//! its [`EndpointClass`].
//!
//! - [`TokenBucket`]: a single refilling bucket with adaptive capacity
//! - [`AdaptiveRateLimiter`]: one bucket per endpoint class, halved on
//!   throttle and slowly recovered on success

use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Longest wait honoured from a `Retry-After` or reset header
const MAX_HONOURED_WAIT: Duration = Duration::from_secs(3600);

/// Successes needed before effective capacity grows again
const RECOVERY_INTERVAL: u64 = 100;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// EndpointClass
// ============================================================================

/// Logical class of a request, each with its own bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointClass {
    /// Repository listing and lookup
    Discovery,
    /// Contents reads and existence probes
    Read,
    /// Contents creates, updates and deletes
    Write,
}

impl EndpointClass {
    const ALL: [EndpointClass; 3] = [
        EndpointClass::Discovery,
        EndpointClass::Read,
        EndpointClass::Write,
    ];

    fn index(self) -> usize {
        match self {
            EndpointClass::Discovery => 0,
            EndpointClass::Read => 1,
            EndpointClass::Write => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EndpointClass::Discovery => "discovery",
            EndpointClass::Read => "read",
            EndpointClass::Write => "write",
        }
    }
}

impl std::fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TokenBucket
// ============================================================================

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
    effective_capacity: u32,
    successes: u64,
}

/// Token bucket for one endpoint class.
///
/// Tokens refill continuously at `refill_rate` per second up to the
/// effective capacity. Throttle events halve the effective capacity
/// (never below 1); every [`RECOVERY_INTERVAL`] successes grow it back by
/// 5% until the original capacity is reached.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    refill_rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Creates a full bucket
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            refill_rate,
            state: Mutex::new(BucketState {
                tokens: capacity as f64,
                last_refill: Instant::now(),
                effective_capacity: capacity,
                successes: 0,
            }),
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            state.tokens = (state.tokens + elapsed * self.refill_rate)
                .min(state.effective_capacity as f64);
            state.last_refill = now;
        }
    }

    /// Takes one token if available
    pub fn try_acquire(&self) -> bool {
        let mut state = lock(&self.state);
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until the next token becomes available (zero if one is ready)
    pub fn time_until_available(&self) -> Duration {
        let mut state = lock(&self.state);
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            Duration::ZERO
        } else if self.refill_rate > 0.0 {
            Duration::from_secs_f64((1.0 - state.tokens) / self.refill_rate)
        } else {
            MAX_HONOURED_WAIT
        }
    }

    pub fn available_tokens(&self) -> f64 {
        let mut state = lock(&self.state);
        self.refill(&mut state);
        state.tokens
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn effective_capacity(&self) -> u32 {
        lock(&self.state).effective_capacity
    }

    /// Records a successful call for adaptive recovery
    pub fn on_success(&self) {
        let mut state = lock(&self.state);
        state.successes += 1;
        if state.successes % RECOVERY_INTERVAL == 0 && state.effective_capacity < self.capacity {
            let old = state.effective_capacity;
            let increase = ((old as f64) * 0.05).max(1.0) as u32;
            state.effective_capacity = (old + increase).min(self.capacity);
            debug!(
                old_capacity = old,
                new_capacity = state.effective_capacity,
                "Adaptive recovery: increasing bucket capacity"
            );
        }
    }

    /// Records a throttle response: halves effective capacity and drains
    /// tokens above it
    pub fn on_throttle(&self) {
        let mut state = lock(&self.state);
        let old = state.effective_capacity;
        state.effective_capacity = (old / 2).max(1);
        state.tokens = state.tokens.min(state.effective_capacity as f64);
        state.successes = 0;
        warn!(
            old_capacity = old,
            new_capacity = state.effective_capacity,
            "Throttle detected: halving bucket capacity"
        );
    }
}

// ============================================================================
// RateLimitConfig
// ============================================================================

/// Bucket parameters for the adaptive limiter
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// `(capacity, refill tokens per second)` indexed by endpoint class
    pub buckets: [(u32, f64); 3],
    /// Retries after a throttle response before giving up
    pub max_retries: u32,
}

impl RateLimitConfig {
    /// Derives bucket sizes from a per-minute request budget.
    ///
    /// Reads and discovery share the full budget; writes get a quarter of
    /// it, in line with GitHub's secondary limit on content creation.
    pub fn per_minute(requests_per_minute: u32, max_retries: u32) -> Self {
        let rpm = requests_per_minute.max(1);
        let writes = (rpm / 4).max(1);
        Self {
            buckets: [
                (rpm, rpm as f64 / 60.0),
                (rpm, rpm as f64 / 60.0),
                (writes, writes as f64 / 60.0),
            ],
            max_retries,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_minute(300, 3)
    }
}

// ============================================================================
// AdaptiveRateLimiter
// ============================================================================

/// Adaptive limiter shared by every repository worker via `Arc`
#[derive(Debug)]
pub struct AdaptiveRateLimiter {
    buckets: [TokenBucket; 3],
    max_retries: u32,
}

impl AdaptiveRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let [discovery, read, write] = config.buckets;
        Self {
            buckets: [
                TokenBucket::new(discovery.0, discovery.1),
                TokenBucket::new(read.0, read.1),
                TokenBucket::new(write.0, write.1),
            ],
            max_retries: config.max_retries,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RateLimitConfig::default())
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn bucket(&self, class: EndpointClass) -> &TokenBucket {
        &self.buckets[class.index()]
    }

    /// Waits until a token for `class` is available and takes it
    pub async fn acquire(&self, class: EndpointClass) {
        loop {
            let bucket = self.bucket(class);
            if bucket.try_acquire() {
                return;
            }
            let wait = bucket
                .time_until_available()
                .max(Duration::from_millis(10));
            debug!(
                endpoint = %class,
                wait_ms = wait.as_millis() as u64,
                "No tokens available, waiting for refill"
            );
            tokio::time::sleep(wait).await;
        }
    }

    pub fn on_success(&self, class: EndpointClass) {
        self.bucket(class).on_success();
    }

    pub fn on_throttle(&self, class: EndpointClass) {
        info!(endpoint = %class, "Recording throttle event");
        self.bucket(class).on_throttle();
    }

    pub fn effective_capacity(&self, class: EndpointClass) -> u32 {
        self.bucket(class).effective_capacity()
    }

    pub fn available_tokens(&self, class: EndpointClass) -> f64 {
        self.bucket(class).available_tokens()
    }

    /// Effective capacity of every class, for diagnostics
    pub fn snapshot(&self) -> Vec<(EndpointClass, u32)> {
        EndpointClass::ALL
            .into_iter()
            .map(|c| (c, self.effective_capacity(c)))
            .collect()
    }
}

// ============================================================================
// Header parsing
// ============================================================================

/// Parses a `Retry-After` header value.
///
/// Accepts delta-seconds or an HTTP-date. Returns `None` when the value is
/// unusable or asks for more than an hour.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds)).filter(|d| *d <= MAX_HONOURED_WAIT);
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    until(date.with_timezone(&Utc), now)
}

/// Parses `X-RateLimit-Reset` (epoch seconds) into a wait from `now`
pub fn parse_rate_limit_reset(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let epoch = value.trim().parse::<i64>().ok()?;
    let reset = DateTime::from_timestamp(epoch, 0)?;
    until(reset, now)
}

fn until(target: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    if target <= now {
        return Some(Duration::ZERO);
    }
    (target - now)
        .to_std()
        .ok()
        .filter(|d| *d <= MAX_HONOURED_WAIT)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_bucket_starts_full() {
        let bucket = TokenBucket::new(3, 0.0);
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let bucket = TokenBucket::new(0, 1.0);
        assert_eq!(bucket.capacity(), 1);
        assert!(bucket.try_acquire());
    }

    #[test]
    fn test_time_until_available() {
        let bucket = TokenBucket::new(1, 2.0);
        assert_eq!(bucket.time_until_available(), Duration::ZERO);
        assert!(bucket.try_acquire());
        let wait = bucket.time_until_available();
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_millis(500));
    }

    #[test]
    fn test_throttle_halves_capacity() {
        let bucket = TokenBucket::new(100, 1.0);
        bucket.on_throttle();
        assert_eq!(bucket.effective_capacity(), 50);
        assert!(bucket.available_tokens() <= 50.0);
        bucket.on_throttle();
        assert_eq!(bucket.effective_capacity(), 25);
    }

    #[test]
    fn test_throttle_never_below_one() {
        let bucket = TokenBucket::new(4, 1.0);
        for _ in 0..10 {
            bucket.on_throttle();
        }
        assert_eq!(bucket.effective_capacity(), 1);
    }

    #[test]
    fn test_recovery_after_successes() {
        let bucket = TokenBucket::new(100, 1.0);
        bucket.on_throttle();
        for _ in 0..99 {
            bucket.on_success();
        }
        assert_eq!(bucket.effective_capacity(), 50);
        bucket.on_success();
        assert_eq!(bucket.effective_capacity(), 52);
    }

    #[test]
    fn test_recovery_capped_at_capacity() {
        let bucket = TokenBucket::new(10, 1.0);
        for _ in 0..1000 {
            bucket.on_success();
        }
        assert_eq!(bucket.effective_capacity(), 10);
    }

    #[test]
    fn test_per_minute_config() {
        let config = RateLimitConfig::per_minute(120, 5);
        assert_eq!(config.buckets[0], (120, 2.0));
        assert_eq!(config.buckets[2], (30, 0.5));
        assert_eq!(config.max_retries, 5);

        let tiny = RateLimitConfig::per_minute(0, 1);
        assert_eq!(tiny.buckets[2].0, 1);
    }

    #[test]
    fn test_limiter_classes_are_independent() {
        let limiter = AdaptiveRateLimiter::new(RateLimitConfig::per_minute(40, 3));
        limiter.on_throttle(EndpointClass::Write);
        assert_eq!(limiter.effective_capacity(EndpointClass::Write), 5);
        assert_eq!(limiter.effective_capacity(EndpointClass::Read), 40);
        assert_eq!(
            limiter.snapshot(),
            vec![
                (EndpointClass::Discovery, 40),
                (EndpointClass::Read, 40),
                (EndpointClass::Write, 5),
            ]
        );
    }

    #[tokio::test]
    async fn test_acquire_waits_for_refill() {
        let limiter = AdaptiveRateLimiter::new(RateLimitConfig {
            buckets: [(1, 1000.0), (1, 1000.0), (1, 1000.0)],
            max_retries: 0,
        });
        limiter.acquire(EndpointClass::Read).await;
        limiter.acquire(EndpointClass::Read).await;
        assert!(limiter.available_tokens(EndpointClass::Read) < 1.0);
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        let now = Utc::now();
        assert_eq!(parse_retry_after("30", now), Some(Duration::from_secs(30)));
        assert_eq!(parse_retry_after(" 0 ", now), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("7200", now), None);
        assert_eq!(parse_retry_after("soon", now), None);
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(
            parse_retry_after("Thu, 01 Jan 2026 12:00:45 GMT", now),
            Some(Duration::from_secs(45))
        );
        assert_eq!(
            parse_retry_after("Thu, 01 Jan 2026 11:00:00 GMT", now),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_parse_rate_limit_reset() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let reset = (now.timestamp() + 90).to_string();
        assert_eq!(
            parse_rate_limit_reset(&reset, now),
            Some(Duration::from_secs(90))
        );
        assert_eq!(
            parse_rate_limit_reset(&(now.timestamp() - 5).to_string(), now),
            Some(Duration::ZERO)
        );
        assert_eq!(parse_rate_limit_reset("never", now), None);
    }
}
