//! Rate limiting
//!
//! Two independent mechanisms:
//! - [`QuotaPolicy`] reads the server's remaining-quota header and decides
//!   when the fetcher must cool down before the quota is refused.
//! - [`RateLimiter`] is optional client-side pacing (token bucket via governor).

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use reqwest::header::HeaderMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Header carrying the number of requests left in the current quota window
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

// ============================================================================
// Server Quota
// ============================================================================

/// When to pause because the server quota is about to run out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaPolicy {
    /// Header to read the remaining quota from
    pub header: String,
    /// Remaining value at which the next call would be refused
    pub threshold: u64,
    /// How long to pause once the threshold is hit
    pub cooldown: Duration,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            header: RATE_LIMIT_REMAINING_HEADER.to_string(),
            threshold: 1,
            cooldown: Duration::from_secs(61 * 60),
        }
    }
}

impl QuotaPolicy {
    /// Create a policy with a custom threshold and cool-down
    pub fn new(threshold: u64, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            ..Self::default()
        }
    }

    /// Remaining quota reported by the response, if the header is present
    pub fn remaining(&self, headers: &HeaderMap) -> Option<u64> {
        headers
            .get(self.header.as_str())
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
    }

    /// Whether the reported remaining quota requires a cool-down
    pub fn should_pause(&self, remaining: Option<u64>) -> bool {
        remaining == Some(self.threshold)
    }
}

// ============================================================================
// Client-side Pacing
// ============================================================================

/// Configuration for client-side pacing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Maximum number of requests per second
    pub requests_per_second: u32,
    /// Burst size (max tokens in bucket)
    pub burst_size: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 1,
            burst_size: 1,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new rate limiter config
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size,
        }
    }
}

/// Token bucket rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config
    pub fn new(config: &RateLimiterConfig) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN),
        )
        .allow_burst(NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN));

        Self {
            limiter: Arc::new(Governor::direct(quota)),
        }
    }

    /// Wait until a request can be made
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish()
    }
}
