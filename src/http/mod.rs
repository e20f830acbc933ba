//! HTTP fetcher module
//!
//! Provides the rate-limited page fetcher used by the pagination driver.
//!
//! # Features
//!
//! - **One request per call**: retries are the caller's decision
//! - **Quota cool-down**: pauses when `X-RateLimit-Remaining` hits the threshold
//! - **Pacing**: optional token bucket rate limiter using governor
//! - **Coarse classification**: every transport or HTTP error is transient

mod client;
mod rate_limit;

pub use client::{
    redact_url, with_cursor, FetcherConfig, FetcherConfigBuilder, Fetcher, HttpFetcher, RawPage,
    API_KEY_PARAM, CURSOR_PARAM,
};
pub use rate_limit::{QuotaPolicy, RateLimiter, RateLimiterConfig, RATE_LIMIT_REMAINING_HEADER};
