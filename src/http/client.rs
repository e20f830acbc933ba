//! Rate-limited page fetcher
//!
//! Issues exactly one GET per call and never retries on its own: retry
//! bookkeeping belongs to the pagination driver. What the fetcher does own
//! is the quota cool-down, so a caller never sees a refused request because
//! the server quota ran out.

use super::rate_limit::{QuotaPolicy, RateLimiter, RateLimiterConfig};
use crate::error::{Error, Result};
use crate::sleep::Sleeper;
use crate::types::{Cursor, JsonValue};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Query parameter carrying the pagination cursor
pub const CURSOR_PARAM: &str = "last_index";

/// Query parameter carrying the API key
pub const API_KEY_PARAM: &str = "api_key";

/// A successfully fetched, JSON-decoded response body
#[derive(Debug, Clone, PartialEq)]
pub struct RawPage {
    /// Decoded JSON body
    pub body: JsonValue,
    /// Remaining server quota, when the response reported it
    pub rate_limit_remaining: Option<u64>,
}

impl RawPage {
    /// Create a page without quota information
    pub fn new(body: JsonValue) -> Self {
        Self {
            body,
            rate_limit_remaining: None,
        }
    }
}

/// Fetches one page of an endpoint's result stream
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the page that follows `cursor` (or the first page when `None`)
    ///
    /// Every failure is reported as a retryable `Error::Transient`, except
    /// `Error::Cancelled` when shutdown interrupts a cool-down.
    async fn fetch(&self, url: &Url, cursor: Option<Cursor>) -> Result<RawPage>;
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the HTTP fetcher
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Server quota handling
    pub quota: QuotaPolicy,
    /// Client-side pacing
    pub rate_limit: Option<RateLimiterConfig>,
    /// Query parameter name for the cursor
    pub cursor_param: String,
    /// User agent string
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            quota: QuotaPolicy::default(),
            rate_limit: Some(RateLimiterConfig::default()),
            cursor_param: CURSOR_PARAM.to_string(),
            user_agent: format!("fec-schedules/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl FetcherConfig {
    /// Create a new config builder
    pub fn builder() -> FetcherConfigBuilder {
        FetcherConfigBuilder::default()
    }
}

/// Builder for fetcher config
#[derive(Default)]
pub struct FetcherConfigBuilder {
    config: FetcherConfig,
}

impl FetcherConfigBuilder {
    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the quota policy
    pub fn quota(mut self, quota: QuotaPolicy) -> Self {
        self.config.quota = quota;
        self
    }

    /// Set client-side pacing
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable client-side pacing
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Set the cursor query parameter name
    pub fn cursor_param(mut self, param: impl Into<String>) -> Self {
        self.config.cursor_param = param.into();
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> FetcherConfig {
        self.config
    }
}

// ============================================================================
// HTTP Fetcher
// ============================================================================

/// Fetcher backed by reqwest
pub struct HttpFetcher {
    client: Client,
    config: FetcherConfig,
    rate_limiter: Option<RateLimiter>,
    sleeper: Arc<dyn Sleeper>,
}

impl HttpFetcher {
    /// Create a new fetcher; cool-downs go through `sleeper`
    pub fn new(config: FetcherConfig, sleeper: Arc<dyn Sleeper>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            rate_limiter,
            sleeper,
        })
    }

    /// Get the fetcher configuration
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Build the request URL for a cursor
    pub fn page_url(&self, url: &Url, cursor: Option<Cursor>) -> Url {
        with_cursor(url, &self.config.cursor_param, cursor)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, cursor: Option<Cursor>) -> Result<RawPage> {
        let page_url = self.page_url(url, cursor);
        let display_url = redact_url(&page_url);

        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }

        debug!(url = %display_url, "Fetching page");

        let response = self
            .client
            .get(page_url)
            .send()
            .await
            .map_err(|e| Error::transient(&display_url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::transient(
                &display_url,
                format!("HTTP {}: {}", status.as_u16(), truncate(&body, 200)),
            ));
        }

        let remaining = self.config.quota.remaining(response.headers());

        let body: JsonValue = response
            .json()
            .await
            .map_err(|e| Error::transient(&display_url, format!("Unreadable body: {e}")))?;

        if self.config.quota.should_pause(remaining) {
            warn!(
                remaining = remaining.unwrap_or_default(),
                cooldown_secs = self.config.quota.cooldown.as_secs(),
                "Request quota nearly exhausted, pausing"
            );
            self.sleeper.sleep(self.config.quota.cooldown).await?;
            debug!("Quota cool-down finished");
        }

        Ok(RawPage {
            body,
            rate_limit_remaining: remaining,
        })
    }
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Append the cursor parameter, only when a cursor is present
pub fn with_cursor(url: &Url, param: &str, cursor: Option<Cursor>) -> Url {
    let mut url = url.clone();
    if let Some(cursor) = cursor {
        url.query_pairs_mut()
            .append_pair(param, &cursor.to_string());
    }
    url
}

/// Render a URL for logs with the API key masked
pub fn redact_url(url: &Url) -> String {
    if !url.query_pairs().any(|(k, _)| k == API_KEY_PARAM) {
        return url.to_string();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == API_KEY_PARAM {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();

    let mut redacted = url.clone();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
