//! Ingester configuration
//!
//! This module contains the configuration loaded from a YAML or JSON file
//! (or inline JSON on the command line), and the conversions into the
//! component configs used by the fetcher, the driver and the scheduler.
//!
//! Enable flags accept booleans as well as the `"1"`/`"0"` strings used by
//! input hosts, under either their short names or the host argument names
//! `get_schedules_schedule_a` / `get_schedules_schedule_b`.

use crate::engine::DriverConfig;
use crate::error::{Error, Result};
use crate::http::{FetcherConfig, QuotaPolicy, RateLimiterConfig, API_KEY_PARAM};
use crate::output::OutputFormat;
use crate::scheduler::{EndpointTarget, SchedulerConfig, DEFAULT_POLL_INTERVAL};
use crate::types::{BackoffType, Endpoint, OptionStringExt};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default API base URL; endpoint paths are joined onto it
pub const DEFAULT_BASE_URL: &str = "https://api.open.fec.gov/v1/schedules/";

/// Environment variable consulted when no API key is configured
pub const API_KEY_ENV: &str = "FEC_API_KEY";

/// Largest page size the API serves
pub const MAX_PER_PAGE: u32 = 100;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete ingester configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// API key sent as the `api_key` query parameter
    #[serde(default, alias = "fec_key")]
    pub api_key: Option<String>,

    /// Poll itemized receipts
    #[serde(
        default,
        alias = "get_schedules_schedule_a",
        deserialize_with = "deserialize_flag"
    )]
    pub schedule_a: bool,

    /// Poll itemized disbursements
    #[serde(
        default,
        alias = "get_schedules_schedule_b",
        deserialize_with = "deserialize_flag"
    )]
    pub schedule_b: bool,

    /// Whole hours between polling rounds; missing, invalid or below 1 means 24
    #[serde(default, deserialize_with = "deserialize_hours")]
    pub polling_interval: Option<u64>,

    /// Directory holding one checkpoint file per endpoint
    #[serde(default)]
    pub checkpoint_dir: Option<PathBuf>,

    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Records per page
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// HTTP settings
    #[serde(default)]
    pub http: HttpSettings,

    /// Retry settings
    #[serde(default)]
    pub retry: RetrySettings,

    /// Sweep endpoints concurrently
    #[serde(default)]
    pub concurrent: bool,

    /// Record output format
    #[serde(default)]
    pub output: OutputFormat,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_per_page() -> u32 {
    MAX_PER_PAGE
}

// ============================================================================
// HTTP Settings
// ============================================================================

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Client-side pacing; 0 disables it
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Remaining-quota value that triggers the cool-down
    #[serde(default = "default_quota_threshold")]
    pub quota_threshold: u64,

    /// Cool-down in seconds once the quota threshold is reached
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    /// Custom user agent
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            requests_per_second: default_requests_per_second(),
            quota_threshold: default_quota_threshold(),
            cooldown_secs: default_cooldown(),
            user_agent: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_requests_per_second() -> u32 {
    1
}

fn default_quota_threshold() -> u64 {
    1
}

fn default_cooldown() -> u64 {
    61 * 60
}

// ============================================================================
// Retry Settings
// ============================================================================

/// Per-page retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Fetch attempts per page, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff type
    #[serde(default)]
    pub backoff: BackoffType,

    /// Initial backoff in seconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_secs: u64,

    /// Maximum backoff in seconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: BackoffType::default(),
            initial_backoff_secs: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

fn default_max_attempts() -> u32 {
    4
}

fn default_initial_backoff() -> u64 {
    5
}

fn default_max_backoff() -> u64 {
    300
}

// ============================================================================
// Lenient Deserializers
// ============================================================================

fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    let value = serde_json::Value::deserialize(deserializer)?;
    match &value {
        serde_json::Value::Null => Ok(false),
        serde_json::Value::Bool(b) => Ok(*b),
        serde_json::Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            other => Err(D::Error::custom(format!("invalid flag value '{other}'"))),
        },
        other => Err(D::Error::custom(format!("invalid flag value {other}"))),
    }
}

fn deserialize_hours<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

// ============================================================================
// Loading
// ============================================================================

impl IngestConfig {
    /// Load configuration from a YAML or JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML (JSON is accepted too)
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Parse configuration from inline JSON
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::config(format!("Invalid config JSON: {e}")))
    }

    /// Fill the API key from `FEC_API_KEY` when it is not configured
    #[must_use]
    pub fn resolve_env(self) -> Self {
        self.with_env_fallback(|name| std::env::var(name).ok())
    }

    /// Fill the API key through `lookup` when it is not configured
    #[must_use]
    pub fn with_env_fallback(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        self.api_key = self.api_key.none_if_empty().or_else(|| lookup(API_KEY_ENV));
        self
    }

    /// Check the configuration before anything runs
    pub fn validate(&self) -> Result<()> {
        if self.api_key.clone().none_if_empty().is_none() {
            return Err(Error::missing_field("api_key"));
        }

        if self.checkpoint_dir.is_none() {
            return Err(Error::missing_field("checkpoint_dir"));
        }

        if self.enabled_endpoints().is_empty() {
            return Err(Error::config(
                "No endpoints enabled (set schedule_a and/or schedule_b)",
            ));
        }

        if !(1..=MAX_PER_PAGE).contains(&self.per_page) {
            return Err(Error::invalid_value(
                "per_page",
                format!("must be between 1 and {MAX_PER_PAGE}, got {}", self.per_page),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(Error::invalid_value("retry.max_attempts", "must be at least 1"));
        }

        if self.http.timeout_secs == 0 {
            return Err(Error::invalid_value("http.timeout_secs", "must be positive"));
        }

        let base = self.base()?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(Error::invalid_value(
                "base_url",
                format!("'{}' is not an http(s) base URL", self.base_url),
            ));
        }

        Ok(())
    }

    // ========================================================================
    // Derived Values
    // ========================================================================

    /// Enabled endpoints, in polling order
    pub fn enabled_endpoints(&self) -> Vec<Endpoint> {
        Endpoint::ALL
            .into_iter()
            .filter(|e| match e {
                Endpoint::ScheduleA => self.schedule_a,
                Endpoint::ScheduleB => self.schedule_b,
            })
            .collect()
    }

    /// Pause between polling rounds
    pub fn polling_interval(&self) -> Duration {
        self.polling_interval
            .filter(|&hours| hours >= 1)
            .and_then(|hours| hours.checked_mul(3600))
            .map_or(DEFAULT_POLL_INTERVAL, Duration::from_secs)
    }

    /// Checkpoint directory, or an error if it is not configured
    pub fn checkpoint_dir(&self) -> Result<&Path> {
        self.checkpoint_dir
            .as_deref()
            .ok_or_else(|| Error::missing_field("checkpoint_dir"))
    }

    fn base(&self) -> Result<Url> {
        let mut base = self.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Url::parse(&base)?)
    }

    /// Start URL for an endpoint: base, path and the fixed query, no cursor
    pub fn endpoint_url(&self, endpoint: Endpoint) -> Result<Url> {
        let api_key = self
            .api_key
            .clone()
            .none_if_empty()
            .ok_or_else(|| Error::missing_field("api_key"))?;

        let mut url = self.base()?.join(&endpoint.path())?;
        url.query_pairs_mut()
            .append_pair("sort_hide_null", "false")
            .append_pair("per_page", &self.per_page.to_string())
            .append_pair(API_KEY_PARAM, &api_key);
        Ok(url)
    }

    /// Sweep targets for every enabled endpoint
    pub fn targets(&self) -> Result<Vec<EndpointTarget>> {
        self.enabled_endpoints()
            .into_iter()
            .map(|e| Ok(EndpointTarget::new(e, self.endpoint_url(e)?)))
            .collect()
    }

    /// Fetcher configuration
    pub fn fetcher_config(&self) -> FetcherConfig {
        let mut builder = FetcherConfig::builder()
            .timeout(Duration::from_secs(self.http.timeout_secs))
            .quota(QuotaPolicy::new(
                self.http.quota_threshold,
                Duration::from_secs(self.http.cooldown_secs),
            ));

        builder = match self.http.requests_per_second {
            0 => builder.no_rate_limit(),
            rps => builder.rate_limit(RateLimiterConfig::new(rps, 1)),
        };

        if let Some(agent) = self.http.user_agent.clone().none_if_empty() {
            builder = builder.user_agent(agent);
        }

        builder.build()
    }

    /// Driver configuration
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig::new()
            .with_max_attempts(self.retry.max_attempts)
            .with_backoff(
                self.retry.backoff,
                Duration::from_secs(self.retry.initial_backoff_secs),
                Duration::from_secs(self.retry.max_backoff_secs),
            )
    }

    /// Scheduler configuration
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: self.polling_interval(),
            concurrent: self.concurrent,
        }
    }
}
