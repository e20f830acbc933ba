//! Error types for the FEC schedules ingester
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// Process exit status for configuration errors
pub const EXIT_CONFIG: i32 = 1;

/// Process exit status for fatal runtime errors
pub const EXIT_FATAL: i32 = 2;

/// The main error type for the ingester
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Fetch Errors
    // ============================================================================
    #[error("Transient failure fetching {url}: {message}")]
    Transient { url: String, message: String },

    #[error("Retry budget of {max_attempts} attempts exhausted for {url}")]
    RetriesExhausted { url: String, max_attempts: u32 },

    // ============================================================================
    // Response Errors
    // ============================================================================
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    // ============================================================================
    // Checkpoint Errors
    // ============================================================================
    #[error("Checkpoint error for '{endpoint}': {message}")]
    Checkpoint { endpoint: String, message: String },

    #[error("Checkpoint directory {path} is not usable: {message}")]
    CheckpointDir { path: String, message: String },

    // ============================================================================
    // Sink Errors
    // ============================================================================
    #[error("Record sink error: {message}")]
    Sink { message: String },

    // ============================================================================
    // Lifecycle
    // ============================================================================
    #[error("Shutdown requested")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a transient fetch error
    pub fn transient(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a malformed response error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Create a checkpoint error
    pub fn checkpoint(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Checkpoint {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a sink error
    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink {
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Classification is deliberately coarse: every transport or HTTP level
    /// failure is retryable, nothing else is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient { .. })
    }

    /// Check if this error is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::MissingConfigField { .. }
                | Error::InvalidConfigValue { .. }
                | Error::YamlParse(_)
                | Error::InvalidUrl(_)
        )
    }

    /// Check if this error must stop the whole process rather than one sweep
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Sink { .. } | Error::CheckpointDir { .. } | Error::Internal(_) | Error::Io(_)
        ) || self.is_config()
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        if self.is_config() {
            EXIT_CONFIG
        } else {
            EXIT_FATAL
        }
    }
}

/// Result type alias for the ingester
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Internal(format!("{}: {}", message.into(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("api_key");
        assert_eq!(err.to_string(), "Missing required config field: api_key");

        let err = Error::checkpoint("schedule_a", "disk full");
        assert_eq!(
            err.to_string(),
            "Checkpoint error for 'schedule_a': disk full"
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::transient("http://x", "connection reset").is_retryable());

        assert!(!Error::malformed("missing results").is_retryable());
        assert!(!Error::checkpoint("schedule_a", "io").is_retryable());
        assert!(!Error::config("test").is_retryable());
        assert!(!Error::Cancelled.is_retryable());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::sink("stdout closed").is_fatal());
        assert!(Error::missing_field("api_key").is_fatal());
        assert!(!Error::transient("http://x", "503").is_fatal());
        assert!(!Error::malformed("bad").is_fatal());
        assert!(!Error::checkpoint("schedule_b", "denied").is_fatal());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::missing_field("api_key").exit_code(), EXIT_CONFIG);
        assert_eq!(Error::Internal("boom".into()).exit_code(), EXIT_FATAL);
        let unusable = Error::CheckpointDir {
            path: "/ro".into(),
            message: "permission denied".into(),
        };
        assert!(unusable.is_fatal());
        assert_eq!(unusable.exit_code(), EXIT_FATAL);
        assert_ne!(EXIT_CONFIG, EXIT_FATAL);
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
