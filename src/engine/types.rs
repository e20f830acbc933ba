//! Engine types
//!
//! Sweep states, driver configuration and sweep reports.

use crate::error::Error;
use crate::http::RawPage;
use crate::types::{BackoffType, Cursor, Endpoint};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// State of one endpoint's sweep
///
/// `Done` and `Failed` are terminal.
#[derive(Debug)]
pub enum SweepState {
    /// Load the checkpoint
    Start,
    /// Request the page following `cursor`
    Fetching {
        /// Cursor to resume after (`None` on a fresh stream)
        cursor: Option<Cursor>,
        /// Consecutive failed attempts for this page so far
        attempt: u32,
    },
    /// Parse a fetched page, emit its records and pick the next state
    Advancing {
        /// Cursor the page was fetched with
        cursor: Option<Cursor>,
        /// The fetched page
        page: RawPage,
    },
    /// Sweep reached the terminal page
    Done {
        /// Cursor written to the checkpoint store, if any
        persisted: Option<Cursor>,
    },
    /// Sweep aborted for this endpoint
    Failed {
        /// Why
        error: Error,
    },
}

impl SweepState {
    /// Check if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Failed { .. })
    }

    /// Short state name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Fetching { .. } => "fetching",
            Self::Advancing { .. } => "advancing",
            Self::Done { .. } => "done",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Configuration for the pagination driver
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Fetch attempts per page before the sweep fails
    pub max_attempts: u32,
    /// Backoff between attempts
    pub backoff_type: BackoffType,
    /// Initial backoff delay
    pub initial_backoff: Duration,
    /// Maximum backoff delay
    pub max_backoff: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff_type: BackoffType::Exponential,
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(300),
        }
    }
}

impl DriverConfig {
    /// Create a new driver config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry budget
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the backoff strategy
    #[must_use]
    pub fn with_backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.backoff_type = backoff_type;
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Delay before the retry that follows failed attempt number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_type
            .delay(attempt, self.initial_backoff, self.max_backoff)
    }
}

/// Counters for one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    /// Pages successfully parsed
    pub pages: usize,
    /// Records emitted to the sink
    pub records: usize,
    /// Failed fetch attempts
    pub failed_attempts: usize,
}

/// How a sweep ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SweepOutcome {
    /// Reached the terminal page
    Done {
        /// Cursor written to the checkpoint store, if any
        persisted: Option<Cursor>,
    },
    /// Aborted; the checkpoint is unchanged
    Failed {
        /// Error description
        reason: String,
    },
}

impl SweepOutcome {
    /// Check if the sweep completed
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    /// Check if the sweep failed
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Summary of one endpoint sweep
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    /// Endpoint swept
    pub endpoint: Endpoint,
    /// Checkpoint the sweep started from
    pub start_cursor: Option<Cursor>,
    /// How it ended
    pub outcome: SweepOutcome,
    /// Counters
    pub stats: SweepStats,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}
