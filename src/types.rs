//! Common types used throughout the ingester
//!
//! This module contains the endpoint catalogue, the cursor and record
//! aliases, and small utility types used across multiple modules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// Ordering token within one endpoint's result stream (the API's "last index")
pub type Cursor = u64;

/// An opaque record, forwarded verbatim to the sink
pub type Record = JsonValue;

// ============================================================================
// Endpoints
// ============================================================================

/// A tracked API endpoint
///
/// The set is fixed at compile time. Each endpoint carries the primary-key
/// field used to order its records and to resume pagination.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum Endpoint {
    /// Itemized receipts (`/schedules/schedule_a/`)
    ScheduleA,
    /// Itemized disbursements (`/schedules/schedule_b/`)
    ScheduleB,
}

impl Endpoint {
    /// All known endpoints, in polling order
    pub const ALL: [Endpoint; 2] = [Endpoint::ScheduleA, Endpoint::ScheduleB];

    /// Stable identifier, also used as the checkpoint key
    pub fn id(self) -> &'static str {
        match self {
            Endpoint::ScheduleA => "schedule_a",
            Endpoint::ScheduleB => "schedule_b",
        }
    }

    /// Primary-key field of this endpoint's records
    pub fn pk_field(self) -> &'static str {
        match self {
            Endpoint::ScheduleA => "sched_a_sk",
            Endpoint::ScheduleB => "sched_b_sk",
        }
    }

    /// Path segment under the API base URL
    pub fn path(self) -> String {
        format!("{}/", self.id())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Endpoint {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::ALL
            .into_iter()
            .find(|e| e.id() == s)
            .ok_or_else(|| crate::Error::invalid_value("endpoint", format!("unknown endpoint '{s}'")))
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff between retries of the same page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

impl BackoffType {
    /// Delay before retry number `attempt` (0-based), capped at `max`
    pub fn delay(self, attempt: u32, initial: Duration, max: Duration) -> Duration {
        let delay = match self {
            BackoffType::Constant => initial,
            BackoffType::Linear => initial.saturating_mul(attempt + 1),
            BackoffType::Exponential => initial.saturating_mul(2u32.saturating_pow(attempt)),
        };

        std::cmp::min(delay, max)
    }
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.trim().is_empty())
    }
}

/// Interpret a JSON value as a cursor
///
/// Accepts non-negative integers, integral floats (the API reports
/// `last_index` as e.g. `138873463.0`) and decimal strings.
pub fn cursor_from_value(value: &JsonValue) -> Option<Cursor> {
    match value {
        JsonValue::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(cursor_from_f64)),
        JsonValue::String(s) => parse_cursor_str(s),
        _ => None,
    }
}

/// Parse a cursor from its textual form (`"9"` or `"9.0"`)
pub fn parse_cursor_str(s: &str) -> Option<Cursor> {
    let s = s.trim();
    s.parse::<u64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().and_then(cursor_from_f64))
}

fn cursor_from_f64(f: f64) -> Option<Cursor> {
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}
