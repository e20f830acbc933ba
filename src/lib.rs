// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # FEC Schedules Ingester
//!
//! A resumable, rate-limited pagination engine for the FEC `/schedules`
//! API. Each enabled endpoint is swept from its last checkpoint to the end
//! of its result stream; records are forwarded to a sink one at a time and
//! the checkpoint advances only after a sweep reaches the terminal page.
//!
//! ## Features
//!
//! - **Keyset Pagination**: Follows `last_index` cursors, tie-broken by the last record's key
//! - **Resumable**: Crash-safe per-endpoint checkpoints, at-least-once delivery
//! - **Rate Limited**: Cool-down on `X-RateLimit-Remaining`, optional client pacing
//! - **Bounded Retries**: Per-page retry budget with backoff
//! - **Polling**: Interval scheduler with per-endpoint failure isolation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fec_schedules::{IngestConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = IngestConfig::from_file("ingest.yaml")?.resolve_env();
//!     config.validate()?;
//!
//!     for target in config.targets()? {
//!         println!("{} -> {}", target.endpoint, target.url);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Poll Scheduler                           │
//! │     round: sweep every endpoint → sleep interval → repeat       │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Pagination Driver                          │
//! │   Start → Fetching ⇄ Advancing → Done | Failed                  │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────────┬───────────────┴──┬──────────────┬───────────────┐
//! │  Checkpoint  │     Fetcher      │    Parser    │     Sink      │
//! ├──────────────┼──────────────────┼──────────────┼───────────────┤
//! │ File (atomic)│ reqwest          │ results      │ JSON lines    │
//! │ Memory       │ quota cool-down  │ last_indexes │ XML stream    │
//! │              │ governor pacing  │ pk tie-break │ Memory        │
//! └──────────────┴──────────────────┴──────────────┴───────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(missing_docs)] // TODO: Document public fields of the scheduler and CLI types

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the ingester
pub mod error;

/// Common types and type aliases
pub mod types;

/// Graceful shutdown
pub mod shutdown;

/// Injectable sleeping
pub mod sleep;

/// Checkpoint storage
pub mod state;

/// HTTP fetcher with quota cool-down and pacing
pub mod http;

/// Page parsing
pub mod pagination;

/// Record sinks
pub mod output;

/// Pagination driver state machine
pub mod engine;

/// Polling scheduler
pub mod scheduler;

/// Configuration
pub mod config;

/// Command-line interface
pub mod cli;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::IngestConfig;
pub use engine::{DriverConfig, PaginationDriver, SweepOutcome, SweepReport, SweepState};
pub use error::{Error, Result};
pub use http::{Fetcher, FetcherConfig, HttpFetcher, RawPage};
pub use output::{OutputFormat, RecordSink};
pub use scheduler::{EndpointTarget, PollScheduler, RoundSummary, SchedulerConfig};
pub use shutdown::ShutdownCoordinator;
pub use sleep::{Sleeper, TokioSleeper};
pub use state::{CheckpointStore, FileCheckpointStore};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
