//! Pagination driver
//!
//! Runs one endpoint's sweep as an explicit state machine:
//!
//! ```text
//! Start ──load──▶ Fetching ──ok──▶ Advancing ──next cursor──▶ Fetching
//!                   │  ▲                │
//!          transient│  │retry           └──terminal──▶ save ──▶ Done
//!                   ▼  │
//!              (budget left?) ──no──▶ Failed
//! ```
//!
//! The checkpoint is written once, on the terminal page. A sweep that dies
//! midway leaves the previous checkpoint in place, so the next sweep
//! re-emits the pages already delivered rather than skipping any.

mod types;

pub use types::{DriverConfig, SweepOutcome, SweepReport, SweepState, SweepStats};

use crate::error::{Error, Result};
use crate::http::{redact_url, Fetcher};
use crate::output::RecordSink;
use crate::pagination::PageParser;
use crate::shutdown::ShutdownCoordinator;
use crate::sleep::Sleeper;
use crate::state::CheckpointStore;
use crate::types::{Cursor, Endpoint};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use url::Url;

/// Per-sweep working state held by the driver
#[derive(Debug, Clone)]
pub struct Sweep {
    /// Endpoint being swept
    pub endpoint: Endpoint,
    /// Endpoint URL without cursor
    pub url: Url,
    /// Checkpoint loaded at the start of the sweep
    pub start_cursor: Option<Cursor>,
    /// Primary key of the last record emitted during this sweep
    pub last_seen: Option<Cursor>,
    /// Counters
    pub stats: SweepStats,
    parser: PageParser,
}

impl Sweep {
    /// Create the working state for a new sweep
    pub fn new(endpoint: Endpoint, url: Url) -> Self {
        Self {
            endpoint,
            url,
            start_cursor: None,
            last_seen: None,
            stats: SweepStats::default(),
            parser: PageParser::for_endpoint(endpoint),
        }
    }
}

/// Drives sweeps of a single endpoint at a time
#[derive(Clone)]
pub struct PaginationDriver {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn CheckpointStore>,
    sink: Arc<dyn RecordSink>,
    sleeper: Arc<dyn Sleeper>,
    shutdown: Option<ShutdownCoordinator>,
    config: DriverConfig,
}

impl PaginationDriver {
    /// Create a new driver
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn CheckpointStore>,
        sink: Arc<dyn RecordSink>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            fetcher,
            store,
            sink,
            sleeper,
            shutdown: None,
            config: DriverConfig::default(),
        }
    }

    /// Set driver configuration
    #[must_use]
    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    /// Abort sweeps between pages once shutdown is requested
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: ShutdownCoordinator) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Get the driver configuration
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Get the checkpoint store
    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// Run one sweep of `endpoint` to `Done` or `Failed`
    ///
    /// Returns `Err` only for conditions that must stop the process
    /// (shutdown, sink failure); every per-endpoint failure is reported in
    /// the returned [`SweepReport`].
    pub async fn run_sweep(&self, endpoint: Endpoint, url: &Url) -> Result<SweepReport> {
        let span = info_span!("sweep", endpoint = %endpoint);

        async move {
            let started_at = Utc::now();
            let timer = Instant::now();
            let mut sweep = Sweep::new(endpoint, url.clone());
            let mut state = SweepState::Start;

            while !state.is_terminal() {
                state = self.step(&mut sweep, state).await?;
            }

            let outcome = match state {
                SweepState::Done { persisted } => {
                    info!(
                        pages = sweep.stats.pages,
                        records = sweep.stats.records,
                        checkpoint = ?persisted,
                        "Sweep complete"
                    );
                    SweepOutcome::Done { persisted }
                }
                SweepState::Failed { error } => {
                    error!(
                        pages = sweep.stats.pages,
                        records = sweep.stats.records,
                        error = %error,
                        "Sweep failed, checkpoint left unchanged"
                    );
                    SweepOutcome::Failed {
                        reason: error.to_string(),
                    }
                }
                other => {
                    return Err(Error::Internal(format!(
                        "sweep stopped in non-terminal state '{}'",
                        other.name()
                    )))
                }
            };

            Ok(SweepReport {
                endpoint,
                start_cursor: sweep.start_cursor,
                outcome,
                stats: sweep.stats,
                started_at,
                duration_ms: timer.elapsed().as_millis() as u64,
            })
        }
        .instrument(span)
        .await
    }

    /// Perform a single transition
    pub async fn step(&self, sweep: &mut Sweep, state: SweepState) -> Result<SweepState> {
        match state {
            SweepState::Start => Ok(self.start(sweep).await),
            SweepState::Fetching { cursor, attempt } => self.fetch(sweep, cursor, attempt).await,
            SweepState::Advancing { cursor, page } => self.advance(sweep, cursor, page.body).await,
            terminal @ (SweepState::Done { .. } | SweepState::Failed { .. }) => Ok(terminal),
        }
    }

    async fn start(&self, sweep: &mut Sweep) -> SweepState {
        match self.store.load(sweep.endpoint).await {
            Ok(cursor) => {
                info!(cursor = ?cursor, "Starting sweep");
                sweep.start_cursor = cursor;
                SweepState::Fetching { cursor, attempt: 0 }
            }
            Err(error) => SweepState::Failed { error },
        }
    }

    async fn fetch(
        &self,
        sweep: &mut Sweep,
        cursor: Option<Cursor>,
        attempt: u32,
    ) -> Result<SweepState> {
        if self
            .shutdown
            .as_ref()
            .is_some_and(ShutdownCoordinator::is_shutdown_requested)
        {
            return Err(Error::Cancelled);
        }

        match self.fetcher.fetch(&sweep.url, cursor).await {
            Ok(page) => Ok(SweepState::Advancing { cursor, page }),
            Err(e) if e.is_retryable() => {
                sweep.stats.failed_attempts += 1;
                let failures = attempt + 1;

                if failures >= self.config.max_attempts {
                    warn!(attempt = failures, error = %e, "Fetch failed, retry budget exhausted");
                    return Ok(SweepState::Failed {
                        error: Error::RetriesExhausted {
                            url: redact_url(&sweep.url),
                            max_attempts: self.config.max_attempts,
                        },
                    });
                }

                let delay = self.config.backoff(attempt);
                warn!(
                    attempt = failures,
                    max_attempts = self.config.max_attempts,
                    retry_in = ?delay,
                    error = %e,
                    "Fetch failed, retrying"
                );
                self.sleeper.sleep(delay).await?;

                Ok(SweepState::Fetching {
                    cursor,
                    attempt: failures,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn advance(
        &self,
        sweep: &mut Sweep,
        cursor: Option<Cursor>,
        body: serde_json::Value,
    ) -> Result<SweepState> {
        let page = match sweep.parser.parse(body) {
            Ok(page) => page,
            Err(error) => return Ok(SweepState::Failed { error }),
        };

        if let (Some(current), Some(next)) = (cursor, page.next_cursor) {
            if next <= current {
                return Ok(SweepState::Failed {
                    error: Error::malformed(format!(
                        "pagination did not advance: next cursor {next} after {current}"
                    )),
                });
            }
        }

        for record in &page.records {
            self.sink.emit(sweep.endpoint, record).await?;
        }

        sweep.stats.pages += 1;
        sweep.stats.records += page.len();
        if let Some(key) = page.last_record_key {
            sweep.last_seen = Some(key);
        }

        debug!(
            page = sweep.stats.pages,
            records = page.len(),
            next_cursor = ?page.next_cursor,
            "Page processed"
        );

        if let Some(next) = page.next_cursor {
            return Ok(SweepState::Fetching {
                cursor: Some(next),
                attempt: 0,
            });
        }

        let Some(high_water) = sweep.last_seen else {
            debug!("No new records this sweep, checkpoint unchanged");
            return Ok(SweepState::Done { persisted: None });
        };

        // Everything up to the high-water mark must reach the consumer first
        self.sink.flush().await?;

        match self.store.save(sweep.endpoint, high_water).await {
            Ok(()) => Ok(SweepState::Done {
                persisted: Some(high_water),
            }),
            Err(error) => Ok(SweepState::Failed { error }),
        }
    }
}

impl std::fmt::Debug for PaginationDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginationDriver")
            .field("config", &self.config)
            .field("has_shutdown", &self.shutdown.is_some())
            .finish_non_exhaustive()
    }
}
