//! Poll scheduler
//!
//! Runs one sweep per enabled endpoint, sleeps for the polling interval and
//! repeats until shutdown. Endpoints are independent: a failed sweep is
//! logged and reported, the others still run, and the failed endpoint is
//! retried from its unchanged checkpoint next round.

use crate::engine::{PaginationDriver, SweepReport};
use crate::error::{Error, Result};
use crate::shutdown::ShutdownCoordinator;
use crate::sleep::Sleeper;
use crate::types::Endpoint;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, info_span, warn, Instrument};
use url::Url;

/// Default pause between polling rounds
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// An endpoint and the URL its sweeps start from
#[derive(Debug, Clone)]
pub struct EndpointTarget {
    pub endpoint: Endpoint,
    pub url: Url,
}

impl EndpointTarget {
    pub fn new(endpoint: Endpoint, url: Url) -> Self {
        Self { endpoint, url }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Pause between rounds
    pub interval: Duration,
    /// Sweep endpoints concurrently instead of one after another
    pub concurrent: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            concurrent: false,
        }
    }
}

/// Result of one polling round
#[derive(Debug, Clone, Serialize)]
pub struct RoundSummary {
    /// Round number, starting at 1
    pub round: u64,
    /// One report per endpoint, ordered by endpoint
    pub reports: Vec<SweepReport>,
}

impl RoundSummary {
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_done()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_failed()).count()
    }

    /// Report for a single endpoint
    pub fn report(&self, endpoint: Endpoint) -> Option<&SweepReport> {
        self.reports.iter().find(|r| r.endpoint == endpoint)
    }
}

/// Drives polling rounds over a fixed set of endpoints
pub struct PollScheduler {
    driver: PaginationDriver,
    targets: Vec<EndpointTarget>,
    sleeper: Arc<dyn Sleeper>,
    shutdown: ShutdownCoordinator,
    config: SchedulerConfig,
    round: AtomicU64,
}

impl PollScheduler {
    /// Create a scheduler
    ///
    /// The driver is given the same shutdown coordinator, so a shutdown
    /// request also stops sweeps between pages.
    pub fn new(
        driver: PaginationDriver,
        targets: Vec<EndpointTarget>,
        sleeper: Arc<dyn Sleeper>,
        shutdown: ShutdownCoordinator,
    ) -> Self {
        Self {
            driver: driver.with_shutdown(shutdown.clone()),
            targets,
            sleeper,
            shutdown,
            config: SchedulerConfig::default(),
            round: AtomicU64::new(0),
        }
    }

    /// Set scheduler configuration
    #[must_use]
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn targets(&self) -> &[EndpointTarget] {
        &self.targets
    }

    /// Run a single round: one sweep per target
    ///
    /// Per-endpoint failures are part of the summary. `Err` means the
    /// process must stop (shutdown or a fatal error).
    pub async fn run_once(&self) -> Result<RoundSummary> {
        let round = self.round.fetch_add(1, Ordering::SeqCst) + 1;
        let span = info_span!("round", round);

        async move {
            info!(endpoints = self.targets.len(), "Starting polling round");

            let mut reports = if self.config.concurrent {
                self.sweep_concurrently().await?
            } else {
                self.sweep_sequentially().await?
            };
            reports.sort_by_key(|r| r.endpoint);

            let summary = RoundSummary { round, reports };
            info!(
                succeeded = summary.succeeded(),
                failed = summary.failed(),
                "Polling round finished"
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    async fn sweep_sequentially(&self) -> Result<Vec<SweepReport>> {
        let mut reports = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            reports.push(self.driver.run_sweep(target.endpoint, &target.url).await?);
        }
        Ok(reports)
    }

    async fn sweep_concurrently(&self) -> Result<Vec<SweepReport>> {
        let (tx, mut rx) = mpsc::channel(self.targets.len().max(1));
        let mut handles = Vec::with_capacity(self.targets.len());

        for target in self.targets.clone() {
            let driver = self.driver.clone();
            let tx = tx.clone();
            let span = tracing::Span::current();
            handles.push(tokio::spawn(
                async move {
                    let result = driver.run_sweep(target.endpoint, &target.url).await;
                    // Receiver outlives every sender
                    let _ = tx.send(result).await;
                }
                .instrument(span),
            ));
        }
        drop(tx);

        let mut reports = Vec::with_capacity(self.targets.len());
        let mut first_error = None;
        while let Some(result) = rx.recv().await {
            match result {
                Ok(report) => reports.push(report),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                first_error.get_or_insert(Error::Internal(format!("sweep task panicked: {e}")));
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(reports),
        }
    }

    /// Run rounds until shutdown
    ///
    /// Returns `Ok` on shutdown and `Err` on a fatal error. Any other error
    /// that aborts a round is logged and the next round runs as scheduled.
    pub async fn run(&self) -> Result<()> {
        info!(
            interval_secs = self.config.interval.as_secs(),
            concurrent = self.config.concurrent,
            "Scheduler started"
        );

        loop {
            if self.shutdown.is_shutdown_requested() {
                break;
            }

            match self.run_once().await {
                Ok(summary) if summary.failed() > 0 => {
                    warn!(failed = summary.failed(), "Some endpoints failed this round");
                }
                Ok(_) => {}
                Err(Error::Cancelled) => break,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => error!(error = %e, "Polling round aborted, retrying next round"),
            }

            match self.sleeper.sleep(self.config.interval).await {
                Ok(()) => {}
                Err(Error::Cancelled) => break,
                Err(e) => return Err(e),
            }
        }

        info!("Scheduler stopped");
        Ok(())
    }
}

impl std::fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("targets", &self.targets)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
