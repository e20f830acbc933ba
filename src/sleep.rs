//! Injectable sleeping
//!
//! Every pause in the ingester (retry backoff, rate-limit cool-down,
//! inter-sweep interval) goes through a [`Sleeper`], so tests can observe
//! the requested durations without real time passing.

use crate::error::{Error, Result};
use crate::shutdown::ShutdownCoordinator;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Something that can pause the current task
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Sleep for `duration`
    ///
    /// Returns `Error::Cancelled` if shutdown interrupts the sleep.
    async fn sleep(&self, duration: Duration) -> Result<()>;
}

/// Real sleeper backed by the tokio timer, interruptible by shutdown
#[derive(Debug, Clone, Default)]
pub struct TokioSleeper {
    shutdown: ShutdownCoordinator,
}

impl TokioSleeper {
    /// Create a sleeper bound to a shutdown coordinator
    pub fn new(shutdown: ShutdownCoordinator) -> Self {
        Self { shutdown }
    }
}

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) -> Result<()> {
        if duration.is_zero() {
            return if self.shutdown.is_shutdown_requested() {
                Err(Error::Cancelled)
            } else {
                Ok(())
            };
        }

        tokio::select! {
            () = tokio::time::sleep(duration) => Ok(()),
            () = self.shutdown.wait_for_shutdown() => Err(Error::Cancelled),
        }
    }
}

/// Sleeper that returns immediately and records what it was asked to do
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Create a new recording sleeper
    pub fn new() -> Self {
        Self::default()
    }

    /// Durations requested so far, in order
    pub fn durations(&self) -> Vec<Duration> {
        self.slept.lock().map(|d| d.clone()).unwrap_or_default()
    }

    /// Number of sleeps requested
    pub fn count(&self) -> usize {
        self.durations().len()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) -> Result<()> {
        self.slept
            .lock()
            .map_err(|_| Error::Internal("sleeper lock poisoned".to_string()))?
            .push(duration);
        Ok(())
    }
}
