//! Tests for the poll scheduler

use super::*;
use crate::output::MemorySink;
use crate::sleep::RecordingSleeper;
use crate::state::{CheckpointStore, MemoryCheckpointStore};
use crate::testing::{page, transient, url_for, BrokenSink, ScriptedFetcher};
use crate::types::Endpoint::{ScheduleA, ScheduleB};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Mutex;
use test_case::test_case;

/// Requests shutdown once it has been asked to sleep `after` times
struct ShutdownAfter {
    after: usize,
    shutdown: ShutdownCoordinator,
    slept: Mutex<Vec<Duration>>,
}

impl ShutdownAfter {
    fn new(after: usize, shutdown: ShutdownCoordinator) -> Self {
        Self {
            after,
            shutdown,
            slept: Mutex::default(),
        }
    }
}

#[async_trait]
impl Sleeper for ShutdownAfter {
    async fn sleep(&self, duration: Duration) -> Result<()> {
        let count = {
            let mut slept = self.slept.lock().unwrap();
            slept.push(duration);
            slept.len()
        };
        if count >= self.after {
            self.shutdown.request_shutdown();
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

fn targets() -> Vec<EndpointTarget> {
    Endpoint::ALL
        .iter()
        .map(|&e| EndpointTarget::new(e, url_for(e)))
        .collect()
}

fn scheduler(
    fetcher: Arc<ScriptedFetcher>,
    store: Arc<MemoryCheckpointStore>,
    config: SchedulerConfig,
) -> PollScheduler {
    let driver = PaginationDriver::new(
        fetcher,
        store,
        Arc::new(MemorySink::new()),
        Arc::new(RecordingSleeper::new()),
    );
    PollScheduler::new(
        driver,
        targets(),
        Arc::new(RecordingSleeper::new()),
        ShutdownCoordinator::new(),
    )
    .with_config(config)
}

#[test]
fn test_scheduler_config_default() {
    let config = SchedulerConfig::default();
    assert_eq!(config.interval, Duration::from_secs(86_400));
    assert!(!config.concurrent);
}

#[test_case(false ; "sequential")]
#[test_case(true ; "concurrent")]
fn test_failed_endpoint_does_not_block_others(concurrent: bool) {
    tokio_test::block_on(async {
        let fetcher = Arc::new(ScriptedFetcher::new());
        for _ in 0..4 {
            fetcher.push(ScheduleA, Err(transient()));
        }
        fetcher.push(ScheduleB, Ok(page(json!([{"sched_b_sk": 12}]), Some(12.0))));
        let store = Arc::new(MemoryCheckpointStore::new());

        let scheduler = scheduler(
            fetcher.clone(),
            store.clone(),
            SchedulerConfig {
                concurrent,
                ..SchedulerConfig::default()
            },
        );
        let summary = scheduler.run_once().await.unwrap();

        assert_eq!(summary.round, 1);
        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.failed(), 1);
        assert_eq!(
            summary.reports.iter().map(|r| r.endpoint).collect::<Vec<_>>(),
            vec![ScheduleA, ScheduleB]
        );
        assert!(summary.report(ScheduleA).unwrap().outcome.is_failed());
        assert_eq!(store.load(ScheduleA).await.unwrap(), None);
        assert_eq!(store.load(ScheduleB).await.unwrap(), Some(12));
    });
}

#[tokio::test]
async fn test_failed_endpoint_retried_next_round_from_checkpoint() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    for _ in 0..4 {
        fetcher.push(ScheduleA, Err(transient()));
    }
    let store = Arc::new(MemoryCheckpointStore::with_cursors([(ScheduleA, 40)]));
    let scheduler = scheduler(fetcher.clone(), store, SchedulerConfig::default());

    let first = scheduler.run_once().await.unwrap();
    let second = scheduler.run_once().await.unwrap();

    assert_eq!(first.failed(), 1);
    assert_eq!(second.round, 2);
    assert_eq!(second.failed(), 0);
    assert_eq!(fetcher.cursors(ScheduleA), vec![Some(40); 5]);
}

#[tokio::test]
async fn test_run_sleeps_interval_between_rounds_until_shutdown() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let shutdown = ShutdownCoordinator::new();
    let sleeper = Arc::new(ShutdownAfter::new(3, shutdown.clone()));
    let driver = PaginationDriver::new(
        fetcher.clone(),
        Arc::new(MemoryCheckpointStore::new()),
        Arc::new(MemorySink::new()),
        Arc::new(RecordingSleeper::new()),
    );
    let scheduler = PollScheduler::new(driver, targets(), sleeper.clone(), shutdown)
        .with_config(SchedulerConfig {
            interval: Duration::from_secs(3600),
            concurrent: false,
        });

    scheduler.run().await.unwrap();

    assert_eq!(
        *sleeper.slept.lock().unwrap(),
        vec![Duration::from_secs(3600); 3]
    );
    // Three rounds, one terminal fetch per endpoint each
    assert_eq!(fetcher.cursors(ScheduleA).len(), 3);
    assert_eq!(fetcher.cursors(ScheduleB).len(), 3);
}

#[tokio::test]
async fn test_run_returns_immediately_when_already_shut_down() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let shutdown = ShutdownCoordinator::new();
    shutdown.request_shutdown();
    let driver = PaginationDriver::new(
        fetcher.clone(),
        Arc::new(MemoryCheckpointStore::new()),
        Arc::new(MemorySink::new()),
        Arc::new(RecordingSleeper::new()),
    );
    let scheduler = PollScheduler::new(
        driver,
        targets(),
        Arc::new(RecordingSleeper::new()),
        shutdown,
    );

    scheduler.run().await.unwrap();

    assert!(fetcher.cursors(ScheduleA).is_empty());
}

#[tokio::test]
async fn test_fatal_sink_error_stops_scheduler() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.push(ScheduleA, Ok(page(json!([{"sched_a_sk": 1}]), Some(1.0))));
    let driver = PaginationDriver::new(
        fetcher.clone(),
        Arc::new(MemoryCheckpointStore::new()),
        Arc::new(BrokenSink),
        Arc::new(RecordingSleeper::new()),
    );
    let sleeper = Arc::new(RecordingSleeper::new());
    let scheduler = PollScheduler::new(
        driver,
        targets(),
        sleeper.clone(),
        ShutdownCoordinator::new(),
    );

    let result = scheduler.run().await;

    assert!(matches!(result, Err(Error::Sink { .. })));
    assert_eq!(sleeper.count(), 0);
    // Sequential round stops at the fatal endpoint
    assert!(fetcher.cursors(ScheduleB).is_empty());
}

#[tokio::test]
async fn test_non_fatal_round_error_keeps_polling() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher
        .push(ScheduleA, Err(Error::malformed("unexpected upstream reply")))
        .push(ScheduleA, Err(Error::malformed("unexpected upstream reply")));
    let shutdown = ShutdownCoordinator::new();
    let sleeper = Arc::new(ShutdownAfter::new(2, shutdown.clone()));
    let driver = PaginationDriver::new(
        fetcher.clone(),
        Arc::new(MemoryCheckpointStore::new()),
        Arc::new(MemorySink::new()),
        Arc::new(RecordingSleeper::new()),
    );
    let scheduler = PollScheduler::new(driver, targets(), sleeper.clone(), shutdown);

    scheduler.run().await.unwrap();

    assert_eq!(sleeper.slept.lock().unwrap().len(), 2);
    assert_eq!(fetcher.cursors(ScheduleA), vec![None, None]);
}
