//! Integration tests using mock HTTP server
//!
//! Tests the full flow: config → HTTP requests → sink → checkpoint files

use fec_schedules::engine::PaginationDriver;
use fec_schedules::output::MemorySink;
use fec_schedules::sleep::RecordingSleeper;
use fec_schedules::state::{CheckpointStore, FileCheckpointStore};
use fec_schedules::{
    Endpoint, HttpFetcher, IngestConfig, PollScheduler, ShutdownCoordinator, SweepOutcome,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helpers
// ============================================================================

fn config_for(server: &MockServer, checkpoint_dir: &Path) -> IngestConfig {
    let config = IngestConfig::from_json(
        &json!({
            "api_key": "DEMO_KEY",
            "get_schedules_schedule_a": "1",
            "get_schedules_schedule_b": "1",
            "polling_interval": 24,
            "checkpoint_dir": checkpoint_dir,
            "base_url": format!("{}/v1/schedules/", server.uri()),
            "http": { "requests_per_second": 0 },
            "retry": { "initial_backoff_secs": 1 }
        })
        .to_string(),
    )
    .unwrap();
    config.validate().unwrap();
    config
}

struct Pipeline {
    driver: PaginationDriver,
    store: Arc<FileCheckpointStore>,
    sink: Arc<MemorySink>,
    sleeper: Arc<RecordingSleeper>,
}

async fn pipeline(config: &IngestConfig) -> Pipeline {
    let store = Arc::new(
        FileCheckpointStore::open(config.checkpoint_dir().unwrap())
            .await
            .unwrap(),
    );
    let sink = Arc::new(MemorySink::new());
    let sleeper = Arc::new(RecordingSleeper::new());
    let fetcher = HttpFetcher::new(config.fetcher_config(), sleeper.clone()).unwrap();
    let driver = PaginationDriver::new(
        Arc::new(fetcher),
        store.clone(),
        sink.clone(),
        sleeper.clone(),
    )
    .with_config(config.driver_config());

    Pipeline {
        driver,
        store,
        sink,
        sleeper,
    }
}

fn results(pk: &str, keys: &[u64]) -> serde_json::Value {
    json!(keys.iter().map(|k| json!({ pk: k, "amount": 10 })).collect::<Vec<_>>())
}

fn body(results: serde_json::Value, last_index: Option<f64>) -> serde_json::Value {
    json!({
        "api_version": "1.0",
        "results": results,
        "pagination": {
            "per_page": 100,
            "last_indexes": last_index.map(|i| json!({ "last_index": i }))
        }
    })
}

// ============================================================================
// End-to-end Tests
// ============================================================================

#[tokio::test]
async fn test_sweep_checkpoints_and_restart_resumes() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, dir.path());

    Mock::given(method("GET"))
        .and(path("/v1/schedules/schedule_a/"))
        .and(query_param("api_key", "DEMO_KEY"))
        .and(query_param("sort_hide_null", "false"))
        .and(query_param("per_page", "100"))
        .and(query_param_is_missing("last_index"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(body(results("sched_a_sk", &[5, 9]), Some(9.0))),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/schedules/schedule_a/"))
        .and(query_param("last_index", "9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body(json!([]), None)))
        .expect(2)
        .mount(&server)
        .await;

    let url = config.endpoint_url(Endpoint::ScheduleA).unwrap();
    let first = pipeline(&config).await;
    let report = first.driver.run_sweep(Endpoint::ScheduleA, &url).await.unwrap();

    assert_eq!(report.outcome, SweepOutcome::Done { persisted: Some(9) });
    assert_eq!(first.sink.records_for(Endpoint::ScheduleA).await.len(), 2);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("schedule_a")).unwrap(),
        "9"
    );

    // A new process picks up where the last one stopped
    let second = pipeline(&config).await;
    let report = second.driver.run_sweep(Endpoint::ScheduleA, &url).await.unwrap();

    assert_eq!(report.start_cursor, Some(9));
    assert_eq!(report.outcome, SweepOutcome::Done { persisted: None });
    assert!(second.sink.records().await.is_empty());
    assert_eq!(second.store.load(Endpoint::ScheduleA).await.unwrap(), Some(9));
}

#[tokio::test]
async fn test_legacy_float_checkpoint_is_resumed() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("schedule_b"), "138873463.0").unwrap();
    let config = config_for(&server, dir.path());

    Mock::given(method("GET"))
        .and(path("/v1/schedules/schedule_b/"))
        .and(query_param("last_index", "138873463"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(body(results("sched_b_sk", &[138873470]), None)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let p = pipeline(&config).await;
    let url = config.endpoint_url(Endpoint::ScheduleB).unwrap();
    let report = p.driver.run_sweep(Endpoint::ScheduleB, &url).await.unwrap();

    assert_eq!(
        report.outcome,
        SweepOutcome::Done {
            persisted: Some(138873470)
        }
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("schedule_b")).unwrap(),
        "138873470"
    );
}

#[tokio::test]
async fn test_quota_cooldown_pauses_once_without_refetch() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, dir.path());

    Mock::given(method("GET"))
        .and(path("/v1/schedules/schedule_a/"))
        .and(query_param_is_missing("last_index"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-RateLimit-Remaining", "1")
                .set_body_json(body(results("sched_a_sk", &[3]), Some(3.0))),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/schedules/schedule_a/"))
        .and(query_param("last_index", "3"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-RateLimit-Remaining", "999")
                .set_body_json(body(json!([]), None)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let p = pipeline(&config).await;
    let url = config.endpoint_url(Endpoint::ScheduleA).unwrap();
    let report = p.driver.run_sweep(Endpoint::ScheduleA, &url).await.unwrap();

    assert!(report.outcome.is_done());
    assert_eq!(p.sleeper.durations(), vec![Duration::from_secs(3660)]);
}

#[tokio::test]
async fn test_server_errors_exhaust_retry_budget() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("schedule_a"), "77").unwrap();
    let config = config_for(&server, dir.path());

    Mock::given(method("GET"))
        .and(path("/v1/schedules/schedule_a/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("over capacity"))
        .expect(4)
        .mount(&server)
        .await;

    let p = pipeline(&config).await;
    let url = config.endpoint_url(Endpoint::ScheduleA).unwrap();
    let report = p.driver.run_sweep(Endpoint::ScheduleA, &url).await.unwrap();

    match &report.outcome {
        SweepOutcome::Failed { reason } => {
            assert!(reason.contains("4 attempts"), "{reason}");
            assert!(!reason.contains("DEMO_KEY"), "api key leaked: {reason}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(p.sleeper.count(), 3);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("schedule_a")).unwrap(),
        "77"
    );
}

#[tokio::test]
async fn test_scheduler_round_isolates_failing_endpoint() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, dir.path());

    Mock::given(method("GET"))
        .and(path("/v1/schedules/schedule_a/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/schedules/schedule_b/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(body(results("sched_b_sk", &[41, 42]), None)),
        )
        .mount(&server)
        .await;

    let p = pipeline(&config).await;
    let scheduler = PollScheduler::new(
        p.driver,
        config.targets().unwrap(),
        p.sleeper.clone(),
        ShutdownCoordinator::new(),
    )
    .with_config(config.scheduler_config());

    let summary = scheduler.run_once().await.unwrap();

    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failed(), 1);
    assert!(summary
        .report(Endpoint::ScheduleA)
        .unwrap()
        .outcome
        .is_failed());
    assert_eq!(p.store.load(Endpoint::ScheduleA).await.unwrap(), None);
    assert_eq!(p.store.load(Endpoint::ScheduleB).await.unwrap(), Some(42));
    assert_eq!(p.sink.records_for(Endpoint::ScheduleB).await.len(), 2);
}
