//! Test doubles shared by the engine and scheduler tests

use crate::error::{Error, Result};
use crate::http::{Fetcher, RawPage};
use crate::output::RecordSink;
use crate::state::CheckpointStore;
use crate::types::{Cursor, Endpoint, Record};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use url::Url;

pub(crate) fn url_for(endpoint: Endpoint) -> Url {
    Url::parse(&format!(
        "https://api.example.com/v1/schedules/{}/?per_page=100&api_key=test",
        endpoint.id()
    ))
    .unwrap()
}

pub(crate) fn page(results: serde_json::Value, last_index: Option<f64>) -> RawPage {
    let last_indexes = match last_index {
        Some(idx) => json!({ "last_index": idx }),
        None => serde_json::Value::Null,
    };
    RawPage::new(json!({
        "results": results,
        "pagination": { "last_indexes": last_indexes }
    }))
}

pub(crate) fn terminal_page() -> RawPage {
    page(json!([]), None)
}

pub(crate) fn transient() -> Error {
    Error::transient("https://api.example.com", "connection reset")
}

// ============================================================================
// Scripted Fetcher
// ============================================================================

/// Replays queued responses per URL path; an exhausted queue yields the terminal page
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    script: Mutex<HashMap<String, VecDeque<Result<RawPage>>>>,
    calls: Mutex<Vec<(String, Option<Cursor>)>>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, endpoint: Endpoint, response: Result<RawPage>) -> &Self {
        self.script
            .lock()
            .unwrap()
            .entry(url_for(endpoint).path().to_string())
            .or_default()
            .push_back(response);
        self
    }

    /// Cursors passed to `fetch` for an endpoint, in call order
    pub(crate) fn cursors(&self, endpoint: Endpoint) -> Vec<Option<Cursor>> {
        let path = url_for(endpoint).path().to_string();
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| *p == path)
            .map(|(_, c)| *c)
            .collect()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &Url, cursor: Option<Cursor>) -> Result<RawPage> {
        let path = url.path().to_string();
        self.calls.lock().unwrap().push((path.clone(), cursor));
        self.script
            .lock()
            .unwrap()
            .get_mut(&path)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(terminal_page()))
    }
}

// ============================================================================
// Simulated API
// ============================================================================

/// Keyset-paginated API over a fixed sorted key set
///
/// Returns the `page_size` records with keys greater than the cursor; once
/// nothing is left it answers with the empty terminal page. With
/// `crashing_after(n)` every call after the first `n` fails with
/// `Cancelled`, standing in for a process dying mid-sweep.
pub(crate) struct SimulatedApi {
    keys: Vec<Cursor>,
    page_size: usize,
    crash_after: Option<usize>,
    calls: Mutex<Vec<Option<Cursor>>>,
}

impl SimulatedApi {
    pub(crate) fn new(keys: Vec<Cursor>, page_size: usize) -> Self {
        Self {
            keys,
            page_size,
            crash_after: None,
            calls: Mutex::default(),
        }
    }

    pub(crate) fn crashing_after(mut self, calls: usize) -> Self {
        self.crash_after = Some(calls);
        self
    }

    pub(crate) fn cursors(&self) -> Vec<Option<Cursor>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for SimulatedApi {
    async fn fetch(&self, _url: &Url, cursor: Option<Cursor>) -> Result<RawPage> {
        let call_no = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(cursor);
            calls.len()
        };
        if self.crash_after.is_some_and(|n| call_no > n) {
            return Err(Error::Cancelled);
        }

        let batch: Vec<Cursor> = self
            .keys
            .iter()
            .copied()
            .filter(|k| cursor.map_or(true, |c| *k > c))
            .take(self.page_size)
            .collect();

        match batch.last() {
            None => Ok(terminal_page()),
            Some(&last) => {
                let results: Vec<serde_json::Value> =
                    batch.iter().map(|k| json!({ "sched_a_sk": k })).collect();
                Ok(page(json!(results), Some(last as f64)))
            }
        }
    }
}

// ============================================================================
// Failing Doubles
// ============================================================================

/// Store whose saves always fail
#[derive(Default)]
pub(crate) struct ReadOnlyStore {
    pub(crate) cursor: Option<Cursor>,
}

#[async_trait]
impl CheckpointStore for ReadOnlyStore {
    async fn load(&self, _endpoint: Endpoint) -> Result<Option<Cursor>> {
        Ok(self.cursor)
    }

    async fn save(&self, endpoint: Endpoint, _cursor: Cursor) -> Result<()> {
        Err(Error::checkpoint(endpoint.id(), "read-only filesystem"))
    }

    async fn clear(&self, _endpoint: Endpoint) -> Result<()> {
        Ok(())
    }
}

/// Sink that rejects everything
pub(crate) struct BrokenSink;

#[async_trait]
impl RecordSink for BrokenSink {
    async fn emit(&self, _endpoint: Endpoint, _record: &Record) -> Result<()> {
        Err(Error::sink("broken pipe"))
    }

    async fn flush(&self) -> Result<()> {
        Err(Error::sink("broken pipe"))
    }
}
