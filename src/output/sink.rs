//! Record sinks
//!
//! A sink receives records one at a time, in emission order. The driver
//! flushes the sink before every checkpoint write, so a persisted cursor
//! never runs ahead of what the consumer has actually received.

use crate::error::{Error, Result};
use crate::types::{Endpoint, Record};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Mutex;

/// Consumer of ingested records
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Deliver one record
    async fn emit(&self, endpoint: Endpoint, record: &Record) -> Result<()>;

    /// Make every emitted record durable/visible to the consumer
    async fn flush(&self) -> Result<()>;
}

/// Serialization used by [`WriterSink`]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One JSON document per line
    #[default]
    Json,
    /// `<stream><event><data>…</data></event></stream>` envelopes
    Xml,
}

// ============================================================================
// Writer Sink
// ============================================================================

/// Sink writing serialized records to any `Write`
pub struct WriterSink<W> {
    writer: Mutex<W>,
    format: OutputFormat,
}

impl WriterSink<std::io::Stdout> {
    /// Sink writing to standard output
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(std::io::stdout(), format)
    }
}

impl<W: Write + Send> WriterSink<W> {
    /// Create a sink over `writer`
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer: Mutex::new(writer),
            format,
        }
    }

    /// Output format of this sink
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Consume the sink, returning the writer
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|_| Error::sink("writer lock poisoned"))
    }

    fn render(&self, record: &Record) -> Result<String> {
        let json = serde_json::to_string(record)
            .map_err(|e| Error::sink(format!("Failed to serialize record: {e}")))?;

        Ok(match self.format {
            OutputFormat::Json => json,
            OutputFormat::Xml => format!(
                "<stream><event><data>{}</data></event></stream>",
                escape_xml(&json)
            ),
        })
    }
}

#[async_trait]
impl<W: Write + Send> RecordSink for WriterSink<W> {
    async fn emit(&self, _endpoint: Endpoint, record: &Record) -> Result<()> {
        let line = self.render(record)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| Error::sink("writer lock poisoned"))?;
        writeln!(writer, "{line}").map_err(|e| Error::sink(format!("Write failed: {e}")))
    }

    async fn flush(&self) -> Result<()> {
        self.writer
            .lock()
            .map_err(|_| Error::sink("writer lock poisoned"))?
            .flush()
            .map_err(|e| Error::sink(format!("Flush failed: {e}")))
    }
}

impl<W> std::fmt::Debug for WriterSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterSink")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// Escape `&`, `<` and `>` for XML character data
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

// ============================================================================
// Memory Sink
// ============================================================================

/// Sink collecting records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: tokio::sync::Mutex<Vec<(Endpoint, Record)>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record received so far, with its endpoint
    pub async fn records(&self) -> Vec<(Endpoint, Record)> {
        self.records.lock().await.clone()
    }

    /// Records received for one endpoint
    pub async fn records_for(&self, endpoint: Endpoint) -> Vec<Record> {
        self.records
            .lock()
            .await
            .iter()
            .filter(|(e, _)| *e == endpoint)
            .map(|(_, r)| r.clone())
            .collect()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn emit(&self, endpoint: Endpoint, record: &Record) -> Result<()> {
        self.records.lock().await.push((endpoint, record.clone()));
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
