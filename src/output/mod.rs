//! Output module
//!
//! Record sinks: where ingested records go.
//!
//! # Overview
//!
//! - `RecordSink` - one-record-at-a-time delivery contract
//! - `WriterSink` - JSON lines or XML event envelopes on any writer (stdout by default)
//! - `MemorySink` - in-memory collector

mod sink;

pub use sink::{escape_xml, MemorySink, OutputFormat, RecordSink, WriterSink};
