//! Checkpoint module
//!
//! Durable per-endpoint cursor persistence. A checkpoint is read once at the
//! start of each sweep and written once, when the sweep reaches its terminal
//! page.
//!
//! # Overview
//!
//! The state module provides:
//! - `CheckpointStore` - the load/save/clear contract used by the driver
//! - `FileCheckpointStore` - one file per endpoint, atomic writes
//! - `MemoryCheckpointStore` - in-process store for dry runs and tests

mod store;

pub use store::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
