//! CLI module
//!
//! Command-line interface for running the ingester.
//!
//! # Commands
//!
//! - `run` - Poll enabled endpoints until SIGINT/SIGTERM
//! - `once` - Run a single polling round
//! - `validate` - Check the configuration
//! - `checkpoint show` / `checkpoint reset <endpoint>` - Inspect or clear checkpoints

mod commands;
mod runner;

pub use commands::{CheckpointCommand, Cli, Commands};
pub use runner::Runner;
