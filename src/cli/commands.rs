//! CLI commands and argument parsing

use crate::output::OutputFormat;
use crate::types::Endpoint;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Resumable ingester for the FEC schedules API
#[derive(Parser, Debug)]
#[command(name = "fec-schedules")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML or JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Inline configuration JSON (takes precedence over --config)
    #[arg(long, global = true)]
    pub config_json: Option<String>,

    /// Record output format (overrides the config file)
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll enabled endpoints until interrupted
    Run,

    /// Run a single polling round and print its summary
    Once,

    /// Validate the configuration without running
    Validate,

    /// Inspect or clear checkpoints
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointCommand,
    },
}

/// Checkpoint subcommands
#[derive(Subcommand, Debug)]
pub enum CheckpointCommand {
    /// Show the stored cursor of every endpoint
    Show,

    /// Delete an endpoint's checkpoint so the next sweep starts from the beginning
    Reset {
        /// Endpoint to reset
        endpoint: Endpoint,
    },
}
