//! CLI runner - executes commands

use crate::cli::commands::{CheckpointCommand, Cli, Commands};
use crate::config::IngestConfig;
use crate::engine::PaginationDriver;
use crate::error::{Error, Result, ResultExt};
use crate::http::HttpFetcher;
use crate::output::WriterSink;
use crate::scheduler::PollScheduler;
use crate::shutdown::ShutdownCoordinator;
use crate::sleep::{Sleeper, TokioSleeper};
use crate::state::{CheckpointStore, FileCheckpointStore};
use crate::types::Endpoint;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Run => self.poll().await,
            Commands::Once => self.once().await,
            Commands::Validate => self.validate(),
            Commands::Checkpoint { action } => match action {
                CheckpointCommand::Show => self.checkpoint_show().await,
                CheckpointCommand::Reset { endpoint } => self.checkpoint_reset(*endpoint).await,
            },
        }
    }

    /// Load configuration without validating it
    fn load_config(&self) -> Result<IngestConfig> {
        // Inline config takes precedence
        let mut config = if let Some(json_str) = &self.cli.config_json {
            IngestConfig::from_json(json_str)?
        } else if let Some(path) = &self.cli.config {
            IngestConfig::from_file(path)?
        } else {
            return Err(Error::config(
                "No configuration given (use --config or --config-json)",
            ));
        };

        if let Some(format) = self.cli.format {
            config.output = format;
        }

        Ok(config.resolve_env())
    }

    /// Load and validate configuration
    fn load_valid_config(&self) -> Result<IngestConfig> {
        let config = self.load_config()?;
        config.validate()?;
        Ok(config)
    }

    /// Wire the components for `config`
    async fn build_scheduler(
        &self,
        config: &IngestConfig,
        shutdown: ShutdownCoordinator,
    ) -> Result<PollScheduler> {
        let store = FileCheckpointStore::open(config.checkpoint_dir()?).await?;
        let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper::new(shutdown.clone()));
        let fetcher = HttpFetcher::new(config.fetcher_config(), sleeper.clone())?;
        let sink = WriterSink::stdout(config.output);

        let driver = PaginationDriver::new(
            Arc::new(fetcher),
            Arc::new(store),
            Arc::new(sink),
            sleeper.clone(),
        )
        .with_config(config.driver_config());

        Ok(
            PollScheduler::new(driver, config.targets()?, sleeper, shutdown)
                .with_config(config.scheduler_config()),
        )
    }

    fn install_shutdown() -> Result<ShutdownCoordinator> {
        let shutdown = ShutdownCoordinator::new();
        shutdown
            .install_signal_handlers()
            .context("Failed to install signal handlers")?;
        Ok(shutdown)
    }

    /// Poll until interrupted
    async fn poll(&self) -> Result<()> {
        let config = self.load_valid_config()?;
        let shutdown = Self::install_shutdown()?;
        let scheduler = self.build_scheduler(&config, shutdown).await?;

        info!(
            endpoints = ?config.enabled_endpoints(),
            checkpoint_dir = %config.checkpoint_dir()?.display(),
            "Ingester starting"
        );
        scheduler.run().await
    }

    /// Run one round and print its summary to stderr
    async fn once(&self) -> Result<()> {
        let config = self.load_valid_config()?;
        let shutdown = Self::install_shutdown()?;
        let scheduler = self.build_scheduler(&config, shutdown).await?;

        let summary = match scheduler.run_once().await {
            Ok(summary) => summary,
            Err(Error::Cancelled) => {
                warn!("Interrupted before the round finished");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        // stdout carries the records
        eprintln!("{}", serde_json::to_string_pretty(&summary)?);

        if summary.failed() > 0 {
            return Err(Error::Internal(format!(
                "{} of {} endpoint sweeps failed",
                summary.failed(),
                summary.reports.len()
            )));
        }
        Ok(())
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        let config = self.load_valid_config()?;
        let endpoints: Vec<&str> = config.enabled_endpoints().into_iter().map(Endpoint::id).collect();

        Self::output(&json!({
            "status": "valid",
            "endpoints": endpoints,
            "polling_interval_secs": config.polling_interval().as_secs(),
            "checkpoint_dir": config.checkpoint_dir()?,
            "concurrent": config.concurrent,
            "output": config.output,
        }))
    }

    fn checkpoint_store(&self) -> Result<FileCheckpointStore> {
        let config = self.load_config()?;
        Ok(FileCheckpointStore::new(config.checkpoint_dir()?))
    }

    /// Print every endpoint's stored cursor
    async fn checkpoint_show(&self) -> Result<()> {
        let store = self.checkpoint_store()?;

        let mut cursors = Map::new();
        for endpoint in Endpoint::ALL {
            let cursor = store.load(endpoint).await?;
            cursors.insert(endpoint.id().to_string(), json!(cursor));
        }

        Self::output(&Value::Object(cursors))
    }

    /// Clear one endpoint's checkpoint
    async fn checkpoint_reset(&self, endpoint: Endpoint) -> Result<()> {
        let store = self.checkpoint_store()?;
        store.clear(endpoint).await?;
        info!(endpoint = %endpoint, path = %store.path_for(endpoint).display(), "Checkpoint cleared");
        Ok(())
    }

    fn output(value: &Value) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}
