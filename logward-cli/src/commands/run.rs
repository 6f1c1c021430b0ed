//! `logward run`: the long-running manager.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use logward_core::InitialDelay;
use logward_daemon::{LogManager, ManagerOptions};
use logward_sinks::TracingSinks;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Settings file (`.properties`, `.yaml` or `.yml`).
    #[arg(long, short)]
    pub config: PathBuf,

    /// Do not reload when the settings file changes.
    #[arg(long)]
    pub no_watch: bool,

    /// First maintenance run: `immediate`, `midnight` or a number of seconds.
    /// Overrides `log.maintenance.initialDelay`.
    #[arg(long)]
    pub initial_delay: Option<InitialDelay>,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let sinks = TracingSinks::install().context("failed to install log subscriber")?;
        let options = ManagerOptions {
            initial_delay: self.initial_delay,
            watch_config: !self.no_watch,
            ..ManagerOptions::default()
        };
        let manager = LogManager::from_file(&self.config, Arc::new(sinks), options)
            .with_context(|| format!("failed to start log manager for {}", self.config.display()))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to build signal runtime")?;
        runtime
            .block_on(tokio::signal::ctrl_c())
            .context("failed to listen for ctrl-c")?;
        drop(runtime);

        tracing::info!("received ctrl-c, shutting down");
        manager.shutdown();
        Ok(())
    }
}
