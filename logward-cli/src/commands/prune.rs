//! `logward prune`: delete bundles outside the retention window.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use logward_archive::prune;
use logward_core::DEFAULT_MAX_HISTORY_DAYS;

#[derive(Args, Debug)]
pub struct PruneArgs {
    /// Log directory.
    pub dir: PathBuf,

    /// Days of bundles to keep.
    #[arg(long, default_value_t = DEFAULT_MAX_HISTORY_DAYS)]
    pub days: u32,
}

impl PruneArgs {
    pub fn run(self) -> Result<()> {
        let report = prune(&self.dir, self.days)
            .with_context(|| format!("failed to prune {}", self.dir.display()))?;

        for path in &report.deleted {
            println!("{} {}", "deleted".red(), path.display());
        }
        for path in &report.skipped {
            println!("{} {} (unrecognised date)", "skipped".yellow(), path.display());
        }
        println!(
            "{} bundle(s) deleted, {} skipped, keeping {} day(s)",
            report.deleted.len(),
            report.skipped.len(),
            self.days
        );
        Ok(())
    }
}
