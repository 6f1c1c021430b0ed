//! `logward archive`: one-off archival of a log directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Args;
use colored::Colorize;

use logward_archive::archive;
use logward_core::retention;

#[derive(Args, Debug)]
pub struct ArchiveArgs {
    /// Log directory.
    pub dir: PathBuf,

    /// Archive files whose name contains this text.
    #[arg(long, conflicts_with = "date")]
    pub pattern: Option<String>,

    /// Archive files dated this day. Defaults to yesterday.
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

impl ArchiveArgs {
    pub fn run(self) -> Result<()> {
        let pattern = match (self.pattern, self.date) {
            (Some(pattern), _) => pattern,
            (None, Some(date)) => retention::format_date(date),
            (None, None) => retention::archive_target(Local::now().date_naive()),
        };

        let outcome = archive(&self.dir, &pattern)
            .with_context(|| format!("failed to archive {}", self.dir.display()))?;

        if outcome.files_compressed == 0 {
            println!("{} no log files matched '{pattern}'", "skipped".dimmed());
        } else {
            println!(
                "{} archived {} file(s) into {}",
                "✓".green(),
                outcome.files_compressed,
                outcome.bundle.display()
            );
        }
        Ok(())
    }
}
