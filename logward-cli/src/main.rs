//! logward: log lifecycle manager CLI.
//!
//! # Usage
//!
//! ```text
//! logward run --config <file> [--no-watch] [--initial-delay immediate|midnight|<secs>]
//! logward archive <dir> [--pattern <p> | --date YYYY-MM-DD]
//! logward prune <dir> [--days N]
//! logward check <file> [--json]
//! ```
//!
//! `-v` raises the level of archiver and pruner diagnostics on stderr
//! (warn, then info, debug, trace). `RUST_LOG` overrides it.

mod commands;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use logward_core::{LevelSetting, LogSettings};
use logward_sinks::filter::build_filter;

use commands::{archive::ArchiveArgs, check::CheckArgs, prune::PruneArgs, run::RunArgs};

#[derive(Parser, Debug)]
#[command(
    name = "logward",
    version,
    about = "Configure log sinks, archive and prune log files, hot-reload logging settings",
    long_about = None,
)]
struct Cli {
    /// More diagnostics on stderr; repeat for more detail.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply a settings file and keep logs maintained until ctrl-c.
    Run(RunArgs),

    /// Move matching log files into a `logs-<pattern>.zip` bundle.
    Archive(ArchiveArgs),

    /// Delete bundles older than the retention window.
    Prune(PruneArgs),

    /// Validate a settings file and show the effective configuration.
    Check(CheckArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Archive(args) => {
            init_diagnostics(cli.verbose)?;
            args.run()
        }
        Commands::Prune(args) => {
            init_diagnostics(cli.verbose)?;
            args.run()
        }
        Commands::Check(args) => args.run(),
    }
}

fn diagnostics_level(verbose: u8) -> LevelSetting {
    match verbose {
        0 => LevelSetting::Warn,
        1 => LevelSetting::Info,
        2 => LevelSetting::Debug,
        _ => LevelSetting::Trace,
    }
}

/// One-shot commands keep stdout for their report, so their own log lines
/// go to stderr.
fn init_diagnostics(verbose: u8) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(&LogSettings {
            level: diagnostics_level(verbose),
            ..LogSettings::default()
        })?,
    };
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}
