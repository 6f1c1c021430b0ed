//! # logward-archive
//!
//! Filesystem side of log maintenance.
//!
//! Call [`archive`] (or [`archive_date`]) to sweep matching log files into a
//! `logs-<pattern>.zip` bundle, and [`prune`] to delete bundles that have
//! fallen out of the retention window.

pub mod archiver;
pub mod error;
pub mod pruner;
mod walk;

pub use archiver::{archive, archive_date, ArchiveOutcome};
pub use error::ArchiveError;
pub use pruner::{prune, prune_as_of, PruneReport};
