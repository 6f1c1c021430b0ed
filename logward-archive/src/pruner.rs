//! Retention-based deletion of archive bundles.
//!
//! Only names of the form `logs-YYYY-MM-DD.zip` are ever deleted. Raw log
//! files are left to the archiver (or to external rotation), whatever
//! their age.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};

use logward_core::retention;

use crate::error::ArchiveError;
use crate::walk::walk_files;

/// What a prune pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Bundles removed because their date fell before the cutoff.
    pub deleted: Vec<PathBuf>,
    /// Bundle-shaped names whose date could not be parsed.
    pub skipped: Vec<PathBuf>,
}

/// Delete bundles older than `days_to_keep` days, relative to the local date.
pub fn prune(directory: &Path, days_to_keep: u32) -> Result<PruneReport, ArchiveError> {
    prune_as_of(directory, days_to_keep, Local::now().date_naive())
}

/// [`prune`] with an explicit "today".
///
/// A missing directory is not an error; there is simply nothing to prune.
pub fn prune_as_of(
    directory: &Path,
    days_to_keep: u32,
    today: NaiveDate,
) -> Result<PruneReport, ArchiveError> {
    let mut report = PruneReport::default();
    if !directory.exists() {
        tracing::debug!(directory = %directory.display(), "log directory missing; nothing to prune");
        return Ok(report);
    }

    let cutoff = retention::cutoff(today, days_to_keep);

    for path in walk_files(directory)? {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !retention::is_bundle_name(name) {
            continue;
        }

        match retention::extract_date(name) {
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping log bundle");
                report.skipped.push(path);
            }
            Ok(date) if retention::is_expired(date, cutoff) => match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::info!(path = %path.display(), %date, %cutoff, "expired log bundle removed");
                    report.deleted.push(path);
                }
                Err(err) => tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "expired log bundle could not be removed",
                ),
            },
            Ok(_) => {}
        }
    }

    Ok(report)
}
