//! Pattern-based archival of rolled log files.
//!
//! Write flow: collect matches → write members into the hidden sibling
//! `.logs-<pattern>.zip.partial` → finish + fsync → `rename` over
//! `logs-<pattern>.zip` → delete the sources.
//!
//! Sources are only removed once the bundle holding them is complete on
//! disk. A crash between the rename and the deletions leaves sources behind;
//! the next run for the same pattern archives them again as `~N` members.
//!
//! A zero-byte bundle counts as having no members. A bundle that is not a
//! readable zip is renamed to `logs-<pattern>.zip.corrupt` and a fresh one
//! takes its place.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use logward_core::retention;

use crate::error::{io_err, ArchiveError};
use crate::walk::walk_files;

/// Result of a successful [`archive`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOutcome {
    /// `logs-<pattern>.zip` inside the log directory. Only present on disk
    /// when at least one file was archived (now or by an earlier run).
    pub bundle: PathBuf,
    /// Source files moved into the bundle by this call.
    pub files_compressed: usize,
}

/// Archive every log file dated `date` (`YYYY-MM-DD` substring match).
pub fn archive_date(directory: &Path, date: NaiveDate) -> Result<ArchiveOutcome, ArchiveError> {
    archive(directory, &retention::format_date(date))
}

/// Move every file under `directory` whose name contains `pattern` into
/// `logs-<pattern>.zip`.
///
/// Existing members of that bundle are preserved. With zero matches nothing
/// is written.
pub fn archive(directory: &Path, pattern: &str) -> Result<ArchiveOutcome, ArchiveError> {
    retention::validate_pattern(pattern)?;
    if !directory.is_dir() {
        return Err(ArchiveError::DirectoryNotFound {
            path: directory.to_path_buf(),
        });
    }

    let bundle_name = retention::bundle_name(pattern);
    let bundle = directory.join(&bundle_name);
    let partial = directory.join(format!(".{bundle_name}.partial"));
    let aside = corrupt_path(&bundle);

    let candidates: Vec<PathBuf> = walk_files(directory)?
        .into_iter()
        .filter(|path| *path != partial && *path != aside)
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| retention::matches_pattern(name, pattern))
                .unwrap_or(false)
        })
        .collect();

    if candidates.is_empty() {
        remove_if_empty(&bundle);
        tracing::info!(
            directory = %directory.display(),
            pattern,
            "no log files matched; nothing archived",
        );
        return Ok(ArchiveOutcome {
            bundle,
            files_compressed: 0,
        });
    }

    let archived = match write_bundle(directory, &bundle, &partial, &candidates) {
        Ok(archived) => archived,
        Err(err) => {
            let _ = fs::remove_file(&partial);
            return Err(err);
        }
    };

    if archived.is_empty() {
        let _ = fs::remove_file(&partial);
        tracing::info!(
            directory = %directory.display(),
            pattern,
            "no matching log file was readable; nothing archived",
        );
        return Ok(ArchiveOutcome {
            bundle,
            files_compressed: 0,
        });
    }

    if let Err(err) = fs::rename(&partial, &bundle) {
        let _ = fs::remove_file(&partial);
        return Err(io_err(&bundle, err));
    }

    for source in &archived {
        match fs::remove_file(source) {
            Ok(()) => tracing::debug!(path = %source.display(), "archived log file removed"),
            Err(err) => tracing::warn!(
                path = %source.display(),
                error = %err,
                "archived log file could not be removed",
            ),
        }
    }

    tracing::info!(
        bundle = %bundle.display(),
        files = archived.len(),
        "log files archived",
    );

    Ok(ArchiveOutcome {
        bundle,
        files_compressed: archived.len(),
    })
}

/// Write carried-over and new members into `partial`. Returns the sources
/// that made it into the bundle.
fn write_bundle(
    directory: &Path,
    bundle: &Path,
    partial: &Path,
    candidates: &[PathBuf],
) -> Result<Vec<PathBuf>, ArchiveError> {
    let file = File::create(partial).map_err(|e| io_err(partial, e))?;
    let mut writer = ZipWriter::new(file);
    let mut used_names = HashSet::new();

    if bundle.exists() {
        carry_existing_members(bundle, &mut writer, &mut used_names)?;
    }

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut archived = Vec::with_capacity(candidates.len());

    for source in candidates {
        let mut input = match File::open(source) {
            Ok(input) => input,
            Err(err) => {
                tracing::warn!(
                    path = %source.display(),
                    error = %err,
                    "skipping unreadable log file",
                );
                continue;
            }
        };

        let name = unique_member_name(member_name(directory, source), &mut used_names);
        if append_member(&mut writer, &name, &mut input, options)? {
            tracing::debug!(path = %source.display(), member = %name, "log file added to bundle");
            archived.push(source.clone());
        }
    }

    let file = writer.finish()?;
    file.sync_all().map_err(|e| io_err(partial, e))?;
    Ok(archived)
}

/// Copy one source into a new member. A read failure drops the half-written
/// member and returns `false`; the source stays on disk.
fn append_member<W: Write + Seek, R: Read>(
    writer: &mut ZipWriter<W>,
    name: &str,
    input: &mut R,
    options: SimpleFileOptions,
) -> Result<bool, ArchiveError> {
    writer.start_file(name, options)?;
    match io::copy(input, writer) {
        Ok(_) => Ok(true),
        Err(err) => {
            writer.abort_file()?;
            tracing::warn!(member = name, error = %err, "log file could not be read; left in place");
            Ok(false)
        }
    }
}

fn corrupt_path(bundle: &Path) -> PathBuf {
    let mut name = bundle.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    bundle.with_file_name(name)
}

fn carry_existing_members(
    bundle: &Path,
    writer: &mut ZipWriter<File>,
    used_names: &mut HashSet<String>,
) -> Result<(), ArchiveError> {
    let existing = File::open(bundle).map_err(|e| io_err(bundle, e))?;
    let len = existing.metadata().map_err(|e| io_err(bundle, e))?.len();
    if len == 0 {
        tracing::warn!(bundle = %bundle.display(), "empty log bundle file replaced");
        return Ok(());
    }
    let mut archive = match ZipArchive::new(existing) {
        Ok(archive) => archive,
        Err(err) => {
            let aside = corrupt_path(bundle);
            fs::rename(bundle, &aside).map_err(|e| io_err(bundle, e))?;
            tracing::warn!(
                bundle = %bundle.display(),
                moved_to = %aside.display(),
                error = %err,
                "unreadable log bundle set aside",
            );
            return Ok(());
        }
    };
    for index in 0..archive.len() {
        let member = archive.by_index_raw(index)?;
        used_names.insert(member.name().to_string());
        writer.raw_copy_file(member)?;
    }
    Ok(())
}

/// A stale zero-member or zero-byte bundle is never left behind.
fn remove_if_empty(bundle: &Path) {
    let Ok(file) = File::open(bundle) else {
        return;
    };
    let empty = match file.metadata() {
        Ok(meta) if meta.len() == 0 => true,
        _ => matches!(ZipArchive::new(file), Ok(archive) if archive.len() == 0),
    };
    if empty {
        match fs::remove_file(bundle) {
            Ok(()) => tracing::info!(bundle = %bundle.display(), "empty log bundle removed"),
            Err(err) => tracing::warn!(
                bundle = %bundle.display(),
                error = %err,
                "empty log bundle could not be removed",
            ),
        }
    }
}

/// Path relative to the log directory, `/`-separated.
fn member_name(directory: &Path, source: &Path) -> String {
    let relative = source.strip_prefix(directory).unwrap_or(source);
    let parts: Vec<_> = relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect();
    parts.join("/")
}

fn unique_member_name(name: String, used: &mut HashSet<String>) -> String {
    if used.insert(name.clone()) {
        return name;
    }
    let mut n = 1usize;
    loop {
        let candidate = format!("{name}~{n}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
