//! Daily log files that also roll over by size.
//!
//! The live file is `<name>.<YYYY-MM-DD>` in local time. When a write would
//! push it past the size limit it becomes `<name>.<date>.1`, older numbered
//! siblings shift up by one, and a fresh live file is opened. Every name keeps
//! its date, so date-pattern archiving picks up the numbered files too.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};

use crate::error::SinkError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// [`Write`] target for the file sink.
#[derive(Debug)]
pub struct RollingFile {
    directory: PathBuf,
    file_name: String,
    max_bytes: Option<u64>,
    max_days: Option<u32>,
    current: Option<LiveFile>,
}

#[derive(Debug)]
struct LiveFile {
    file: File,
    date: NaiveDate,
    size: u64,
}

impl RollingFile {
    pub fn new(directory: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_name: file_name.into(),
            max_bytes: None,
            max_days: None,
            current: None,
        }
    }

    /// Roll over once the live file would grow past `max` bytes.
    pub fn max_bytes(mut self, max: Option<u64>) -> Self {
        self.max_bytes = max;
        self
    }

    /// Delete this sink's files once they are `days` days old.
    pub fn max_days(mut self, days: Option<u32>) -> Self {
        self.max_days = days;
        self
    }

    /// Create the directory and open today's file, so a bad path fails the
    /// apply instead of the first write.
    pub fn open(mut self) -> Result<Self, SinkError> {
        fs::create_dir_all(&self.directory).map_err(|source| SinkError::Io {
            path: self.directory.clone(),
            source,
        })?;
        let today = Local::now().date_naive();
        self.open_day(today).map_err(|source| SinkError::Io {
            path: self.live_path(today),
            source,
        })?;
        Ok(self)
    }

    pub fn live_path(&self, date: NaiveDate) -> PathBuf {
        self.directory
            .join(format!("{}.{}", self.file_name, date.format(DATE_FORMAT)))
    }

    pub(crate) fn write_on(&mut self, today: NaiveDate, buf: &[u8]) -> io::Result<usize> {
        let stale = self.current.as_ref().map_or(true, |live| live.date != today);
        if stale {
            self.open_day(today)?;
        } else if self.over_limit(buf.len()) {
            // Close before renaming so the handle never follows the old file.
            self.current = None;
            let live = self.live_path(today);
            shift_numbered(&live)?;
            self.open_live(today)?;
            tracing::debug!(path = %live.display(), "log file rolled over by size");
        }

        let live = self
            .current
            .as_mut()
            .ok_or_else(|| io::Error::other("log file is not open"))?;
        let written = live.file.write(buf)?;
        live.size += written as u64;
        Ok(written)
    }

    fn over_limit(&self, incoming: usize) -> bool {
        match (&self.current, self.max_bytes) {
            // A single oversized event still goes into an empty file.
            (Some(live), Some(max)) => live.size > 0 && live.size + incoming as u64 > max,
            _ => false,
        }
    }

    fn open_day(&mut self, date: NaiveDate) -> io::Result<()> {
        self.open_live(date)?;
        if let Some(days) = self.max_days {
            self.remove_expired(date, days);
        }
        Ok(())
    }

    fn open_live(&mut self, date: NaiveDate) -> io::Result<()> {
        self.current = None;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.live_path(date))?;
        let size = file.metadata()?.len();
        self.current = Some(LiveFile { file, date, size });
        Ok(())
    }

    fn remove_expired(&self, today: NaiveDate, days: u32) {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(path = %self.directory.display(), error = %err, "cannot scan log directory");
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(date) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| self.file_date(name))
            else {
                continue;
            };
            if (today - date).num_days() < i64::from(days) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "expired log file removed"),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "failed to remove expired log file")
                }
            }
        }
    }

    /// Date of a `<name>.<date>` or `<name>.<date>.<n>` file owned by this sink.
    fn file_date(&self, name: &str) -> Option<NaiveDate> {
        let rest = name
            .strip_prefix(self.file_name.as_str())?
            .strip_prefix('.')?;
        let (date, suffix) = (rest.get(..10)?, rest.get(10..)?);
        let numbered = suffix.is_empty()
            || suffix
                .strip_prefix('.')
                .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
        if !numbered {
            return None;
        }
        NaiveDate::parse_from_str(date, DATE_FORMAT).ok()
    }
}

impl Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_on(Local::now().date_naive(), buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.current.as_mut() {
            Some(live) => live.file.flush(),
            None => Ok(()),
        }
    }
}

fn numbered_path(base: &Path, n: u32) -> PathBuf {
    let mut name = base.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{n}"));
    base.with_file_name(name)
}

/// `base` becomes `base.1`; every existing `base.n` moves to `base.n+1`.
fn shift_numbered(base: &Path) -> io::Result<()> {
    let mut highest = 0;
    while numbered_path(base, highest + 1).exists() {
        highest += 1;
    }
    for n in (1..=highest).rev() {
        fs::rename(numbered_path(base, n), numbered_path(base, n + 1))?;
    }
    fs::rename(base, numbered_path(base, 1))
}
