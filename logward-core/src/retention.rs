//! Retention policy engine.
//!
//! Pure date and file-name logic shared by the archiver, the pruner and the
//! maintenance scheduler. Nothing in here touches the filesystem.
//!
//! # Bundle naming
//!
//! ```text
//! logs-<pattern>.zip        produced by the archiver
//! logs-YYYY-MM-DD.zip       the only shape the pruner will ever delete
//! ```

use std::time::Duration;

use chrono::{Days, NaiveDate, NaiveDateTime};

use crate::error::RetentionError;

pub const BUNDLE_PREFIX: &str = "logs-";
pub const BUNDLE_EXTENSION: &str = "zip";
pub const BUNDLE_SUFFIX: &str = ".zip";

/// Number of characters between [`BUNDLE_PREFIX`] and [`BUNDLE_SUFFIX`].
pub const BUNDLE_DATE_LEN: usize = 10;

/// `chrono` format for dates embedded in bundle and rolled file names.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// `logs-<pattern>.zip`
pub fn bundle_name(pattern: &str) -> String {
    format!("{BUNDLE_PREFIX}{pattern}.{BUNDLE_EXTENSION}")
}

/// True when `name` follows the bundle naming convention (prefix + extension).
///
/// The embedded date is not checked; see [`extract_date`].
pub fn is_bundle_name(name: &str) -> bool {
    name.starts_with(BUNDLE_PREFIX) && name.ends_with(BUNDLE_SUFFIX)
}

/// True if `file_name` should be swept into the bundle for `pattern`.
///
/// Files that already carry the archive extension never match, so a bundle
/// is never compressed into another bundle.
pub fn matches_pattern(file_name: &str, pattern: &str) -> bool {
    file_name.contains(pattern) && !file_name.ends_with(BUNDLE_SUFFIX)
}

/// Reject patterns that would match every file or escape the log directory.
pub fn validate_pattern(pattern: &str) -> Result<(), RetentionError> {
    let invalid = |reason| RetentionError::InvalidPattern {
        pattern: pattern.to_string(),
        reason,
    };
    if pattern.is_empty() {
        return Err(invalid("pattern must not be empty"));
    }
    if pattern.contains(['/', '\\']) {
        return Err(invalid("pattern must not contain path separators"));
    }
    Ok(())
}

/// Parse the date out of `logs-YYYY-MM-DD.zip`.
///
/// Any deviation from the fixed prefix + length + extension encoding is a
/// [`RetentionError::MalformedBundleName`].
pub fn extract_date(bundle_name: &str) -> Result<NaiveDate, RetentionError> {
    let malformed = |reason: String| RetentionError::MalformedBundleName {
        name: bundle_name.to_string(),
        reason,
    };

    let stem = bundle_name
        .strip_prefix(BUNDLE_PREFIX)
        .ok_or_else(|| malformed(format!("missing '{BUNDLE_PREFIX}' prefix")))?
        .strip_suffix(BUNDLE_SUFFIX)
        .ok_or_else(|| malformed(format!("missing '{BUNDLE_SUFFIX}' extension")))?;

    let len = stem.chars().count();
    if len != BUNDLE_DATE_LEN {
        return Err(malformed(format!(
            "expected {BUNDLE_DATE_LEN} date characters, found {len}"
        )));
    }

    NaiveDate::parse_from_str(stem, DATE_FORMAT).map_err(|err| malformed(err.to_string()))
}

/// `today - days_to_keep`, saturating at the earliest representable date.
pub fn cutoff(today: NaiveDate, days_to_keep: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(days_to_keep)))
        .unwrap_or(NaiveDate::MIN)
}

/// Strictly before: a bundle dated on the cutoff itself is kept.
pub fn is_expired(date: NaiveDate, cutoff: NaiveDate) -> bool {
    date < cutoff
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// The archive pattern for a maintenance run on `today`: yesterday's date.
pub fn archive_target(today: NaiveDate) -> String {
    format_date(today.pred_opt().unwrap_or(today))
}

/// Time from `now` until the next local midnight.
///
/// Exactly at midnight the next run is a full day away.
pub fn delay_until_next_midnight(now: NaiveDateTime) -> Duration {
    let next = now
        .date()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0));
    match next {
        Some(next) => (next - now).to_std().unwrap_or_default(),
        None => Duration::ZERO,
    }
}
