//! logward core library: settings snapshots, typed log settings, the
//! retention policy engine and their errors.
//!
//! - [`settings`]: [`Settings`] snapshot, file loaders, [`LogSettings`]
//! - [`retention`]: bundle naming, date extraction, cutoffs
//! - [`error`]: [`SettingsError`], [`RetentionError`]

pub mod error;
pub mod retention;
pub mod settings;

pub use error::{RetentionError, SettingsError};
pub use settings::{
    EmailSettings, EmailTrigger, FileSinkSettings, InitialDelay, LevelSetting, LogFormat,
    LogSettings, Settings, DEFAULT_MAX_HISTORY_DAYS,
};
