use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the maintenance scheduler, config watch loop and
/// log manager.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("settings error: {0}")]
    Settings(#[from] logward_core::SettingsError),

    #[error("sink error: {0}")]
    Sink(#[from] logward_sinks::SinkError),

    #[error("archive error: {0}")]
    Archive(#[from] logward_archive::ArchiveError),

    #[error("config file does not exist: {path}")]
    ConfigMissing { path: PathBuf },

    #[error("log manager has no config file to reload")]
    NotFileBacked,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
