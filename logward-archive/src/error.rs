//! Error types for logward-archive.

use std::path::PathBuf;

use thiserror::Error;

use logward_core::RetentionError;

/// All errors that can abort an archive or prune call.
///
/// Failures on individual files during a walk are logged and skipped; they
/// never surface here.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The log directory does not exist (or is not a directory).
    #[error("log directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// The archive pattern was rejected by the retention engine.
    #[error(transparent)]
    InvalidPattern(#[from] RetentionError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading an existing bundle or writing the new one failed.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Convenience constructor for [`ArchiveError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ArchiveError {
    ArchiveError::Io {
        path: path.into(),
        source,
    }
}
