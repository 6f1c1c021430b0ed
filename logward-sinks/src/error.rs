//! Error types for logward-sinks.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop a sink configuration from being applied, or a
/// log email from being delivered.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid level directive: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("failed to swap sink configuration: {0}")]
    Reload(#[from] tracing_subscriber::reload::Error),

    #[error("a global tracing subscriber is already installed: {0}")]
    Install(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("invalid email address {address:?}: {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("failed to build log email: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}
