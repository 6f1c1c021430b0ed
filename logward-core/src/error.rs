//! Error types for logward-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or interpreting a settings source.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("failed to read settings at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A `.properties` line could not be parsed.
    #[error("failed to parse settings at {path}, line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// YAML syntax error, with location context from serde_yaml.
    #[error("failed to parse YAML settings at {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The document parsed, but its shape cannot be flattened into keys.
    #[error("unsupported settings layout in {path}: {message}")]
    Structure { path: PathBuf, message: String },

    /// A key is present but its value has the wrong type.
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Errors from the retention policy engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetentionError {
    #[error("malformed bundle name {name:?}: {reason}")]
    MalformedBundleName { name: String, reason: String },

    #[error("invalid archive pattern {pattern:?}: {reason}")]
    InvalidPattern {
        pattern: String,
        reason: &'static str,
    },
}
