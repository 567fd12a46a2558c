//! Error types for tinygen-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::QueryId;

/// Persistence failures raised by a [`crate::ledger::QueryLedger`].
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No record carries this identifier.
    #[error("query {id} not found in ledger")]
    NotFound { id: QueryId },

    /// Underlying I/O failure, annotated with the record or directory path.
    #[error("ledger I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write path).
    #[error("ledger serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A stored record could not be parsed.
    #[error("failed to parse query record at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Failures while loading or saving [`crate::config::Settings`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Malformed config file, with the path and serde_yaml's line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An environment override held a value that does not parse.
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },

    /// A setting is outside its allowed range.
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    /// The backend API key variable is unset or empty.
    #[error("backend API key missing; set ${var}")]
    MissingApiKey { var: String },

    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

pub(crate) fn ledger_io(path: impl Into<PathBuf>, source: std::io::Error) -> LedgerError {
    LedgerError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn config_io(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
