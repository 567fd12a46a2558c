use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the daemon runtime and its client protocol.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings error: {0}")]
    Config(#[from] tinygen_core::ConfigError),

    #[error("pipeline setup error: {0}")]
    Pipeline(#[from] tinygen_pipeline::PipelineError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("daemon protocol error: {0}")]
    Protocol(String),

    /// The daemon answered the request with an error.
    #[error("{stage} stage failed: {message}")]
    Remote { stage: String, message: String },

    /// Another process still accepts connections on the socket.
    #[error("daemon already running on {socket} ({owner})")]
    AlreadyRunning { socket: PathBuf, owner: String },

    #[error("daemon is not running (socket missing: {socket})")]
    DaemonNotRunning { socket: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
