//! Error types for tinygen-snapshot.

use std::path::PathBuf;

use thiserror::Error;

use tinygen_core::RepositoryReference;

/// All errors that can arise from acquiring or reading a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Clone/update failed, or the local snapshot area could not be prepared.
    #[error("failed to acquire repository {reference}: {message}")]
    Acquisition {
        reference: RepositoryReference,
        message: String,
    },

    /// An explicitly requested path is not a file inside the snapshot.
    #[error("file {path} does not exist in the repository")]
    MissingFile { path: String },

    /// I/O failure while traversing or reading, with the offending path.
    #[error("could not read file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure reported by a [`crate::RepositoryHost`].
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HostError(pub String);

pub(crate) fn acquisition_err(
    reference: &RepositoryReference,
    message: impl std::fmt::Display,
) -> SnapshotError {
    SnapshotError::Acquisition {
        reference: reference.clone(),
        message: message.to_string(),
    }
}

pub(crate) fn read_err(path: impl Into<PathBuf>, source: std::io::Error) -> SnapshotError {
    SnapshotError::Read {
        path: path.into().to_string_lossy().replace('\\', "/"),
        source,
    }
}
