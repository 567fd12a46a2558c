//! # tinygen-snapshot
//!
//! Local, read-only copies of remote repositories.
//!
//! [`RepositorySnapshot::acquire`] clones or updates the copy for a
//! [`tinygen_core::RepositoryReference`] through a [`RepositoryHost`] and
//! returns a [`SnapshotHandle`] that holds the per-repository lock;
//! [`RepositorySnapshot::read`] turns it into a [`tinygen_core::FileSet`].

pub mod error;
pub mod host;
pub mod policy;
pub mod snapshot;

pub use error::{HostError, SnapshotError};
pub use host::{GitCli, RepositoryHost};
pub use policy::SnapshotPolicy;
pub use snapshot::{RepositorySnapshot, SnapshotHandle};
