//! tinygen core library: domain types, the query ledger and settings.
//!
//! - [`types`]: newtypes, [`FileSet`], conversation turns, the [`Query`] record
//! - [`ledger`]: [`QueryLedger`] and its file-backed / in-memory stores
//! - [`config`]: [`Settings`] loaded from `~/.tinygen/config.yaml` + environment
//! - [`error`]: [`LedgerError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod ledger;
pub mod types;

pub use config::Settings;
pub use error::{ConfigError, LedgerError};
pub use ledger::{FileLedger, MemoryLedger, QueryLedger};
pub use types::{
    AcceptanceMode, ArtifactFormat, ConversationTurn, FileSet, LedgerPolicy, Query, QueryId,
    RepoId, RepositoryReference, Role,
};
