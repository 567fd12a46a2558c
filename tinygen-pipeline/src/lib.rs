//! # tinygen-pipeline
//!
//! The end-to-end operation run once per request: snapshot the repository,
//! synthesize the change, and record the query in the ledger.
//!
//! Used by both the `tinygen generate` command and the daemon.

pub mod error;
pub mod pipeline;

pub use error::PipelineError;
pub use pipeline::{Pipeline, RunOutcome};
