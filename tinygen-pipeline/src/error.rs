//! Error types for tinygen-pipeline.

use thiserror::Error;

use tinygen_assistant::SynthesisError;
use tinygen_core::{ConfigError, LedgerError};
use tinygen_renderer::RenderError;
use tinygen_snapshot::SnapshotError;

/// A failed pipeline run, tagged with the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Only under [`tinygen_core::LedgerPolicy::Required`].
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("synthesis: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    /// User prompt templates failed to load.
    #[error("configuration: prompt templates: {0}")]
    Templates(#[from] RenderError),
}

impl PipelineError {
    /// `"ledger"`, `"snapshot"`, `"synthesis"` or `"config"`.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Ledger(_) => "ledger",
            PipelineError::Snapshot(_) => "snapshot",
            PipelineError::Synthesis(_) => "synthesis",
            PipelineError::Config(_) | PipelineError::Templates(_) => "config",
        }
    }
}
