//! # tinygen-renderer
//!
//! Tera templates for the prompts sent to the generative backend: one
//! proposal and one reflection prompt per [`tinygen_core::ArtifactFormat`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tinygen_core::{ArtifactFormat, FileSet};
//! use tinygen_renderer::PromptRenderer;
//!
//! fn proposal(files: &FileSet) -> Option<String> {
//!     let renderer = PromptRenderer::new().ok()?;
//!     renderer
//!         .render_proposal(files, "Add null check", ArtifactFormat::UnifiedDiff)
//!         .ok()
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::PromptContext;
pub use engine::{PromptKind, PromptRenderer};
pub use error::RenderError;
