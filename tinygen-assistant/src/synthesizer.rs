//! Two-turn propose/reflect protocol.
//!
//! 1. The proposal prompt embeds every file and the instruction; the reply is R1.
//! 2. The reflection prompt asks the backend to confirm R1 with the format's
//!    sentinel or to replace it; the reply is R2.
//! 3. R1 is kept when R2 matches the sentinel, otherwise R2 is the artifact.
//!
//! Neither answer is validated. In `rewritten_files` mode the selected answer
//! is converted into a unified diff afterwards.

use std::sync::Arc;

use tinygen_core::{AcceptanceMode, ArtifactFormat, FileSet};
use tinygen_renderer::PromptRenderer;

use crate::backend::ChatBackend;
use crate::error::SynthesisError;
use crate::rewrite;
use crate::session::ConversationSession;

// ---------------------------------------------------------------------------
// AcceptanceMatcher
// ---------------------------------------------------------------------------

/// Outcome of the reflection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The backend confirmed its first answer.
    Accepted,
    /// The backend replaced its first answer.
    Revised,
}

/// Decides whether a reflection reply confirms the first answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptanceMatcher {
    mode: AcceptanceMode,
    format: ArtifactFormat,
}

impl AcceptanceMatcher {
    pub fn new(mode: AcceptanceMode, format: ArtifactFormat) -> Self {
        Self { mode, format }
    }

    pub fn decide(&self, reply: &str) -> Decision {
        let sentinel = self.format.sentinel();
        let folded = reply.trim().to_lowercase();
        let accepted = match self.mode {
            AcceptanceMode::Exact => folded == sentinel,
            AcceptanceMode::Lenient => {
                let bare = folded
                    .trim_end_matches(['.', '!'])
                    .trim_matches(['\'', '"', '`'])
                    .trim();
                bare == sentinel || bare == long_form(sentinel)
            }
        };
        if accepted {
            Decision::Accepted
        } else {
            Decision::Revised
        }
    }
}

fn long_form(sentinel: &str) -> &'static str {
    match sentinel {
        "y" => "yes",
        "n" => "no",
        _ => "",
    }
}

// ---------------------------------------------------------------------------
// ChangeSynthesizer
// ---------------------------------------------------------------------------

pub struct ChangeSynthesizer {
    backend: Arc<dyn ChatBackend>,
    renderer: PromptRenderer,
    history_limit: usize,
    format: ArtifactFormat,
    matcher: AcceptanceMatcher,
}

impl ChangeSynthesizer {
    /// Unified-diff output with the exact sentinel rule.
    pub fn new(backend: Arc<dyn ChatBackend>, renderer: PromptRenderer, history_limit: usize) -> Self {
        Self::with_options(
            backend,
            renderer,
            history_limit,
            ArtifactFormat::default(),
            AcceptanceMode::default(),
        )
    }

    pub fn with_options(
        backend: Arc<dyn ChatBackend>,
        renderer: PromptRenderer,
        history_limit: usize,
        format: ArtifactFormat,
        acceptance: AcceptanceMode,
    ) -> Self {
        Self {
            backend,
            renderer,
            history_limit,
            format,
            matcher: AcceptanceMatcher::new(acceptance, format),
        }
    }

    /// Produce the change artifact for `instruction` over `files`.
    ///
    /// Uses a fresh session per call. Fails only when a prompt cannot be
    /// rendered or the backend fails.
    pub fn synthesize(&self, files: &FileSet, instruction: &str) -> Result<String, SynthesisError> {
        let proposal = self.renderer.render_proposal(files, instruction, self.format)?;
        let reflection = self.renderer.render_reflection(self.format)?;

        let mut session = ConversationSession::new(self.backend.as_ref(), self.history_limit);
        let first = session.send(&proposal)?;
        tracing::debug!(answer = %first, "first answer");
        let second = session.send(&reflection)?;

        let decision = self.matcher.decide(&second);
        tracing::debug!(decision = ?decision, format = %self.format, "reflection decided");
        let selected = match decision {
            Decision::Accepted => first,
            Decision::Revised => second,
        };

        Ok(match self.format {
            ArtifactFormat::UnifiedDiff => selected,
            ArtifactFormat::RewrittenFiles => rewrite::to_unified_diff(files, &selected),
        })
    }
}
