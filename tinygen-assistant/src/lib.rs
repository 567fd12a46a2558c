//! # tinygen-assistant
//!
//! Conversation with the generative backend and the two-turn
//! propose/reflect protocol that turns a [`tinygen_core::FileSet`] and an
//! instruction into a change artifact.
//!
//! - [`backend`]: [`ChatBackend`] and the chat-completions client
//! - [`session`]: bounded [`ConversationHistory`] and [`ConversationSession`]
//! - [`synthesizer`]: [`ChangeSynthesizer`] and [`AcceptanceMatcher`]
//! - [`rewrite`]: rewritten-file answers converted into a unified diff

pub mod backend;
pub mod error;
pub mod rewrite;
pub mod session;
pub mod synthesizer;

pub use backend::{ChatBackend, OpenAiBackend};
pub use error::{BackendError, SynthesisError};
pub use session::{ConversationHistory, ConversationSession};
pub use synthesizer::{AcceptanceMatcher, ChangeSynthesizer, Decision};
