//! Error types for tinygen-assistant.

use thiserror::Error;

use tinygen_renderer::RenderError;

/// Failure of one exchange with the generative backend. Never retried.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request never produced an HTTP response (DNS, connect, TLS, timeout).
    #[error("backend request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// Non-success HTTP status.
    #[error("backend returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// A success response carrying an error object instead of a completion.
    #[error("backend reported an error: {0}")]
    Reported(String),

    /// The response body was not a completion we understand.
    #[error("malformed backend response: {0}")]
    Malformed(String),
}

/// Failure of [`crate::ChangeSynthesizer::synthesize`].
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Only reachable through user-supplied prompt templates.
    #[error("prompt rendering failed: {0}")]
    Render(#[from] RenderError),
}
