//! Generative text backends.
//!
//! A backend is stateless: every call receives the full ordered history and
//! returns one reply. [`OpenAiBackend`] speaks the chat-completions wire
//! format over blocking HTTP.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use tinygen_core::config::BackendSettings;
use tinygen_core::ConversationTurn;

use crate::error::BackendError;

/// Longest backend error body quoted in an error message.
const MAX_ERROR_BODY: usize = 200;

pub trait ChatBackend: Send + Sync {
    /// Send the ordered turns and return the assistant's reply.
    fn complete(&self, turns: &[ConversationTurn]) -> Result<String, BackendError>;
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationTurn],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

/// Extract the reply text from a success body.
pub(crate) fn parse_completion(body: &str) -> Result<String, BackendError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| BackendError::Malformed(format!("{e}: {}", truncate(body))))?;
    if let Some(error) = response.error {
        return Err(BackendError::Reported(error.message));
    }
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| BackendError::Malformed("response has no choices".to_string()))?;
    match (message.content, message.refusal) {
        (Some(content), _) => Ok(content),
        (None, Some(refusal)) => Err(BackendError::Reported(format!("refused: {refusal}"))),
        (None, None) => Err(BackendError::Malformed("choice has no content".to_string())),
    }
}

/// Prefer the API's own error message over the raw body.
fn status_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| truncate(body).to_string())
}

fn truncate(s: &str) -> &str {
    match s.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ---------------------------------------------------------------------------
// OpenAiBackend
// ---------------------------------------------------------------------------

/// Chat-completions client (OpenAI or any compatible endpoint).
pub struct OpenAiBackend {
    agent: ureq::Agent,
    api_url: String,
    model: String,
    api_key: String,
}

impl OpenAiBackend {
    pub fn new(
        api_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            api_url: api_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_settings(settings: &BackendSettings, api_key: impl Into<String>) -> Self {
        Self::new(
            &settings.api_url,
            &settings.model,
            api_key,
            Duration::from_secs(settings.timeout_secs),
        )
    }
}

impl ChatBackend for OpenAiBackend {
    fn complete(&self, turns: &[ConversationTurn]) -> Result<String, BackendError> {
        let request = ChatRequest {
            model: &self.model,
            messages: turns,
        };
        tracing::debug!(model = %self.model, turns = turns.len(), "sending chat completion");

        let response = self
            .agent
            .post(&self.api_url)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(&request);

        match response {
            Ok(response) => {
                let body = response.into_string().map_err(|e| BackendError::Transport {
                    url: self.api_url.clone(),
                    message: format!("reading response body: {e}"),
                })?;
                parse_completion(&body)
            }
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                Err(BackendError::Status {
                    status,
                    message: status_message(&body),
                })
            }
            Err(ureq::Error::Transport(transport)) => Err(BackendError::Transport {
                url: self.api_url.clone(),
                message: transport.to_string(),
            }),
        }
    }
}
