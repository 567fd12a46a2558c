//! Bounded conversation history and the session that exchanges turns.

use std::collections::VecDeque;

use tinygen_core::ConversationTurn;

use crate::backend::ChatBackend;
use crate::error::BackendError;

/// Fixed-capacity FIFO of turns. Pushing at capacity evicts the oldest turn first.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
}

impl ConversationHistory {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        while self.turns.len() >= self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    fn as_slice(&mut self) -> &[ConversationTurn] {
        self.turns.make_contiguous()
    }
}

/// One conversation with a backend. Not shared between pipeline runs.
pub struct ConversationSession<'a> {
    backend: &'a dyn ChatBackend,
    history: ConversationHistory,
}

impl<'a> ConversationSession<'a> {
    pub fn new(backend: &'a dyn ChatBackend, history_limit: usize) -> Self {
        Self {
            backend,
            history: ConversationHistory::new(history_limit),
        }
    }

    /// Append `text` as a user turn, send the whole history, record and return
    /// the reply. On failure the user turn stays in the history.
    pub fn send(&mut self, text: &str) -> Result<String, BackendError> {
        self.history.push(ConversationTurn::user(text));
        let reply = self.backend.complete(self.history.as_slice())?;
        self.history.push(ConversationTurn::assistant(reply.clone()));
        Ok(reply)
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }
}
