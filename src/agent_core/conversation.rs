//! Conversation — the append-only message log of one orchestrator run.
//!
//! Messages are only ever pushed; nothing is edited or removed. The whole
//! log is what gets sent to the endpoint on every exchange.

use crate::inference::types::ChatMessage;

/// Ordered, append-only sequence of chat messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message.
    pub fn push(&mut self, message: ChatMessage) {
        tracing::trace!(
            role = ?message.role,
            content_len = message.content.len(),
            position = self.messages.len(),
            "conversation append"
        );
        self.messages.push(message);
    }

    /// All messages, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent message.
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}
