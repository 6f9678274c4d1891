//! The seam between the orchestrator and whatever answers chat requests.

use async_trait::async_trait;

use super::errors::InferenceError;
use super::types::ChatMessage;

/// A chat-completion endpoint: ordered messages in, one assistant message out.
///
/// No native tool-calling support is assumed. Implementations only need to
/// produce text, which keeps the orchestrator usable with any
/// text-completion server.
#[async_trait]
pub trait ChatEndpoint: Send + Sync {
    /// Send the full message sequence and return the assistant's reply.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<ChatMessage, InferenceError>;
}

