//! OpenAI-compatible inference client.
//!
//! Sends non-streaming chat completion requests to a local LLM endpoint
//! (LM Studio, Ollama, llama.cpp server). One request per call, no retries:
//! a failed request surfaces to the caller as-is.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::config::{resolve_active_model, ModelConfig, ModelsConfig};
use super::endpoint::ChatEndpoint;
use super::errors::InferenceError;
use super::types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ModelList, Role};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ─── InferenceClient ─────────────────────────────────────────────────────────

/// Client for the local LLM inference endpoint.
///
/// Built from `ModelsConfig` and pinned to the active model for its lifetime.
pub struct InferenceClient {
    http: HttpClient,
    /// The model key (e.g., "lmstudio").
    model_key: String,
    model: ModelConfig,
}

impl InferenceClient {
    /// Create a new inference client from the models configuration.
    ///
    /// Resolves the active model from config. Does NOT check connectivity —
    /// that happens on the first request.
    pub fn from_config(config: &ModelsConfig) -> Result<Self, InferenceError> {
        let (key, model) = resolve_active_model(config)?;

        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(model.request_timeout_secs))
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: model.base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            model_key: key,
            model,
        })
    }

    /// The base URL of the model endpoint.
    pub fn base_url(&self) -> &str {
        &self.model.base_url
    }

    /// Human-readable name of the configured model.
    pub fn model_display_name(&self) -> &str {
        &self.model.display_name
    }

    /// The value sent in the request's `model` field.
    pub fn request_model_name(&self) -> &str {
        self.model.model_name.as_deref().unwrap_or(&self.model_key)
    }

    fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{path}", self.model.base_url.trim_end_matches('/'))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.model.api_key.as_deref() {
            Some(key) if !key.is_empty() => request.bearer_auth(key),
            _ => request,
        }
    }

    fn map_send_error(&self, url: &str, e: reqwest::Error) -> InferenceError {
        if e.is_timeout() {
            InferenceError::Timeout {
                duration_secs: self.model.request_timeout_secs,
            }
        } else {
            InferenceError::ConnectionFailed {
                endpoint: url.to_string(),
                reason: e.to_string(),
            }
        }
    }

    // ─── Chat Completion ─────────────────────────────────────────────────

    /// Send a non-streaming chat completion request.
    pub async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<ChatMessage, InferenceError> {
        let url = self.endpoint_url("chat/completions");

        let body = ChatCompletionRequest {
            model: self.request_model_name().to_string(),
            messages: messages.to_vec(),
            temperature,
            max_tokens: self.model.max_tokens,
            stream: false,
        };

        // Metadata only, the body repeats the whole tool schema every turn
        tracing::debug!(
            url = %url,
            model = %body.model,
            message_count = body.messages.len(),
            temperature,
            "sending chat completion request"
        );

        let response = self
            .authorized(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let body_text = response.text().await.map_err(|e| InferenceError::ResponseError {
            reason: format!("failed to read response body: {e}"),
        })?;

        parse_completion_response(&body_text)
    }

    // ─── Health Check ────────────────────────────────────────────────────

    /// Check if the endpoint is reachable. Does not consume inference tokens.
    pub async fn health_check(&self) -> bool {
        let url = self.endpoint_url("models");
        match self
            .authorized(self.http.get(&url))
            .timeout(CONNECT_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "health check failed");
                false
            }
        }
    }

    /// List the model ids the server currently exposes.
    pub async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        let url = self.endpoint_url("models");
        let response = self
            .authorized(self.http.get(&url))
            .send()
            .await
            .map_err(|e| self.map_send_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let list: ModelList = response.json().await.map_err(|e| InferenceError::ResponseError {
            reason: format!("failed to parse model list: {e}"),
        })?;

        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}

#[async_trait]
impl ChatEndpoint for InferenceClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<ChatMessage, InferenceError> {
        self.chat_completion(messages, temperature).await
    }
}

/// Parse a non-streaming completion body into the assistant message.
///
/// `null` content (e.g. a reasoning model that spent its whole budget
/// thinking) becomes an empty string; the orchestrator treats that as a
/// direct, empty answer.
pub fn parse_completion_response(body: &str) -> Result<ChatMessage, InferenceError> {
    let resp: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::ResponseError {
            reason: format!("failed to parse completion response: {e}"),
        })?;

    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or(InferenceError::ResponseError {
            reason: "empty choices array".into(),
        })?;

    if choice.message.content.is_none() {
        tracing::warn!(
            finish_reason = ?choice.finish_reason,
            "completion returned no content"
        );
    }

    Ok(ChatMessage {
        role: Role::Assistant,
        content: choice.message.content.unwrap_or_default(),
        tool_call_id: None,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
