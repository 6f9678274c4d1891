//! Conversation orchestrator: one user prompt, at most one tool call.
//!
//! 1. **Prompt** — system instructions embedding the tool schema, plus the
//!    user prompt, sent at the low tool-selection temperature.
//! 2. **Detect** — look for a JSON tool request in the reply. Malformed JSON
//!    and unknown tool names fall through to a direct answer.
//! 3. **Execute + follow up** — run the tool, append its output and ask the
//!    model for a final answer at the answer temperature.
//!
//! Endpoint failures end the run; nothing is retried.

use std::sync::Arc;

use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::agent_core::conversation::Conversation;
use crate::agent_core::errors::AgentError;
use crate::agent_core::tool_call_parser::{detect_tool_call, ToolCallDetection};
use crate::agent_core::tool_registry::{to_pretty_json, ToolRegistry};
use crate::agent_core::types::ToolInvocationRequest;
use crate::inference::config::OrchestratorConfig;
use crate::inference::endpoint::ChatEndpoint;
use crate::inference::types::ChatMessage;

// ─── Prompts ────────────────────────────────────────────────────────────────

/// User instruction appended after the tool result.
pub const FOLLOW_UP_INSTRUCTION: &str =
    "Based on the result from the tool, please formulate a final answer to the original user question.";

/// Build the phase-1 system prompt around a `describe()` schema.
pub fn build_system_prompt(tool_schema: &str) -> String {
    format!(
        "You are a helpful assistant with access to the following tools.\n\
         To use a tool, you must respond with a JSON object with two keys: \"tool_name\" and \"parameters\".\n\
         \n\
         Here are the available tools:\n\
         {tool_schema}\n\
         \n\
         If you decide to use a tool, your response MUST be only the JSON object.\n\
         If you don't need a tool, answer the user's question directly."
    )
}

// ─── Types ──────────────────────────────────────────────────────────────────

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationOutcome {
    /// The first reply was the answer; no tool ran.
    DirectAnswer { answer: String },
    /// A tool ran and the model answered from its output.
    ToolAssisted {
        tool_name: String,
        /// Parameters exactly as the model sent them.
        parameters: Value,
        /// Stringified tool result (or error string) as the model saw it.
        tool_output: String,
        answer: String,
    },
}

impl ConversationOutcome {
    /// The text to show the user.
    pub fn answer(&self) -> &str {
        match self {
            Self::DirectAnswer { answer } | Self::ToolAssisted { answer, .. } => answer,
        }
    }

    /// The tool that ran, if any.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::DirectAnswer { .. } => None,
            Self::ToolAssisted { tool_name, .. } => Some(tool_name),
        }
    }
}

/// Result of [`ConversationOrchestrator::run`].
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Correlates this run's log lines.
    pub run_id: Uuid,
    pub outcome: ConversationOutcome,
    /// Every message exchanged, including the final assistant reply.
    pub conversation: Conversation,
}

// ─── Orchestrator ───────────────────────────────────────────────────────────

/// Drives the prompt → detect → execute → follow-up exchange.
///
/// Holds no per-run state, so one instance can serve any number of runs.
pub struct ConversationOrchestrator {
    endpoint: Arc<dyn ChatEndpoint>,
    registry: Arc<ToolRegistry>,
    settings: OrchestratorConfig,
}

impl ConversationOrchestrator {
    /// Create an orchestrator with default temperatures (0.1 / 0.7).
    pub fn new(endpoint: Arc<dyn ChatEndpoint>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            endpoint,
            registry,
            settings: OrchestratorConfig::default(),
        }
    }

    pub fn with_settings(mut self, settings: OrchestratorConfig) -> Self {
        self.settings = settings;
        self
    }

    /// Run one conversation for `user_prompt`.
    pub async fn run(&self, user_prompt: &str) -> Result<RunOutput, AgentError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("conversation", run_id = %run_id);
        self.run_inner(run_id, user_prompt).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, user_prompt: &str) -> Result<RunOutput, AgentError> {
        let mut conversation = Conversation::new();
        conversation.push(ChatMessage::system(build_system_prompt(&self.registry.describe())));
        conversation.push(ChatMessage::user(user_prompt));

        tracing::info!(
            prompt_len = user_prompt.len(),
            tools = self.registry.len(),
            temperature = self.settings.tool_temperature,
            "conversation started"
        );

        let first = self
            .endpoint
            .complete(conversation.messages(), self.settings.tool_temperature)
            .await?;

        let Some(request) = self.accept_tool_call(&first.content) else {
            tracing::info!(answer_len = first.content.len(), "direct answer, no tool call");
            let answer = first.content.clone();
            conversation.push(first);
            return Ok(RunOutput {
                run_id,
                outcome: ConversationOutcome::DirectAnswer { answer },
                conversation,
            });
        };

        let tool_output = self
            .registry
            .invoke(&request.tool_name, &request.parameters)
            .await?;

        conversation.push(ChatMessage::assistant(to_pretty_json(&request)?));
        conversation.push(ChatMessage::tool_result(tool_output.clone(), None));
        conversation.push(ChatMessage::user(FOLLOW_UP_INSTRUCTION));

        let last = self
            .endpoint
            .complete(conversation.messages(), self.settings.answer_temperature)
            .await?;

        tracing::info!(
            tool = %request.tool_name,
            answer_len = last.content.len(),
            messages = conversation.len() + 1,
            "conversation finished with tool result"
        );

        let answer = last.content.clone();
        conversation.push(last);

        let ToolInvocationRequest {
            tool_name,
            parameters,
        } = request;
        Ok(RunOutput {
            run_id,
            outcome: ConversationOutcome::ToolAssisted {
                tool_name,
                parameters,
                tool_output,
                answer,
            },
            conversation,
        })
    }

    /// Detect a tool call in `content` and keep it only if the tool exists.
    fn accept_tool_call(&self, content: &str) -> Option<ToolInvocationRequest> {
        match detect_tool_call(content) {
            ToolCallDetection::Call(request) if self.registry.contains(&request.tool_name) => {
                tracing::info!(
                    tool = %request.tool_name,
                    params = %request.parameters,
                    "tool call detected"
                );
                Some(request)
            }
            ToolCallDetection::Call(request) => {
                tracing::warn!(
                    tool = %request.tool_name,
                    "model asked for an unknown tool, treating reply as a direct answer"
                );
                None
            }
            ToolCallDetection::Malformed { raw, reason } => {
                tracing::warn!(
                    reason = %reason,
                    raw_len = raw.len(),
                    "could not decode tool call JSON, treating reply as a direct answer"
                );
                tracing::debug!(raw = %raw, "malformed tool call");
                None
            }
            ToolCallDetection::NoCall => None,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
