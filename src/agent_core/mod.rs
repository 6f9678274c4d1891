//! Agent Core — tool registry and the conversation loop.
//!
//! Submodules:
//! - `types`: Tool descriptors, parameter specs and bound arguments
//! - `tool_registry`: Registration, schema output and invocation of tools
//! - `tool_call_parser`: Locates and decodes a JSON tool request in model text
//! - `conversation`: Append-only message log of a single run
//! - `orchestrator`: Prompt → detect → execute → follow-up exchange
//! - `errors`: Agent-level error types

pub mod conversation;
pub mod errors;
pub mod orchestrator;
pub mod tool_call_parser;
pub mod tool_registry;
pub mod types;

// Re-exports for convenience
pub use conversation::Conversation;
pub use errors::AgentError;
pub use orchestrator::{ConversationOrchestrator, ConversationOutcome, RunOutput};
pub use tool_call_parser::{detect_tool_call, ToolCallDetection};
pub use tool_registry::ToolRegistry;
pub use types::{ParamSpec, ParamType, ToolArguments, ToolDescriptor, ToolInvocationRequest};
