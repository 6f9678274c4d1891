//! Inference Client — OpenAI-compatible API client for local LLM inference.
//!
//! This module handles all communication with the local model endpoint:
//! - Non-streaming chat completions against `/chat/completions`
//! - Endpoint health checks and model listing via `/models`
//! - Model configuration loading from `_models/config.yaml`
//!
//! The orchestrator only sees the [`ChatEndpoint`] trait, so tests and
//! alternative backends plug in without touching the conversation logic.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod errors;
pub mod types;

// Re-exports for convenience
pub use client::InferenceClient;
pub use config::{ModelConfig, ModelsConfig, OrchestratorConfig};
pub use endpoint::ChatEndpoint;
pub use errors::InferenceError;
pub use types::{ChatMessage, Role};
