//! Tool calling for locally hosted, OpenAI-compatible chat models.
//!
//! The model is shown a JSON schema of the registered tools and asked to
//! reply with a bare `{"tool_name": ..., "parameters": ...}` object when it
//! wants one. No native function-calling support is needed on the server.
//!
//! - [`inference`]: endpoint client, wire types and model configuration
//! - [`agent_core`]: tool registry, tool-call detection and the conversation loop
//! - [`tools`]: the demo tools used by the binary
//! - [`logging`]: tracing subscriber setup

pub mod agent_core;
pub mod inference;
pub mod logging;
pub mod tools;
