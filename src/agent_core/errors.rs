//! Agent Core error types.

use thiserror::Error;

use crate::inference::InferenceError;

/// Errors that can occur during agent core operations.
///
/// Bad model output and failing tools never show up here; those are
/// recovered inside the conversation. What remains is programmer error
/// (unknown tool, bad descriptor) and endpoint failure.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No tool registered under this name.
    #[error("tool not found: '{name}'")]
    ToolNotFound { name: String },

    /// A tool descriptor failed validation at build time.
    #[error("invalid descriptor for tool '{tool}': {reason}")]
    InvalidDescriptor { tool: String, reason: String },

    /// The inference endpoint failed; fatal for the current run.
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// Serialization error.
    #[error("serialization error: {reason}")]
    SerializationError { reason: String },
}

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        AgentError::SerializationError {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_error_is_transparent() {
        let err: AgentError = InferenceError::HttpError {
            status: 503,
            body: "loading model".into(),
        }
        .into();
        assert_eq!(err.to_string(), "HTTP 503: loading model");
    }

    #[test]
    fn test_tool_not_found_message() {
        let err = AgentError::ToolNotFound {
            name: "get_stock_price".into(),
        };
        assert_eq!(err.to_string(), "tool not found: 'get_stock_price'");
    }
}
