//! Tool call detection — finds a JSON tool request in free model text.
//!
//! Two pure steps, kept separate so each can be tested on its own:
//!
//! 1. [`extract_tool_call_json`] — best-effort location of a raw JSON span:
//!    - the first fenced code block (tagged `json` or untagged) whose body
//!      is a `{...}` object, matched non-greedily;
//!    - otherwise the whole reply, if it starts with `{` once trimmed.
//!
//! 2. [`decode_tool_call`] — strict decode of that span into a tagged
//!    [`ToolCallDetection`].
//!
//! Whether the named tool actually exists is the orchestrator's call.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::types::ToolInvocationRequest;

/// Outcome of scanning one assistant reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallDetection {
    /// A well-formed `{tool_name, parameters}` object.
    Call(ToolInvocationRequest),
    /// Nothing that looks like a tool call; the text is a direct answer.
    NoCall,
    /// Something JSON-shaped was found but could not be used.
    Malformed { raw: String, reason: String },
}

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fenced block regex is valid")
    })
}

/// Locate the raw JSON span of a tool call, if any.
pub fn extract_tool_call_json(text: &str) -> Option<&str> {
    if let Some(caps) = fenced_block_re().captures(text) {
        return caps.get(1).map(|m| m.as_str());
    }

    let trimmed = text.trim();
    trimmed.starts_with('{').then_some(trimmed)
}

/// Decode a raw JSON span into a tool call.
///
/// - invalid JSON → `Malformed`
/// - valid JSON that isn't an object with a string `tool_name` → `NoCall`
/// - missing or `null` `parameters` → empty parameter map
/// - any other `parameters` value is kept as sent; binding rejects
///   non-objects later, with an error the model gets to see
pub fn decode_tool_call(raw: &str) -> ToolCallDetection {
    let value: Value = match serde_json::from_str(raw.trim()) {
        Ok(v) => v,
        Err(e) => {
            return ToolCallDetection::Malformed {
                raw: raw.to_string(),
                reason: format!("invalid JSON: {e}"),
            }
        }
    };

    let Value::Object(mut obj) = value else {
        return ToolCallDetection::NoCall;
    };

    let tool_name = match obj.remove("tool_name") {
        Some(Value::String(name)) => name,
        _ => return ToolCallDetection::NoCall,
    };

    let parameters = match obj.remove("parameters") {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(value) => value,
    };

    ToolCallDetection::Call(ToolInvocationRequest {
        tool_name,
        parameters,
    })
}

/// Extract and decode in one go.
pub fn detect_tool_call(text: &str) -> ToolCallDetection {
    match extract_tool_call_json(text) {
        Some(raw) => decode_tool_call(raw),
        None => ToolCallDetection::NoCall,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_fenced_json_block() {
        let text = "```json\n{\"tool_name\":\"x\",\"parameters\":{}}\n```";
        assert_eq!(
            extract_tool_call_json(text),
            Some(r#"{"tool_name":"x","parameters":{}}"#)
        );
    }

    #[test]
    fn test_extract_untagged_fence_with_surrounding_prose() {
        let text = "Sure, let me check.\n```\n{\"tool_name\": \"get_weather\", \"parameters\": {\"city\": \"Tokyo\"}}\n```\nOne moment.";
        assert_eq!(
            extract_tool_call_json(text),
            Some(r#"{"tool_name": "get_weather", "parameters": {"city": "Tokyo"}}"#)
        );
    }

    #[test]
    fn test_extract_first_fenced_block_only() {
        let text = "```json\n{\"tool_name\":\"a\"}\n```\nthen\n```json\n{\"tool_name\":\"b\"}\n```";
        assert_eq!(extract_tool_call_json(text), Some(r#"{"tool_name":"a"}"#));
    }

    #[test]
    fn test_extract_bare_object() {
        let text = "  \n{\"tool_name\": \"get_weather\", \"parameters\": {}}\n";
        assert_eq!(
            extract_tool_call_json(text),
            Some(r#"{"tool_name": "get_weather", "parameters": {}}"#)
        );
    }

    #[test]
    fn test_extract_plain_text_is_none() {
        assert_eq!(extract_tool_call_json("The answer is 4."), None);
    }

    #[test]
    fn test_extract_fenced_non_object_falls_through() {
        // A fenced Python block is not a tool call and the text doesn't start with `{`.
        let text = "```python\nprint({1: 2})\n```";
        assert_eq!(extract_tool_call_json(text), None);
    }

    #[test]
    fn test_decode_full_call() {
        let detection = decode_tool_call(r#"{"tool_name":"get_weather","parameters":{"city":"Tokyo","unit":"celsius"}}"#);
        let ToolCallDetection::Call(call) = detection else {
            panic!("expected a call");
        };
        assert_eq!(call.tool_name, "get_weather");
        assert_eq!(call.parameters, json!({"city": "Tokyo", "unit": "celsius"}));
    }

    #[test]
    fn test_decode_missing_parameters_is_empty() {
        let detection = decode_tool_call(r#"{"tool_name":"ping"}"#);
        assert_eq!(
            detection,
            ToolCallDetection::Call(ToolInvocationRequest {
                tool_name: "ping".into(),
                parameters: json!({}),
            })
        );
    }

    #[test]
    fn test_decode_null_parameters_is_empty() {
        let ToolCallDetection::Call(call) = decode_tool_call(r#"{"tool_name":"ping","parameters":null}"#) else {
            panic!("expected a call");
        };
        assert_eq!(call.parameters, json!({}));
    }

    #[test]
    fn test_decode_invalid_json_is_malformed() {
        let detection = decode_tool_call(r#"{"tool_name": "get_weather", "parameters": {"city": }"#);
        assert!(matches!(
            detection,
            ToolCallDetection::Malformed { ref reason, .. } if reason.starts_with("invalid JSON")
        ));
    }

    #[test]
    fn test_decode_non_object_parameters_is_kept() {
        let detection = decode_tool_call(r#"{"tool_name": "get_weather", "parameters": ["Tokyo"]}"#);
        let ToolCallDetection::Call(call) = detection else {
            panic!("expected a call");
        };
        assert_eq!(call.tool_name, "get_weather");
        assert_eq!(call.parameters, json!(["Tokyo"]));
    }

    #[test]
    fn test_decode_object_without_tool_name_is_no_call() {
        assert_eq!(decode_tool_call(r#"{"city": "Tokyo"}"#), ToolCallDetection::NoCall);
        assert_eq!(decode_tool_call(r#"{"tool_name": 7}"#), ToolCallDetection::NoCall);
    }

    #[test]
    fn test_decode_array_is_no_call() {
        assert_eq!(decode_tool_call("[1, 2, 3]"), ToolCallDetection::NoCall);
    }

    #[test]
    fn test_detect_plain_text() {
        assert_eq!(detect_tool_call("The answer is 4."), ToolCallDetection::NoCall);
    }

    #[test]
    fn test_detect_text_starting_with_brace_but_not_json() {
        let detection = detect_tool_call("{curly} braces are fun");
        assert!(matches!(detection, ToolCallDetection::Malformed { .. }));
    }

    #[test]
    fn test_detect_nested_parameters_in_fence() {
        let text = "```json\n{\"tool_name\": \"search\", \"parameters\": {\"filter\": {\"year\": 2024}}}\n```";
        let ToolCallDetection::Call(call) = detect_tool_call(text) else {
            panic!("expected a call");
        };
        assert_eq!(call.parameters["filter"], json!({"year": 2024}));
    }
}
