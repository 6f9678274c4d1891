//! ToolRegistry — the tools a model may ask for, and how to run them.
//!
//! Provides:
//! - Registration of a descriptor together with its implementation
//! - Lookup by tool name
//! - Serialization of all descriptors into the system prompt format
//! - Invocation with named-argument binding and error capture
//!
//! The registry is populated once at startup and then shared read-only
//! (behind `Arc`) by every conversation.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::{Map, Value};

use super::errors::AgentError;
use super::types::{ToolArguments, ToolDescriptor};

// ─── Constants ──────────────────────────────────────────────────────────────

/// Sentinel `describe()` output for an empty registry.
pub const NO_TOOLS_AVAILABLE: &str = "No tools available.";

/// Prefix of every tool-failure string fed back to the model.
pub const TOOL_ERROR_PREFIX: &str = "Error executing tool:";

// ─── Types ──────────────────────────────────────────────────────────────────

/// Future returned by a tool implementation.
pub type ToolFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;

/// A tool implementation: bound named arguments in, a JSON value out.
///
/// String values reach the model verbatim; anything else is serialized.
pub type ToolHandler = Arc<dyn Fn(ToolArguments) -> ToolFuture + Send + Sync>;

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: ToolHandler,
}

// ─── ToolRegistry ───────────────────────────────────────────────────────────

/// Registered tools in registration order, indexed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    /// `tool_name → position in tools`.
    index: HashMap<String, usize>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tool_names())
            .finish()
    }
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its descriptor's name.
    ///
    /// Registering a name twice replaces the earlier entry but keeps its
    /// position in the schema.
    pub fn register<F, Fut>(&mut self, descriptor: ToolDescriptor, handler: F)
    where
        F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let name = descriptor.name.clone();
        let entry = RegisteredTool {
            descriptor,
            handler: Arc::new(move |args| -> ToolFuture { Box::pin(handler(args)) }),
        };

        match self.index.get(&name) {
            Some(&pos) => {
                tracing::warn!(tool = %name, "tool re-registered, replacing previous definition");
                self.tools[pos] = entry;
            }
            None => {
                self.index.insert(name.clone(), self.tools.len());
                self.tools.push(entry);
            }
        }
        tracing::debug!(tool = %name, total = self.tools.len(), "registered tool");
    }

    /// Register a tool under an explicit name, overriding the descriptor's.
    pub fn register_as<F, Fut>(
        &mut self,
        name: impl Into<String>,
        mut descriptor: ToolDescriptor,
        handler: F,
    ) where
        F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        descriptor.name = name.into();
        self.register(descriptor, handler);
    }

    /// Look up a tool's descriptor by name.
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.entry(name).map(|t| &t.descriptor)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Registered tool names, in registration order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.descriptor.name.as_str()).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn entry(&self, name: &str) -> Option<&RegisteredTool> {
        self.index.get(name).map(|&pos| &self.tools[pos])
    }

    // ─── Prompt Schema ──────────────────────────────────────────────────

    /// Serialize every descriptor for the system prompt.
    ///
    /// A pretty-printed (4-space) JSON array in registration order, or
    /// [`NO_TOOLS_AVAILABLE`] when nothing is registered. Deterministic:
    /// identical registries produce byte-identical output.
    pub fn describe(&self) -> String {
        if self.is_empty() {
            return NO_TOOLS_AVAILABLE.to_string();
        }

        let descriptors: Vec<&ToolDescriptor> = self.tools.iter().map(|t| &t.descriptor).collect();
        match to_pretty_json(&descriptors) {
            Ok(schema) => schema,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize tool schema");
                NO_TOOLS_AVAILABLE.to_string()
            }
        }
    }

    // ─── Invocation ─────────────────────────────────────────────────────

    /// Run the tool `name` with the model-supplied `parameters`.
    ///
    /// Fails only with [`AgentError::ToolNotFound`]. Binding problems, handler
    /// errors and handler panics all come back as `Ok` strings starting with
    /// [`TOOL_ERROR_PREFIX`], so the model can react to them.
    ///
    /// The handler runs on its own tokio task, which isolates panics from
    /// the conversation.
    pub async fn invoke(&self, name: &str, parameters: &Value) -> Result<String, AgentError> {
        let tool = self.entry(name).ok_or_else(|| AgentError::ToolNotFound {
            name: name.to_string(),
        })?;

        let start = Instant::now();
        let outcome = match bind_arguments(&tool.descriptor, parameters) {
            Ok(args) => run_handler(&tool.handler, args).await,
            Err(reason) => Err(reason),
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(output) => {
                tracing::info!(
                    tool = %name,
                    elapsed_ms,
                    output_len = output.len(),
                    "tool executed"
                );
                Ok(output)
            }
            Err(reason) => {
                tracing::warn!(tool = %name, elapsed_ms, reason = %reason, "tool failed");
                Ok(format!("{TOOL_ERROR_PREFIX} {reason}"))
            }
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Serialize with 4-space indentation, the layout used for every JSON
/// block shown to the model.
pub(crate) fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, AgentError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    String::from_utf8(buf).map_err(|e| AgentError::SerializationError {
        reason: e.to_string(),
    })
}

/// Bind model-supplied parameters to the declared ones, keyword-style.
///
/// `parameters` must be an object. Unknown names and missing required
/// parameters are errors; omitted optional parameters take their defaults.
fn bind_arguments(
    descriptor: &ToolDescriptor,
    parameters: &Value,
) -> Result<ToolArguments, String> {
    let Value::Object(parameters) = parameters else {
        return Err(format!(
            "{}() argument after ** must be a mapping, not {}",
            descriptor.name,
            python_type_name(parameters)
        ));
    };

    if let Some(unexpected) = parameters.keys().find(|k| descriptor.param(k).is_none()) {
        return Err(format!(
            "{}() got an unexpected argument '{unexpected}'",
            descriptor.name
        ));
    }

    let mut bound = Map::new();
    let mut missing = Vec::new();
    for spec in &descriptor.parameters {
        match parameters.get(&spec.name).or(spec.default.as_ref()) {
            Some(value) => {
                bound.insert(spec.name.clone(), value.clone());
            }
            None => missing.push(format!("'{}'", spec.name)),
        }
    }

    if !missing.is_empty() {
        return Err(format!(
            "{}() missing {} required argument{}: {}",
            descriptor.name,
            missing.len(),
            if missing.len() == 1 { "" } else { "s" },
            missing.join(", ")
        ));
    }

    Ok(ToolArguments::new(bound))
}

/// Run `handler` on its own task, mapping errors and panics to a reason.
async fn run_handler(handler: &ToolHandler, args: ToolArguments) -> Result<String, String> {
    let handler = Arc::clone(handler);
    match tokio::spawn(async move { handler(args).await }).await {
        Ok(Ok(value)) => Ok(stringify_output(value)),
        Ok(Err(e)) => Err(format!("{e:#}")),
        Err(join) if join.is_panic() => Err(panic_message(join.into_panic().as_ref())),
        Err(join) => Err(format!("tool task failed: {join}")),
    }
}

fn stringify_output(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("tool panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("tool panicked: {s}")
    } else {
        "tool panicked".to_string()
    }
}

/// Type names as the model would see them in a Python `TypeError`.
fn python_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_core::types::ParamType;
    use serde_json::json;

    async fn fake_weather(args: ToolArguments) -> anyhow::Result<Value> {
        Ok(json!({
            "city": args.str("city")?,
            "temperature": "25",
            "unit": args.str("unit")?,
        }))
    }

    fn weather_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        let descriptor = ToolDescriptor::builder("get_weather")
            .description("Get the current weather for a given city.")
            .param("city", ParamType::String, "The name of the city.")
            .optional_param(
                "unit",
                ParamType::String,
                "The temperature unit, 'celsius' or 'fahrenheit'.",
                "celsius",
            )
            .build()
            .unwrap();
        registry.register(descriptor, fake_weather);
        registry
    }

    fn bare(name: &str) -> ToolDescriptor {
        ToolDescriptor::builder(name).build().unwrap()
    }

    #[test]
    fn test_describe_empty_registry() {
        assert_eq!(ToolRegistry::new().describe(), NO_TOOLS_AVAILABLE);
    }

    #[test]
    fn test_describe_is_valid_json_with_one_entry_per_tool() {
        let mut registry = weather_registry();
        registry.register(bare("ping"), |_| async { anyhow::Ok(json!("pong")) });

        let schema: Value = serde_json::from_str(&registry.describe()).unwrap();
        let entries = schema.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        for entry in entries {
            let obj = entry.as_object().unwrap();
            assert_eq!(obj.len(), 3);
            assert!(obj.contains_key("tool_name"));
            assert!(obj.contains_key("description"));
            assert!(obj.contains_key("parameters"));
        }
        assert_eq!(entries[0]["tool_name"], "get_weather");
        assert_eq!(entries[0]["parameters"][1]["name"], "unit");
        assert_eq!(entries[1]["description"], "No description found.");
    }

    #[test]
    fn test_describe_layout_and_idempotence() {
        let registry = weather_registry();
        let first = registry.describe();
        assert_eq!(first, registry.describe());
        assert!(first.starts_with("[\n    {\n        \"tool_name\": \"get_weather\","));
    }

    #[tokio::test]
    async fn test_invoke_unknown_tool() {
        let registry = weather_registry();
        let err = registry.invoke("get_stock_price", &json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolNotFound { ref name } if name == "get_stock_price"));
    }

    #[tokio::test]
    async fn test_invoke_applies_default() {
        let registry = weather_registry();
        let out = registry.invoke("get_weather", &json!({"city": "Tokyo"})).await.unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, json!({"city": "Tokyo", "temperature": "25", "unit": "celsius"}));
    }

    #[tokio::test]
    async fn test_invoke_missing_required_argument() {
        let registry = weather_registry();
        let out = registry.invoke("get_weather", &json!({})).await.unwrap();
        assert_eq!(
            out,
            "Error executing tool: get_weather() missing 1 required argument: 'city'"
        );
    }

    #[tokio::test]
    async fn test_invoke_unexpected_argument() {
        let registry = weather_registry();
        let out = registry
            .invoke("get_weather", &json!({"city": "Tokyo", "country": "JP"}))
            .await
            .unwrap();
        assert!(out.starts_with(TOOL_ERROR_PREFIX));
        assert!(out.contains("unexpected argument 'country'"));
    }

    #[tokio::test]
    async fn test_invoke_non_object_parameters_returns_error_string() {
        let registry = weather_registry();
        let out = registry.invoke("get_weather", &json!(["Tokyo"])).await.unwrap();
        assert_eq!(
            out,
            "Error executing tool: get_weather() argument after ** must be a mapping, not list"
        );

        let out = registry.invoke("get_weather", &json!("Tokyo")).await.unwrap();
        assert!(out.ends_with("must be a mapping, not str"));
    }

    #[tokio::test]
    async fn test_invoke_failing_tool_returns_error_string() {
        let mut registry = ToolRegistry::new();
        registry.register(bare("explode"), |_| async {
            Err::<Value, _>(anyhow::anyhow!("disk on fire"))
        });
        let out = registry.invoke("explode", &json!({})).await.unwrap();
        assert_eq!(out, "Error executing tool: disk on fire");
    }

    #[tokio::test]
    async fn test_invoke_panicking_tool_returns_error_string() {
        let mut registry = ToolRegistry::new();
        registry.register(bare("panic"), |_| async {
            if true {
                panic!("index out of bounds");
            }
            anyhow::Ok(Value::Null)
        });
        let out = registry.invoke("panic", &json!({})).await.unwrap();
        assert_eq!(out, "Error executing tool: tool panicked: index out of bounds");
    }

    #[tokio::test]
    async fn test_invoke_string_output_is_not_quoted() {
        let mut registry = ToolRegistry::new();
        registry.register(bare("echo"), |_| async { anyhow::Ok(json!("plain text")) });
        registry.register(bare("answer"), |_| async { anyhow::Ok(json!(42)) });
        assert_eq!(registry.invoke("echo", &json!({})).await.unwrap(), "plain text");
        assert_eq!(registry.invoke("answer", &json!({})).await.unwrap(), "42");
    }

    #[tokio::test]
    async fn test_reregistration_replaces_in_place() {
        let mut registry = weather_registry();
        registry.register(bare("ping"), |_| async { anyhow::Ok(json!("pong")) });
        registry.register(
            ToolDescriptor::builder("get_weather")
                .description("Replaced.")
                .build()
                .unwrap(),
            |_| async { anyhow::Ok(json!("sunny")) },
        );

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.tool_names(), vec!["get_weather", "ping"]);
        assert_eq!(registry.get("get_weather").unwrap().description, "Replaced.");
        assert_eq!(registry.invoke("get_weather", &json!({})).await.unwrap(), "sunny");
    }

    #[test]
    fn test_register_as_overrides_name() {
        let mut registry = ToolRegistry::new();
        registry.register_as("weather", bare("get_weather"), |_| async {
            anyhow::Ok(json!("ok"))
        });
        assert!(registry.contains("weather"));
        assert!(!registry.contains("get_weather"));
    }
}
