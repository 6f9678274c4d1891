//! Shared types across the agent core: tool descriptors, invocation requests,
//! and the argument view handed to tool implementations.

use std::collections::HashSet;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use super::errors::AgentError;

/// Description used when a tool author supplies none.
pub const NO_DESCRIPTION: &str = "No description found.";

// ─── Parameter Types ────────────────────────────────────────────────────────

/// JSON-ish type of a tool parameter, as advertised to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamType {
    /// Map a declared type annotation to a parameter type.
    ///
    /// Understands both Rust and Python spellings. Anything unrecognized,
    /// including an empty annotation, is a string.
    pub fn from_annotation(annotation: &str) -> Self {
        match annotation.trim() {
            "int" | "integer" | "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16"
            | "u32" | "u64" | "usize" => ParamType::Integer,
            "float" | "number" | "f32" | "f64" => ParamType::Number,
            "bool" | "boolean" => ParamType::Boolean,
            _ => ParamType::String,
        }
    }
}

/// One parameter of a tool, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub description: String,
    /// Value bound when the model omits the parameter. `None` means required.
    #[serde(skip)]
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

// ─── ToolDescriptor ─────────────────────────────────────────────────────────

/// Name, description and ordered parameters of a tool.
///
/// Serializes with the key order the system prompt uses:
/// `tool_name`, `description`, `parameters`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    #[serde(rename = "tool_name")]
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
}

impl ToolDescriptor {
    /// Start building a descriptor for the tool `name`.
    pub fn builder(name: impl Into<String>) -> ToolDescriptorBuilder {
        ToolDescriptorBuilder {
            name: name.into(),
            description: None,
            parameters: Vec::new(),
        }
    }

    /// Derive a descriptor from a Google-style docstring plus the declared
    /// parameter list `(name, type annotation, default)`.
    ///
    /// The first paragraph of `doc` becomes the description. An `Args:`
    /// section supplies per-parameter text through `name (type): text` lines.
    /// Best effort: anything that doesn't match falls back to
    /// [`NO_DESCRIPTION`] or an empty parameter description.
    pub fn from_docstring(
        name: impl Into<String>,
        doc: &str,
        params: &[(&str, &str, Option<Value>)],
    ) -> Self {
        let doc = dedent(doc);
        let description = first_paragraph(&doc).unwrap_or_else(|| NO_DESCRIPTION.to_string());
        let args_section = args_section(&doc);

        let parameters = params
            .iter()
            .map(|(param_name, annotation, default)| ParamSpec {
                name: param_name.to_string(),
                param_type: ParamType::from_annotation(annotation),
                description: args_section
                    .and_then(|section| arg_description(section, param_name))
                    .unwrap_or_default(),
                default: default.clone(),
            })
            .collect();

        Self {
            name: name.into(),
            description,
            parameters,
        }
    }

    /// Look up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Builder for [`ToolDescriptor`].
#[derive(Debug, Clone)]
pub struct ToolDescriptorBuilder {
    name: String,
    description: Option<String>,
    parameters: Vec<ParamSpec>,
}

impl ToolDescriptorBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a required parameter.
    pub fn param(
        mut self,
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.parameters.push(ParamSpec {
            name: name.into(),
            param_type,
            description: description.into(),
            default: None,
        });
        self
    }

    /// Add a parameter that takes `default` when the model omits it.
    pub fn optional_param(
        mut self,
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
        default: impl Into<Value>,
    ) -> Self {
        self.parameters.push(ParamSpec {
            name: name.into(),
            param_type,
            description: description.into(),
            default: Some(default.into()),
        });
        self
    }

    /// Validate and build. Rejects empty tool names and duplicate parameters.
    pub fn build(self) -> Result<ToolDescriptor, AgentError> {
        if self.name.trim().is_empty() {
            return Err(AgentError::InvalidDescriptor {
                tool: self.name,
                reason: "tool name is empty".into(),
            });
        }

        let mut seen = HashSet::new();
        for param in &self.parameters {
            if param.name.trim().is_empty() {
                return Err(AgentError::InvalidDescriptor {
                    tool: self.name.clone(),
                    reason: "parameter name is empty".into(),
                });
            }
            if !seen.insert(param.name.as_str()) {
                return Err(AgentError::InvalidDescriptor {
                    tool: self.name.clone(),
                    reason: format!("duplicate parameter '{}'", param.name),
                });
            }
        }

        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| NO_DESCRIPTION.to_string());

        Ok(ToolDescriptor {
            name: self.name,
            description,
            parameters: self.parameters,
        })
    }
}

// ─── Docstring Heuristics ───────────────────────────────────────────────────

/// Strip leading whitespace per line; whitespace-only lines become empty.
fn dedent(doc: &str) -> String {
    doc.lines()
        .map(str::trim_start)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn first_paragraph(doc: &str) -> Option<String> {
    let paragraph = doc.split("\n\n").next()?.trim();
    (!paragraph.is_empty()).then(|| paragraph.to_string())
}

/// Everything after the first `Args:` marker.
fn args_section(doc: &str) -> Option<&str> {
    doc.find("Args:").map(|idx| &doc[idx + "Args:".len()..])
}

fn arg_description(section: &str, param_name: &str) -> Option<String> {
    let pattern = format!(r"(?m)^\s*{}\s*\(.*?\):\s*(.*)", regex::escape(param_name));
    let re = Regex::new(&pattern).ok()?;
    re.captures(section)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

// ─── Invocation ─────────────────────────────────────────────────────────────

/// A tool call the model asked for. Lives only inside one conversation run.
///
/// `parameters` is kept exactly as the model sent it (normally an object);
/// the registry rejects other shapes when binding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInvocationRequest {
    pub tool_name: String,
    pub parameters: Value,
}

/// Bound arguments handed to a tool implementation.
///
/// By the time a handler sees this, omitted optional parameters already
/// carry their defaults and unknown names have been rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments {
    values: Map<String, Value>,
}

impl ToolArguments {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Raw JSON value of an argument.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> anyhow::Result<&str> {
        match self.require(name)? {
            Value::String(s) => Ok(s),
            other => anyhow::bail!("argument '{name}' must be a string, got {other}"),
        }
    }

    /// Integer argument. Numeric strings are accepted, since small local
    /// models often quote every value.
    pub fn i64(&self, name: &str) -> anyhow::Result<i64> {
        match self.require(name)? {
            Value::Number(n) => n
                .as_i64()
                .ok_or_else(|| anyhow::anyhow!("argument '{name}' must be an integer, got {n}")),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("argument '{name}' must be an integer, got \"{s}\"")),
            other => anyhow::bail!("argument '{name}' must be an integer, got {other}"),
        }
    }

    pub fn f64(&self, name: &str) -> anyhow::Result<f64> {
        match self.require(name)? {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| anyhow::anyhow!("argument '{name}' must be a number, got {n}")),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("argument '{name}' must be a number, got \"{s}\"")),
            other => anyhow::bail!("argument '{name}' must be a number, got {other}"),
        }
    }

    pub fn bool(&self, name: &str) -> anyhow::Result<bool> {
        match self.require(name)? {
            Value::Bool(b) => Ok(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            other => anyhow::bail!("argument '{name}' must be a boolean, got {other}"),
        }
    }

    fn require(&self, name: &str) -> anyhow::Result<&Value> {
        self.values
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("missing argument '{name}'"))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WEATHER_DOC: &str = "
        Get the current weather for a given city.

        Args:
            city (str): The name of the city.
            unit (str): The temperature unit, 'celsius' or 'fahrenheit'.
    ";

    #[test]
    fn test_from_annotation() {
        assert_eq!(ParamType::from_annotation("int"), ParamType::Integer);
        assert_eq!(ParamType::from_annotation("u32"), ParamType::Integer);
        assert_eq!(ParamType::from_annotation("float"), ParamType::Number);
        assert_eq!(ParamType::from_annotation("f64"), ParamType::Number);
        assert_eq!(ParamType::from_annotation("bool"), ParamType::Boolean);
        assert_eq!(ParamType::from_annotation("str"), ParamType::String);
        assert_eq!(ParamType::from_annotation(""), ParamType::String);
        assert_eq!(ParamType::from_annotation("list[str]"), ParamType::String);
    }

    #[test]
    fn test_from_docstring_weather() {
        let desc = ToolDescriptor::from_docstring(
            "get_weather",
            WEATHER_DOC,
            &[("city", "str", None), ("unit", "str", Some(json!("celsius")))],
        );
        assert_eq!(desc.description, "Get the current weather for a given city.");
        assert_eq!(desc.parameters.len(), 2);
        assert_eq!(desc.parameters[0].description, "The name of the city.");
        assert!(desc.parameters[0].is_required());
        assert_eq!(
            desc.parameters[1].description,
            "The temperature unit, 'celsius' or 'fahrenheit'."
        );
        assert_eq!(desc.parameters[1].default, Some(json!("celsius")));
    }

    #[test]
    fn test_from_docstring_without_doc() {
        let desc = ToolDescriptor::from_docstring("noop", "", &[("x", "int", None)]);
        assert_eq!(desc.description, NO_DESCRIPTION);
        assert_eq!(desc.parameters[0].description, "");
        assert_eq!(desc.parameters[0].param_type, ParamType::Integer);
    }

    #[test]
    fn test_from_docstring_without_args_section() {
        let desc = ToolDescriptor::from_docstring(
            "solve",
            "Runs code.\nMore detail on the second line.",
            &[("python_code", "str", None)],
        );
        assert_eq!(desc.description, "Runs code.\nMore detail on the second line.");
        assert_eq!(desc.parameters[0].description, "");
    }

    #[test]
    fn test_from_docstring_param_name_is_not_a_regex() {
        let doc = "Does things.\n\nArgs:\n    a.b (str): dotted\n    axb (str): plain";
        let desc = ToolDescriptor::from_docstring("t", doc, &[("a.b", "str", None)]);
        assert_eq!(desc.parameters[0].description, "dotted");
    }

    #[test]
    fn test_builder_defaults_description() {
        let desc = ToolDescriptor::builder("ping").build().unwrap();
        assert_eq!(desc.description, NO_DESCRIPTION);
        assert!(desc.parameters.is_empty());
    }

    #[test]
    fn test_builder_rejects_duplicate_params() {
        let err = ToolDescriptor::builder("t")
            .param("x", ParamType::String, "")
            .param("x", ParamType::Integer, "")
            .build()
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidDescriptor { .. }));
        assert!(err.to_string().contains("duplicate parameter 'x'"));
    }

    #[test]
    fn test_builder_rejects_empty_name() {
        assert!(ToolDescriptor::builder("  ").build().is_err());
    }

    #[test]
    fn test_descriptor_serialization_key_order() {
        let desc = ToolDescriptor::builder("get_weather")
            .description("Weather.")
            .optional_param("unit", ParamType::String, "Unit.", "celsius")
            .build()
            .unwrap();
        let json = serde_json::to_string(&desc).unwrap();
        assert_eq!(
            json,
            r#"{"tool_name":"get_weather","description":"Weather.","parameters":[{"name":"unit","type":"string","description":"Unit."}]}"#
        );
    }

    #[test]
    fn test_tool_arguments_accessors() {
        let args = ToolArguments::new(
            json!({"city": "Tokyo", "days": "3", "ratio": 0.5, "metric": true})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(args.str("city").unwrap(), "Tokyo");
        assert_eq!(args.i64("days").unwrap(), 3);
        assert_eq!(args.f64("ratio").unwrap(), 0.5);
        assert!(args.bool("metric").unwrap());
        assert!(args.str("days").is_ok());
        assert!(args.i64("city").is_err());
        let missing = args.str("country").unwrap_err();
        assert_eq!(missing.to_string(), "missing argument 'country'");
    }
}
