//! `get_weather` — canned weather lookups for the demo conversation.

use serde_json::{json, Value};

use crate::agent_core::tool_registry::ToolRegistry;
use crate::agent_core::types::{ToolArguments, ToolDescriptor};

pub const TOOL_NAME: &str = "get_weather";

const DOC: &str = "
    Get the current weather for a given city.

    Args:
        city (str): The name of the city.
        unit (str): The temperature unit, 'celsius' or 'fahrenheit'.
";

/// Descriptor derived from the tool's docstring.
pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor::from_docstring(
        TOOL_NAME,
        DOC,
        &[("city", "str", None), ("unit", "str", Some(json!("celsius")))],
    )
}

/// Register `get_weather` on `registry`.
pub fn register(registry: &mut ToolRegistry) {
    registry.register(descriptor(), get_weather);
}

async fn get_weather(args: ToolArguments) -> anyhow::Result<Value> {
    let city = args.str("city")?;
    let unit = args.str("unit")?;
    Ok(lookup(city, unit))
}

/// Mock data keyed on a case-insensitive substring of the city name.
fn lookup(city: &str, unit: &str) -> Value {
    let city = city.to_lowercase();
    let (name, temperature) = if city.contains("chicago") {
        ("Chicago", "12")
    } else if city.contains("tokyo") {
        ("Tokyo", "25")
    } else {
        return json!({"error": "City not found"});
    };
    json!({"city": name, "temperature": temperature, "unit": unit})
}
