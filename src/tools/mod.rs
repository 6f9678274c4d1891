//! Demo tools exposed by the command-line front end.
//!
//! - `weather`: `get_weather(city, unit = "celsius")`, canned data
//! - `math`: `solve_math_problem(python_code)`, runs a Python script

pub mod math;
pub mod weather;

use crate::agent_core::errors::AgentError;
use crate::agent_core::tool_registry::ToolRegistry;

/// A registry holding every demo tool, weather first.
pub fn demo_registry() -> Result<ToolRegistry, AgentError> {
    let mut registry = ToolRegistry::new();
    weather::register(&mut registry);
    math::register(&mut registry)?;
    Ok(registry)
}
