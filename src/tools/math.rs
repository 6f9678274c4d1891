//! `solve_math_problem` — runs model-written Python and returns what it prints.
//!
//! The code is written to a temporary `.py` file and executed by the first
//! interpreter found among [`PYTHON_CANDIDATES`], with a hard timeout.
//! A script that exits non-zero is not a tool failure: its output and
//! traceback go back to the model so it can correct itself.

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::Context;
use serde_json::Value;
use tokio::process::{Child, Command};

use crate::agent_core::errors::AgentError;
use crate::agent_core::tool_registry::ToolRegistry;
use crate::agent_core::types::{ParamType, ToolArguments, ToolDescriptor};

pub const TOOL_NAME: &str = "solve_math_problem";

/// Interpreters tried in order.
pub const PYTHON_CANDIDATES: [&str; 2] = ["python3", "python"];

/// Wall-clock limit for one script.
pub const EXECUTION_TIMEOUT: Duration = Duration::from_secs(10);

pub fn descriptor() -> Result<ToolDescriptor, AgentError> {
    ToolDescriptor::builder(TOOL_NAME)
        .description(
            "Executes a given string of Python code to solve a math problem and returns the output.\n\
             The code should be a complete, runnable script that prints the final result to standard output.",
        )
        .param(
            "python_code",
            ParamType::String,
            "A string containing the Python code to execute.",
        )
        .build()
}

/// Register `solve_math_problem` on `registry`.
pub fn register(registry: &mut ToolRegistry) -> Result<(), AgentError> {
    registry.register(descriptor()?, solve_math_problem);
    Ok(())
}

async fn solve_math_problem(args: ToolArguments) -> anyhow::Result<Value> {
    let code = args.str("python_code")?;
    run_python(code, EXECUTION_TIMEOUT).await.map(Value::String)
}

// ─── Execution ──────────────────────────────────────────────────────────────

/// Run `code` as a Python script.
///
/// Returns trimmed stdout on success, or the error report on a non-zero
/// exit. Fails only when no interpreter can be started or the timeout hits;
/// a timed-out interpreter is killed.
pub async fn run_python(code: &str, timeout: Duration) -> anyhow::Result<String> {
    let script = tempfile::Builder::new()
        .prefix("toolcall-")
        .suffix(".py")
        .tempfile()
        .context("failed to create script file")?;
    tokio::fs::write(script.path(), code)
        .await
        .context("failed to write script file")?;

    let (interpreter, child) = spawn_interpreter(script.path())?;
    tracing::debug!(interpreter, script = %script.path().display(), "running python");

    let start = Instant::now();
    // Dropping the wait future on timeout drops the child, which kills it.
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.with_context(|| format!("failed to wait for {interpreter}"))?,
        Err(_) => anyhow::bail!(
            "python script timed out after {} seconds",
            timeout.as_secs_f32()
        ),
    };
    tracing::debug!(
        interpreter,
        code = ?output.status.code(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "python finished"
    );

    let out = String::from_utf8_lossy(&output.stdout);
    let err = String::from_utf8_lossy(&output.stderr);

    if output.status.success() {
        Ok(out.trim().to_string())
    } else {
        Ok(format!(
            "Error executing the Python code:\nSTDOUT:\n{out}\nSTDERR:\n{err}"
        ))
    }
}

fn spawn_interpreter(script: &Path) -> anyhow::Result<(&'static str, Child)> {
    for candidate in PYTHON_CANDIDATES {
        let spawned = Command::new(candidate)
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        match spawned {
            Ok(child) => return Ok((candidate, child)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(candidate, "python interpreter not found, trying next");
            }
            Err(e) => return Err(e).with_context(|| format!("failed to start {candidate}")),
        }
    }
    anyhow::bail!("no python interpreter found (tried {})", PYTHON_CANDIDATES.join(", "))
}
