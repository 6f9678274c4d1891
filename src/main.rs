use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand};

use local_toolcall::agent_core::{
    AgentError, ConversationOrchestrator, ConversationOutcome, RunOutput,
};
use local_toolcall::inference::config::load_or_default;
use local_toolcall::inference::{InferenceClient, InferenceError, ModelsConfig};
use local_toolcall::{logging, tools};

/// Prompts run by `demo`: a tool question, a plain question, a Python one.
const DEMO_PROMPTS: [&str; 3] = [
    "What's the weather like in Tokyo in celsius?",
    "What is the capital of France?",
    "Can you please calculate the area of a circle with a radius of 7.5 and also find the 20th number in the Fibonacci sequence? Please provide the Python code to do this.",
];

#[derive(Parser)]
#[command(name = "local-toolcall", version)]
#[command(about = "Tool calling against a local OpenAI-compatible model server")]
struct Cli {
    /// Models config file (default: search for _models/config.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the endpoint base URL, e.g. http://localhost:1234/v1
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    /// Override the model name sent with each request
    #[arg(long, global = true)]
    model: Option<String>,

    /// Print each stage of the conversation, not just the answer
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Debug logging on stderr
    #[arg(
        long,
        global = true,
        env = "LOCAL_TOOLCALL_DEBUG",
        value_parser = BoolishValueParser::new()
    )]
    debug: bool,

    /// Write logs as JSON lines to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask one question with the demo tools available
    Ask {
        /// The user prompt
        prompt: String,
    },
    /// Run the built-in demo questions
    Demo,
    /// Print the tool schema shown to the model
    Tools,
    /// Check that the model server is up and list its models
    Health,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init_tracing(cli.debug, cli.log_file.as_deref()) {
        eprintln!("[WARN] {e:#}");
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Tools => {
            println!("{}", tools::demo_registry()?.describe());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Health => health(&config).await,
        Commands::Ask { prompt } => {
            let orchestrator = build_orchestrator(&config)?;
            ask(&orchestrator, &prompt, cli.verbose).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Demo => {
            let orchestrator = build_orchestrator(&config)?;
            for (i, prompt) in DEMO_PROMPTS.iter().enumerate() {
                if i > 0 {
                    println!("\n{}\n", "=".repeat(50));
                }
                ask(&orchestrator, prompt, true).await?;
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ModelsConfig> {
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let mut config = load_or_default(cli.config.as_deref(), &cwd)?;
    config.apply_overrides(cli.base_url.as_deref(), cli.model.as_deref())?;
    Ok(config)
}

fn build_orchestrator(config: &ModelsConfig) -> anyhow::Result<ConversationOrchestrator> {
    let client = InferenceClient::from_config(config)?;
    tracing::info!(
        endpoint = %client.base_url(),
        model = %client.request_model_name(),
        "using model endpoint"
    );
    let registry = tools::demo_registry()?;
    Ok(ConversationOrchestrator::new(Arc::new(client), Arc::new(registry))
        .with_settings(config.orchestrator))
}

async fn ask(
    orchestrator: &ConversationOrchestrator,
    prompt: &str,
    verbose: bool,
) -> anyhow::Result<()> {
    if verbose {
        println!("--- User Question ---");
        println!("{prompt}");
    }

    let output = orchestrator.run(prompt).await?;

    if verbose {
        print_stages(&output);
    } else {
        println!("{}", output.outcome.answer());
    }
    Ok(())
}

fn print_stages(output: &RunOutput) {
    match &output.outcome {
        ConversationOutcome::ToolAssisted {
            tool_name,
            parameters,
            tool_output,
            answer,
        } => {
            println!("\n--- Tool Call Detected ---");
            println!("Tool: {tool_name}");
            println!("Parameters: {parameters}");
            println!("\n--- Tool Response ---");
            println!("{tool_output}");
            println!("\n--- Final Response from Model ---");
            println!("{answer}");
        }
        ConversationOutcome::DirectAnswer { answer } => {
            println!("\n--- Assistant Response (No Tool) ---");
            println!("{answer}");
        }
    }
}

async fn health(config: &ModelsConfig) -> anyhow::Result<ExitCode> {
    let client = InferenceClient::from_config(config)?;
    println!("Endpoint: {}", client.base_url());
    println!(
        "Model:    {} ({})",
        client.model_display_name(),
        client.request_model_name()
    );

    if !client.health_check().await {
        println!("Status:   unreachable");
        eprintln!("\nPlease ensure your model server is running at {}", client.base_url());
        return Ok(ExitCode::FAILURE);
    }
    println!("Status:   reachable");

    match client.list_models().await {
        Ok(models) if models.is_empty() => println!("No models loaded."),
        Ok(models) => {
            println!("Models:");
            for id in models {
                println!("  - {id}");
            }
        }
        Err(e) => tracing::warn!(error = %e, "could not list models"),
    }
    Ok(ExitCode::SUCCESS)
}

fn report_error(error: &anyhow::Error) {
    let inference = error.downcast_ref::<InferenceError>().or_else(|| {
        match error.downcast_ref::<AgentError>() {
            Some(AgentError::Inference(e)) => Some(e),
            _ => None,
        }
    });

    match inference {
        Some(InferenceError::HttpError { status, body }) => {
            eprintln!("\n[ERROR] HTTP Error: {status}");
            eprintln!("Response Body: {body}");
        }
        Some(e) => {
            eprintln!("\n[ERROR] {e}");
            if let Some(hint) = error_hint(e) {
                eprintln!("{hint}");
            }
        }
        None => eprintln!("\n[ERROR] {error:#}"),
    }
}

/// Follow-up advice for endpoint failures the user can act on.
fn error_hint(error: &InferenceError) -> Option<&'static str> {
    if error.is_unreachable() {
        return Some(
            "It's likely the model server is not running or no model is loaded.\n\
             Please ensure the server is active and a model is selected.",
        );
    }
    match error {
        InferenceError::Timeout { .. } => Some(
            "The server accepted the request but the model took too long to answer.\n\
             Try a smaller model, a shorter prompt, or raise request_timeout_secs in the models config.",
        ),
        _ => None,
    }
}
