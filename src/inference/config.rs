//! Model configuration loading and validation.
//!
//! Reads `_models/config.yaml` and resolves environment variables. When no
//! file exists the built-in LM Studio defaults apply, so the binary works
//! against a stock local server with zero setup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::errors::InferenceError;

// ─── Constants ───────────────────────────────────────────────────────────────

/// LM Studio's default OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:1234/v1";

/// Placeholder model name. LM Studio serves whichever model is loaded.
pub const DEFAULT_MODEL_NAME: &str = "local-model";

/// Local servers accept any bearer token; LM Studio's docs use this one.
pub const DEFAULT_API_KEY: &str = "lm-studio";

/// Key of the synthesized model entry used when no config file is found.
const DEFAULT_MODEL_KEY: &str = "lmstudio";

/// Config file location relative to a project root.
const CONFIG_RELATIVE_PATH: &str = "_models/config.yaml";

// ─── Public Types ────────────────────────────────────────────────────────────

/// A single model endpoint's configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub display_name: String,
    pub base_url: String,
    /// Name sent in the request's `model` field. Falls back to the config key.
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Sampling settings for the two exchanges of one conversation run.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct OrchestratorConfig {
    /// Temperature for the tool-selection turn (low: structured output).
    #[serde(default = "default_tool_temperature")]
    pub tool_temperature: f32,
    /// Temperature for the follow-up answer turn (higher: fluent prose).
    #[serde(default = "default_answer_temperature")]
    pub answer_temperature: f32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tool_temperature: default_tool_temperature(),
            answer_temperature: default_answer_temperature(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    60
}
fn default_tool_temperature() -> f32 {
    0.1
}
fn default_answer_temperature() -> f32 {
    0.7
}

/// Top-level model registry (mirrors `_models/config.yaml`).
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    pub active_model: String,
    pub models: HashMap<String, ModelConfig>,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        let mut models = HashMap::new();
        models.insert(
            DEFAULT_MODEL_KEY.to_string(),
            ModelConfig {
                display_name: "LM Studio (loaded model)".to_string(),
                base_url: DEFAULT_BASE_URL.to_string(),
                model_name: Some(DEFAULT_MODEL_NAME.to_string()),
                api_key: Some(DEFAULT_API_KEY.to_string()),
                max_tokens: None,
                request_timeout_secs: default_request_timeout_secs(),
            },
        );
        Self {
            active_model: DEFAULT_MODEL_KEY.to_string(),
            models,
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl ModelsConfig {
    /// Override the active model's endpoint and/or model name (CLI flags).
    pub fn apply_overrides(
        &mut self,
        base_url: Option<&str>,
        model_name: Option<&str>,
    ) -> Result<(), InferenceError> {
        let key = self.active_model.clone();
        let model = self
            .models
            .get_mut(&key)
            .ok_or_else(|| InferenceError::ConfigError {
                reason: format!("active model '{key}' not found in config"),
            })?;

        if let Some(url) = base_url {
            model.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(name) = model_name {
            model.model_name = Some(name.to_string());
        }
        Ok(())
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Locate the config file.
///
/// Order: `LOCAL_TOOLCALL_CONFIG` (explicit file), then
/// `LOCAL_TOOLCALL_PROJECT_ROOT/_models/config.yaml`, then a walk upward from
/// `start`. Returns `None` when nothing is found.
pub fn find_config_path(start: &Path) -> Option<PathBuf> {
    if let Ok(file) = std::env::var("LOCAL_TOOLCALL_CONFIG") {
        let candidate = PathBuf::from(expand_tilde(&file));
        if candidate.exists() {
            return Some(candidate);
        }
        tracing::warn!(path = %candidate.display(), "LOCAL_TOOLCALL_CONFIG points to a missing file");
    }

    if let Ok(root) = std::env::var("LOCAL_TOOLCALL_PROJECT_ROOT") {
        let candidate = PathBuf::from(&root).join(CONFIG_RELATIVE_PATH);
        if candidate.exists() {
            return Some(candidate);
        }
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_RELATIVE_PATH);
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Load and parse the models configuration file.
///
/// Performs environment-variable interpolation on string values matching
/// `${VAR_NAME}` or `${VAR_NAME:-default}`.
pub fn load_models_config(path: &Path) -> Result<ModelsConfig, InferenceError> {
    let raw = std::fs::read_to_string(path).map_err(|e| InferenceError::ConfigError {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;

    let interpolated = interpolate_env_vars(&raw);

    let config: ModelsConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| InferenceError::ConfigError {
            reason: format!("failed to parse config: {e}"),
        })?;

    Ok(config)
}

/// Load the config from `path` when given, otherwise search for one, otherwise
/// fall back to [`ModelsConfig::default`].
pub fn load_or_default(path: Option<&Path>, start: &Path) -> Result<ModelsConfig, InferenceError> {
    if let Some(explicit) = path {
        return load_models_config(explicit);
    }
    match find_config_path(start) {
        Some(found) => {
            tracing::debug!(path = %found.display(), "loading models config");
            load_models_config(&found)
        }
        None => {
            tracing::debug!("no models config found, using LM Studio defaults");
            Ok(ModelsConfig::default())
        }
    }
}

/// Resolve the active model configuration.
///
/// Returns `(model_key, ModelConfig)`. Reachability is checked at request
/// time by the client, not here.
pub fn resolve_active_model(
    config: &ModelsConfig,
) -> Result<(String, ModelConfig), InferenceError> {
    config
        .models
        .get(&config.active_model)
        .map(|model| (config.active_model.clone(), model.clone()))
        .ok_or_else(|| InferenceError::ConfigError {
            reason: format!(
                "active model '{}' not found in config",
                config.active_model
            ),
        })
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve a variable expression like `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    if let Some(idx) = expr.find(":-") {
        let var_name = &expr[..idx];
        let default = &expr[idx + 2..];
        std::env::var(var_name).unwrap_or_else(|_| expand_tilde(default))
    } else {
        std::env::var(expr).unwrap_or_default()
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
