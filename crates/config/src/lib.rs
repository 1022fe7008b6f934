//! Configuration loading, validation, and management for asploop.
//!
//! Loads configuration from a TOML file with environment variable overrides.
//! Command-line flags are applied on top by the binary. Validates all
//! settings before any solving session starts.

pub mod prompts;

use asploop_core::ErrorCode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use prompts::{Prompts, DEFAULT_SOLVER_PROMPT, DEFAULT_VALIDATOR_PROMPT};

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// LLM provider kind ("openai", "ollama", or any OpenAI-compatible name)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier sent to the provider
    #[serde(default = "default_model")]
    pub model_name: String,

    /// Base URL of the chat-completions endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key (local servers accept any value)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default)]
    pub temperature: f32,

    /// Solver/validator rounds per session
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// LLM round trips allowed within one agent turn
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: u32,

    /// LLM round trips allowed across a whole session
    #[serde(default = "default_session_step_limit")]
    pub session_step_limit: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver_prompt_file: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator_prompt_file: Option<PathBuf>,

    /// Solver-service operations the validator may call
    #[serde(default = "default_validator_tools")]
    pub validator_tools: Vec<String>,

    /// Directory receiving result records, program files and logs
    #[serde(default = "default_export_path")]
    pub export_path: PathBuf,

    /// Solver service (MCP server) launch settings
    #[serde(default)]
    pub mcp_server: McpServerConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-oss:20b".into()
}
fn default_base_url() -> String {
    "http://localhost:11434/v1".into()
}
fn default_max_iterations() -> u32 {
    5
}
fn default_recursion_limit() -> u32 {
    50
}
fn default_session_step_limit() -> u32 {
    100
}
fn default_validator_tools() -> Vec<String> {
    vec!["solve_model".into(), "get_model".into()]
}
fn default_export_path() -> PathBuf {
    PathBuf::from("results")
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider", &self.provider)
            .field("model_name", &self.model_name)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("temperature", &self.temperature)
            .field("max_iterations", &self.max_iterations)
            .field("recursion_limit", &self.recursion_limit)
            .field("session_step_limit", &self.session_step_limit)
            .field("solver_prompt_file", &self.solver_prompt_file)
            .field("validator_prompt_file", &self.validator_prompt_file)
            .field("validator_tools", &self.validator_tools)
            .field("export_path", &self.export_path)
            .field("mcp_server", &self.mcp_server)
            .finish()
    }
}

/// How to launch the solver service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    #[serde(default = "default_mcp_command")]
    pub command: String,

    #[serde(default = "default_mcp_args")]
    pub args: Vec<String>,

    /// Display name used in logs
    #[serde(default = "default_mcp_name")]
    pub name: String,
}

fn default_mcp_command() -> String {
    "uv".into()
}
fn default_mcp_args() -> Vec<String> {
    vec!["run".into(), "mcp-solver-asp".into()]
}
fn default_mcp_name() -> String {
    "mcp-solver".into()
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            command: default_mcp_command(),
            args: default_mcp_args(),
            name: default_mcp_name(),
        }
    }
}

impl McpServerConfig {
    /// Reject launch settings that cannot possibly start a server.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "MCP server command must not be empty".into(),
            ));
        }

        if let Some(pos) = self.args.iter().position(|a| a == "--directory") {
            let Some(dir) = self.args.get(pos + 1) else {
                return Err(ConfigError::ValidationError(
                    "--directory argument is missing its path".into(),
                ));
            };
            let dir = Path::new(dir);
            if !dir.exists() {
                return Err(ConfigError::ValidationError(format!(
                    "MCP server directory does not exist: {}",
                    dir.display()
                )));
            }
            if !dir.is_dir() {
                return Err(ConfigError::ValidationError(format!(
                    "MCP server directory path is not a directory: {}",
                    dir.display()
                )));
            }
            if !dir.join("pyproject.toml").is_file() {
                return Err(ConfigError::ValidationError(format!(
                    "MCP server directory has no pyproject.toml: {}",
                    dir.display()
                )));
            }
        }

        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from `path` (defaults when missing), then apply
    /// environment variable overrides:
    /// - `MODEL_NAME`, `LLM_PROVIDER`, `BASE_URL`, `TEMPERATURE`
    /// - `API_KEY` (falls back to `OPENAI_API_KEY`)
    /// - `MAX_ITERATIONS`, `EXPORT_PATH`
    /// - `MCP_SOLVER_COMMAND`, `MCP_SOLVER_ARGS` (comma-separated)
    ///
    /// Nothing is validated yet: a later layer may still fix a value, so
    /// callers run [`AppConfig::validate`] once every override is applied.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path, unvalidated.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(config)
    }

    /// Apply overrides from an environment lookup. Taking the lookup as a
    /// closure keeps tests off the real process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("MODEL_NAME") {
            self.model_name = model;
        }
        if let Some(provider) = lookup("LLM_PROVIDER") {
            self.provider = provider;
        }
        if let Some(url) = lookup("BASE_URL") {
            self.base_url = url;
        }
        if let Some(key) = lookup("API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(raw) = lookup("TEMPERATURE") {
            self.temperature = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("TEMPERATURE is not a number: {raw}"))
            })?;
        }
        if let Some(raw) = lookup("MAX_ITERATIONS") {
            self.max_iterations = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("MAX_ITERATIONS is not an integer: {raw}"))
            })?;
        }
        if let Some(path) = lookup("EXPORT_PATH") {
            self.export_path = PathBuf::from(path);
        }
        if let Some(command) = lookup("MCP_SOLVER_COMMAND") {
            self.mcp_server.command = command;
        }
        if let Some(args) = lookup("MCP_SOLVER_ARGS") {
            self.mcp_server.args = args
                .split(',')
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect();
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.max_iterations < 1 {
            return Err(ConfigError::ValidationError(
                "max_iterations must be at least 1".into(),
            ));
        }

        if self.recursion_limit < 1 {
            return Err(ConfigError::ValidationError(
                "recursion_limit must be at least 1".into(),
            ));
        }

        if self.session_step_limit < 1 {
            return Err(ConfigError::ValidationError(
                "session_step_limit must be at least 1".into(),
            ));
        }

        self.mcp_server.validate()
    }

    /// The key sent to the provider; local servers ignore it.
    pub fn effective_api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or("ollama")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_name: default_model(),
            base_url: default_base_url(),
            api_key: None,
            temperature: 0.0,
            max_iterations: default_max_iterations(),
            recursion_limit: default_recursion_limit(),
            session_step_limit: default_session_step_limit(),
            solver_prompt_file: None,
            validator_prompt_file: None,
            validator_tools: default_validator_tools(),
            export_path: default_export_path(),
            mcp_server: McpServerConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Prompt file {path}: {reason}")]
    PromptFile { path: PathBuf, reason: String },
}

impl ConfigError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ConfigError::ReadError { .. } | ConfigError::PromptFile { .. } => ErrorCode::FileError,
            ConfigError::ParseError { .. } | ConfigError::ValidationError(_) => {
                ErrorCode::Unknown
            }
        }
    }
}

impl From<ConfigError> for asploop_core::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ReadError { .. } | ConfigError::PromptFile { .. } => {
                asploop_core::Error::File(e.to_string())
            }
            other => asploop_core::Error::Config {
                message: other.to_string(),
            },
        }
    }
}
