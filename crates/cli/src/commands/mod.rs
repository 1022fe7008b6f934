//! Subcommand implementations and the pieces they share.

pub mod batch;
pub mod solve;

use std::path::{Path, PathBuf};

use asploop_agent::{export_solution, SolutionResult};
use asploop_config::{AppConfig, ConfigError};
use clap::Args;
use tracing::{error, info, warn};

use crate::logging::LogLevel;

/// Options shared by `solve` and `batch`.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Custom solver system prompt file
    #[arg(long)]
    pub solver_prompt: Option<PathBuf>,

    /// Custom validator system prompt file
    #[arg(long)]
    pub validator_prompt: Option<PathBuf>,

    /// LLM model name (overrides MODEL_NAME)
    #[arg(long)]
    pub model: Option<String>,

    /// Maximum number of solver/validator iterations
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Logging level
    #[arg(long, value_enum, ignore_case = true, default_value = "info")]
    pub log_level: LogLevel,

    /// Where results and logs are written (default: results/)
    #[arg(long)]
    pub export_path: Option<PathBuf>,

    /// Configuration file
    #[arg(long, default_value = "asploop.toml")]
    pub config: PathBuf,
}

/// Why a command stopped before or while solving.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Bad arguments, reported before any work starts
    #[error("{0}")]
    Usage(String),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fatal(#[from] asploop_core::Error),
}

impl CommonArgs {
    /// Check the arguments that can be checked without loading anything.
    pub fn validate(&self) -> Result<(), CliError> {
        if let Some(path) = &self.solver_prompt
            && !path.exists()
        {
            return Err(CliError::Usage(format!(
                "Solver prompt file not found: {}",
                path.display()
            )));
        }
        if let Some(path) = &self.validator_prompt
            && !path.exists()
        {
            return Err(CliError::Usage(format!(
                "Validator prompt file not found: {}",
                path.display()
            )));
        }
        if self.max_iterations == Some(0) {
            return Err(CliError::Usage("Max iterations must be at least 1".into()));
        }
        Ok(())
    }

    /// Config file, then environment, then these flags.
    pub fn load_config(&self) -> Result<AppConfig, CliError> {
        let mut config = AppConfig::load(&self.config)?;
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut AppConfig) {
        if let Some(model) = &self.model {
            config.model_name = model.clone();
        }
        if let Some(max) = self.max_iterations {
            config.max_iterations = max;
        }
        if let Some(path) = &self.solver_prompt {
            config.solver_prompt_file = Some(path.clone());
        }
        if let Some(path) = &self.validator_prompt {
            config.validator_prompt_file = Some(path.clone());
        }
        if let Some(path) = &self.export_path {
            config.export_path = path.clone();
        }
    }
}

/// Export the outcome and log how it went.
pub fn report_outcome(problem: &Path, result: &SolutionResult, export_path: &Path) {
    match export_solution(problem, &result.to_record(), export_path) {
        Ok(written) => {
            info!("Results saved to: {}", written.record.display());
            if let Some(lp) = written.program {
                info!("ASP code saved to: {}", lp.display());
            }
        }
        Err(e) => error!(problem = %problem.display(), error = %e, "Failed to export result"),
    }

    info!(
        total_tokens = result.statistics.total_tokens,
        tool_calls = result.statistics.tool_calls,
        "Usage: total tokens={}, tool calls={}",
        result.statistics.total_tokens,
        result.statistics.tool_calls
    );
    match result.to_record().error_code {
        None => info!("Solved in {} iterations", result.iterations),
        Some(code) => warn!(message = %result.message, "Failed: {code}"),
    }
}
