//! Runners: solve one problem file, or a directory of them.
//!
//! A [`SolveRunner`] owns everything a session needs besides the session
//! itself. Every solve opens its own gateway session and closes it on the
//! way out, whatever the outcome.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use asploop_config::{AppConfig, ConfigError, Prompts};
use asploop_core::event::EventBus;
use asploop_core::{Error, ErrorCode, Provider};
use asploop_providers::build_from_config;
use asploop_tools::{
    report_missing_operations, validator_toolset, GatewaySession, McpToolGateway, ToolGateway,
};
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::checkpoint::CheckpointStore;
use crate::controller::{IterationController, SessionState, STOPPED_MESSAGE};
use crate::invoker::{AgentHandle, AgentRole};
use crate::result::SolutionResult;

/// Solves problems against one provider and one solver service.
pub struct SolveRunner {
    config: AppConfig,
    prompts: Prompts,
    provider: Arc<dyn Provider>,
    gateway: Arc<dyn ToolGateway>,
    event_bus: Arc<EventBus>,
    cancel: CancellationToken,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
}

impl SolveRunner {
    pub fn new(
        config: AppConfig,
        prompts: Prompts,
        provider: Arc<dyn Provider>,
        gateway: Arc<dyn ToolGateway>,
    ) -> Self {
        Self {
            config,
            prompts,
            provider,
            gateway,
            event_bus: Arc::new(EventBus::default()),
            cancel: CancellationToken::new(),
            checkpoints: None,
        }
    }

    /// Build the provider, MCP gateway and prompts described by `config`.
    pub fn from_config(config: AppConfig) -> Result<Self, ConfigError> {
        let prompts = Prompts::load(
            config.solver_prompt_file.as_deref(),
            config.validator_prompt_file.as_deref(),
        )?;
        match &config.solver_prompt_file {
            Some(path) => info!(path = %path.display(), "Loaded solver system prompt"),
            None => info!("Loaded default solver system prompt"),
        }
        match &config.validator_prompt_file {
            Some(path) => info!(path = %path.display(), "Loaded validator system prompt"),
            None => info!("Loaded default validator system prompt"),
        }

        let provider = build_from_config(&config);
        let gateway = Arc::new(McpToolGateway::new(config.mcp_server.clone()));
        Ok(Self::new(config, prompts, provider, gateway))
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Checkpoint every session into `store` under a fresh thread id.
    pub fn with_checkpoints(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Solve the problem described in `problem_file`.
    pub async fn solve(&self, problem_file: &Path) -> SolutionResult {
        info!(problem = %problem_file.display(), "Starting ASP solver");
        let description = match read_problem(problem_file) {
            Ok(text) => text,
            Err(e) => {
                error!(problem = %problem_file.display(), error = %e, "Cannot load problem");
                return SolutionResult::from_error(&e);
            }
        };
        info!("Problem description loaded");

        let result = self.solve_problem(&description).await;
        info!("Solving completed: {}", result.summary());
        result
    }

    /// Solve a problem given as text.
    pub async fn solve_problem(&self, description: &str) -> SolutionResult {
        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return SolutionResult::error(ErrorCode::UserStopped, STOPPED_MESSAGE);
            }
            r = self.gateway.open_session() => r,
        };
        let session = match opened {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Cannot open solver service session");
                return SolutionResult::from_error(&Error::Gateway(e));
            }
        };

        let state = self.run_session(session.as_ref(), description).await;
        session.close().await;
        SolutionResult::from_state(state)
    }

    async fn run_session(&self, session: &dyn GatewaySession, description: &str) -> SessionState {
        let tools = session.tools();
        info!(count = tools.len(), "Loaded solver tools");
        report_missing_operations(tools);
        let validator_tools = validator_toolset(tools, &self.config.validator_tools);

        let solver = self.agent(AgentRole::Solver, &self.prompts.solver, tools.clone());
        let validator = self.agent(AgentRole::Validator, &self.prompts.validator, validator_tools);

        let mut controller =
            IterationController::new(solver, validator, Arc::clone(&self.event_bus))
            .with_session_step_limit(self.config.session_step_limit)
            .with_cancellation(self.cancel.clone());
        if let Some(store) = &self.checkpoints {
            let thread_id = Uuid::new_v4().to_string();
            info!(thread_id = %thread_id, "Checkpointing session");
            controller = controller.with_checkpoints(Arc::clone(store), thread_id);
        }

        controller
            .run(SessionState::new(description, self.config.max_iterations))
            .await
    }

    fn agent(
        &self,
        role: AgentRole,
        prompt: &str,
        tools: asploop_core::ToolRegistry,
    ) -> AgentHandle {
        AgentHandle::new(
            role,
            Arc::clone(&self.provider),
            &self.config.model_name,
            prompt,
            tools,
            Arc::clone(&self.event_bus),
        )
        .with_temperature(self.config.temperature)
        .with_max_steps(self.config.recursion_limit)
    }
}

/// Read a problem description. Missing, unreadable or blank files are errors.
pub fn read_problem(path: &Path) -> Result<String, Error> {
    if !path.exists() {
        return Err(Error::File(format!("Problem file not found: {}", path.display())));
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::File(format!("Failed to read problem file: {e}")))?;
    if content.trim().is_empty() {
        return Err(Error::File(format!("Empty problem file: {}", path.display())));
    }
    Ok(content)
}

/// `root/lpcp-<year>/problem-*.md`, sorted within each year.
///
/// Without `years`, every `lpcp-*` directory under `root` is searched.
/// Requested years with no directory are skipped.
pub fn find_problem_files(root: &Path, years: Option<&[String]>) -> Result<Vec<PathBuf>, Error> {
    let year_dirs: Vec<PathBuf> = match years {
        Some(years) if !years.is_empty() => {
            years.iter().map(|y| root.join(format!("lpcp-{y}"))).collect()
        }
        _ => {
            let entries = std::fs::read_dir(root)
                .map_err(|e| Error::File(format!("cannot open {}: {e}", root.display())))?;
            let mut dirs: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| {
                    p.is_dir()
                        && p.file_name()
                            .and_then(|n| n.to_str())
                            .is_some_and(|n| n.starts_with("lpcp-"))
                })
                .collect();
            dirs.sort();
            dirs
        }
    };

    let mut files = Vec::new();
    for dir in year_dirs {
        if !dir.is_dir() {
            continue;
        }
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| Error::File(format!("cannot open {}: {e}", dir.display())))?;
        let mut found: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension().is_some_and(|ext| ext == "md")
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("problem-"))
            })
            .collect();
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

/// Hooks around each problem of a batch.
pub trait BatchObserver {
    /// Subscriber that receives this problem's log lines, if any.
    fn log_dispatch(&mut self, _problem: &Path) -> Option<tracing::Dispatch> {
        None
    }

    fn on_result(&mut self, _problem: &Path, _result: &SolutionResult) {}
}

impl BatchObserver for () {}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: BTreeMap<PathBuf, SolutionResult>,
    pub succeeded: usize,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded
    }
}

/// Solves problem files one after another with a shared [`SolveRunner`].
pub struct BatchRunner {
    runner: SolveRunner,
}

impl BatchRunner {
    pub fn new(runner: SolveRunner) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &SolveRunner {
        &self.runner
    }

    /// Solve every file in order. A stop request ends the batch early.
    pub async fn solve_all(
        &self,
        files: &[PathBuf],
        observer: &mut dyn BatchObserver,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let total = files.len();

        for (k, file) in files.iter().enumerate() {
            if self.runner.cancel.is_cancelled() {
                warn!(remaining = total - k, "Batch stopped by user");
                break;
            }
            info!(problem = %file.display(), "[{}/{}] Processing", k + 1, total);

            let solve = self.runner.solve(file);
            let result = match observer.log_dispatch(file) {
                Some(dispatch) => solve.with_subscriber(dispatch).await,
                None => solve.await,
            };

            if result.success {
                report.succeeded += 1;
            }
            observer.on_result(file, &result);
            report.results.insert(file.clone(), result);
        }

        info!(
            total = report.results.len(),
            succeeded = report.succeeded,
            failed = report.failed(),
            "Batch processing complete"
        );
        report
    }
}
