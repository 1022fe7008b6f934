//! Iteration Controller: the solve → validate state machine.
//!
//! One [`SessionState`] flows through alternating solver and validator
//! turns until the validator passes the program, the iteration cap is hit,
//! or a turn-level fault sets an error code.

use std::sync::Arc;

use asploop_core::error::{root_cause, ProviderError};
use asploop_core::event::{DomainEvent, EventBus};
use asploop_core::{Error, ErrorCode, TurnMessage, UsageStats};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::composer;
use crate::invoker::{AgentHandle, TurnOutput};
use crate::postprocess::comment_unused_rules;

/// Marker the validator must include to accept a program.
pub const VALIDATION_MARKER: &str = "VALIDATION PASSED";

pub const SKIPPED_FEEDBACK: &str = "Validation skipped due to existing error in workflow.";

pub const NO_CODE_FEEDBACK: &str =
    "No ASP code was produced. Please create an ASP encoding for the problem.";

pub const STOPPED_MESSAGE: &str = "Execution stopped by user";

/// Everything known about one problem-solving attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub problem_description: String,
    pub asp_code: String,
    /// Solver context window, append-only
    pub conversation: Vec<TurnMessage>,
    pub validation_history: Vec<TurnMessage>,
    pub iteration_count: u32,
    pub max_iterations: u32,
    pub is_validated: bool,
    pub last_feedback: String,
    pub error_code: Option<ErrorCode>,
    pub error_message: Option<String>,
    pub statistics: UsageStats,
    /// LLM round trips spent across all turns
    pub steps_taken: u32,
}

impl SessionState {
    pub fn new(problem_description: impl Into<String>, max_iterations: u32) -> Self {
        Self {
            problem_description: problem_description.into(),
            asp_code: String::new(),
            conversation: Vec::new(),
            validation_history: Vec::new(),
            iteration_count: 0,
            max_iterations,
            is_validated: false,
            last_feedback: String::new(),
            error_code: None,
            error_message: None,
            statistics: UsageStats::default(),
            steps_taken: 0,
        }
    }

    pub fn has_error(&self) -> bool {
        self.error_code.is_some()
    }

    /// Record a terminal error. The first error wins.
    pub fn fail(&mut self, code: ErrorCode, message: impl Into<String>) {
        if self.error_code.is_none() {
            self.error_code = Some(code);
            self.error_message = Some(message.into());
        }
    }
}

/// Controller states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Node {
    Solve,
    Validate,
    End,
}

/// Decide what follows a validator turn: error, then success, then cap.
pub fn should_continue(state: &SessionState) -> Node {
    let done = state.has_error()
        || state.is_validated
        || state.iteration_count >= state.max_iterations;
    if done { Node::End } else { Node::Solve }
}

/// Drives solver and validator turns over a [`SessionState`].
pub struct IterationController {
    solver: AgentHandle,
    validator: AgentHandle,
    event_bus: Arc<EventBus>,
    session_step_limit: u32,
    cancel: CancellationToken,
    checkpoints: Option<(Arc<dyn CheckpointStore>, String)>,
}

impl IterationController {
    pub fn new(solver: AgentHandle, validator: AgentHandle, event_bus: Arc<EventBus>) -> Self {
        Self {
            solver,
            validator,
            event_bus,
            session_step_limit: 100,
            cancel: CancellationToken::new(),
            checkpoints: None,
        }
    }

    /// Cap on LLM round trips across the whole session.
    pub fn with_session_step_limit(mut self, limit: u32) -> Self {
        self.session_step_limit = limit;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Save a checkpoint under `thread_id` after every node.
    pub fn with_checkpoints(
        mut self,
        store: Arc<dyn CheckpointStore>,
        thread_id: impl Into<String>,
    ) -> Self {
        self.checkpoints = Some((store, thread_id.into()));
        self
    }

    /// Run a fresh session to completion.
    pub async fn run(&self, state: SessionState) -> SessionState {
        self.run_from(state, Node::Solve).await
    }

    /// Continue the session saved under this controller's thread id.
    pub async fn resume(&self) -> Result<SessionState, Error> {
        let (store, thread_id) = self
            .checkpoints
            .as_ref()
            .ok_or_else(|| Error::Internal("no checkpoint store attached".into()))?;
        let checkpoint = store
            .load(thread_id)
            .await?
            .ok_or_else(|| Error::Internal(format!("no checkpoint for thread {thread_id}")))?;
        info!(thread_id = %thread_id, next = ?checkpoint.next, "Resuming session");
        Ok(self.run_from(checkpoint.state, checkpoint.next).await)
    }

    /// Run the state machine starting at `node`.
    pub async fn run_from(&self, mut state: SessionState, mut node: Node) -> SessionState {
        loop {
            if node != Node::End && self.cancel.is_cancelled() {
                warn!("Stop requested, ending session");
                state.fail(ErrorCode::UserStopped, STOPPED_MESSAGE);
                node = Node::End;
            }

            node = match node {
                Node::Solve => {
                    self.solver_turn(&mut state).await;
                    Node::Validate
                }
                Node::Validate => {
                    self.validator_turn(&mut state).await;
                    should_continue(&state)
                }
                Node::End => break,
            };
            self.checkpoint(&state, node).await;
        }

        let success = state.is_validated && !state.has_error();
        info!(
            success,
            iterations = state.iteration_count,
            error_code = ?state.error_code,
            input_tokens = state.statistics.input_tokens,
            output_tokens = state.statistics.output_tokens,
            total_tokens = state.statistics.total_tokens,
            tool_calls = state.statistics.tool_calls,
            "Session finished"
        );
        self.event_bus.publish(DomainEvent::SessionEnded {
            success,
            iterations: state.iteration_count,
            error_code: state.error_code.map(|c| c.to_string()),
            timestamp: Utc::now(),
        });
        state
    }

    /// One solver turn. Faults are recorded on the state.
    pub async fn solver_turn(&self, state: &mut SessionState) {
        let iteration = state.iteration_count + 1;
        info!(
            iteration,
            max_iterations = state.max_iterations,
            "Solver turn {iteration}/{}",
            state.max_iterations
        );
        self.event_bus.publish(DomainEvent::IterationStarted {
            iteration,
            timestamp: Utc::now(),
        });

        let prompt = composer::solver_message(state);
        let mut history = state.conversation.clone();
        history.push(prompt.clone());

        let Some(output) = self.run_agent(&self.solver, &history, state).await else {
            return;
        };

        state.iteration_count += 1;
        state.conversation.push(prompt);
        state.asp_code = output.final_text().to_string();
        state.conversation.extend(output.new_messages);
        state.is_validated = false;
        state.last_feedback.clear();
        state.statistics += output.usage;

        self.event_bus.publish(DomainEvent::TurnCompleted {
            agent: self.solver.role().to_string(),
            iteration: state.iteration_count,
            timestamp: Utc::now(),
        });
    }

    /// One validator turn. Skipped when an error is set or there is no program.
    pub async fn validator_turn(&self, state: &mut SessionState) {
        if state.has_error() {
            state.is_validated = false;
            state.last_feedback = SKIPPED_FEEDBACK.to_string();
            return;
        }
        if state.asp_code.trim().is_empty() {
            info!("Solver produced no program, skipping validation");
            state.is_validated = false;
            state.last_feedback = NO_CODE_FEEDBACK.to_string();
            return;
        }

        let prompt = composer::validator_message(state);
        let Some(output) = self
            .run_agent(&self.validator, std::slice::from_ref(&prompt), state)
            .await
        else {
            state.is_validated = false;
            return;
        };

        let reply = output.final_text().to_string();
        let is_valid = reply.to_uppercase().contains(VALIDATION_MARKER);
        if is_valid {
            let processed = comment_unused_rules(&state.asp_code);
            info!(
                unused = ?processed.unused,
                "Post-processing: commented out {} unused rules",
                processed.commented_rules()
            );
            state.asp_code = processed.program;
        } else {
            info!(iteration = state.iteration_count, "Validation failed");
        }

        state.is_validated = is_valid;
        state.last_feedback = reply;
        state.validation_history.push(prompt);
        state.validation_history.extend(output.new_messages);
        state.statistics += output.usage;

        self.event_bus.publish(DomainEvent::TurnCompleted {
            agent: self.validator.role().to_string(),
            iteration: state.iteration_count,
            timestamp: Utc::now(),
        });
    }

    /// Invoke an agent within the step budget, racing cancellation.
    async fn run_agent(
        &self,
        agent: &AgentHandle,
        history: &[TurnMessage],
        state: &mut SessionState,
    ) -> Option<TurnOutput> {
        let remaining = self.session_step_limit.saturating_sub(state.steps_taken);
        if remaining == 0 {
            state.fail(
                ErrorCode::GraphError,
                format!("Session step limit of {} reached", self.session_step_limit),
            );
            return None;
        }
        let budget = agent.max_steps().min(remaining);

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            r = agent.invoke_limited(history, budget) => r,
        };

        match result {
            Ok(output) => {
                state.steps_taken += output.steps;
                if output.exhausted {
                    state.statistics += output.usage;
                    let message = format!(
                        "Recursion limit of {budget} reached without hitting a stop condition"
                    );
                    error!(role = %agent.role(), "{message}");
                    self.report(&agent.role().to_string(), &message);
                    state.fail(ErrorCode::GraphError, message);
                    return None;
                }
                Some(output)
            }
            Err(e) => {
                let (code, message) = classify_turn_error(&e);
                error!(role = %agent.role(), code = %code, error = %e, "Agent turn failed");
                self.report(&agent.role().to_string(), &message);
                state.fail(code, message);
                None
            }
        }
    }

    fn report(&self, context: &str, message: &str) {
        self.event_bus.publish(DomainEvent::ErrorOccurred {
            context: context.to_string(),
            error_message: message.to_string(),
            timestamp: Utc::now(),
        });
    }

    async fn checkpoint(&self, state: &SessionState, next: Node) {
        let Some((store, thread_id)) = &self.checkpoints else { return };
        let checkpoint = Checkpoint {
            state: state.clone(),
            next,
            saved_at: Utc::now(),
        };
        if let Err(e) = store.save(thread_id, checkpoint).await {
            warn!(thread_id = %thread_id, error = %e, "Failed to save checkpoint");
        }
    }
}

/// Error code and user-facing message for a failed agent turn.
pub fn classify_turn_error(e: &Error) -> (ErrorCode, String) {
    if e.is_connection_closed() {
        return (ErrorCode::McpConnectionClosed, root_cause(e));
    }
    match e {
        Error::Provider(ProviderError::ModelNotFound(_)) => {
            (ErrorCode::RuntimeError, root_cause(e))
        }
        Error::Cancelled => (ErrorCode::UserStopped, STOPPED_MESSAGE.to_string()),
        other => (other.code(), root_cause(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::InMemoryCheckpointStore;
    use crate::invoker::AgentRole;
    use crate::test_helpers::*;
    use asploop_core::{GatewayError, Provider, ToolRegistry};
    use serde_json::json;

    fn agent(role: AgentRole, provider: Arc<dyn Provider>, tools: ToolRegistry) -> AgentHandle {
        AgentHandle::new(
            role,
            provider,
            "mock-model",
            "prompt",
            tools,
            Arc::new(EventBus::default()),
        )
    }

    fn controller(solver: Arc<dyn Provider>, validator: Arc<dyn Provider>) -> IterationController {
        let buffer = ProgramBuffer::default();
        IterationController::new(
            agent(AgentRole::Solver, solver, buffer.registry()),
            agent(AgentRole::Validator, validator, buffer.registry()),
            Arc::new(EventBus::default()),
        )
    }

    fn state_with(
        iteration: u32,
        max: u32,
        validated: bool,
        error: Option<ErrorCode>,
    ) -> SessionState {
        let mut s = SessionState::new("p", max);
        s.iteration_count = iteration;
        s.is_validated = validated;
        s.error_code = error;
        s
    }

    #[test]
    fn error_wins_over_everything() {
        let s = state_with(9, 3, true, Some(ErrorCode::McpConnectionClosed));
        assert_eq!(should_continue(&s), Node::End);
    }

    #[test]
    fn validated_ends_before_cap() {
        assert_eq!(should_continue(&state_with(1, 5, true, None)), Node::End);
    }

    #[test]
    fn cap_boundary() {
        assert_eq!(should_continue(&state_with(5, 5, false, None)), Node::End);
        assert_eq!(should_continue(&state_with(4, 5, false, None)), Node::Solve);
    }

    #[test]
    fn first_error_is_kept() {
        let mut s = SessionState::new("p", 1);
        s.fail(ErrorCode::McpConnectionClosed, "closed");
        s.fail(ErrorCode::UserStopped, "stop");
        assert_eq!(s.error_code, Some(ErrorCode::McpConnectionClosed));
        assert_eq!(s.error_message.as_deref(), Some("closed"));
    }

    #[test]
    fn model_not_found_is_a_runtime_error() {
        let e: Error =
            ProviderError::ModelNotFound("Error code: 404 - model 'x' not found".into()).into();
        let (code, message) = classify_turn_error(&e);
        assert_eq!(code, ErrorCode::RuntimeError);
        assert!(message.contains("model 'x' not found"));

        let closed: Error = GatewayError::ConnectionClosed("eof".into()).into();
        assert_eq!(classify_turn_error(&closed).0, ErrorCode::McpConnectionClosed);
        assert_eq!(classify_turn_error(&Error::Cancelled).1, STOPPED_MESSAGE);
    }

    #[tokio::test]
    async fn passes_on_first_iteration() {
        let solver = Arc::new(SequentialMockProvider::single_text("color(1..3)."));
        let validator =
            Arc::new(SequentialMockProvider::single_text("All good. validation passed"));
        let c = controller(solver, validator);

        let state = c.run(SessionState::new("3-color a cycle", 5)).await;
        assert!(state.is_validated);
        assert_eq!(state.iteration_count, 1);
        assert_eq!(state.asp_code, "color(1..3).");
        assert!(state.error_code.is_none());
        assert_eq!(state.statistics.total_tokens, 30);
        // prompt + reply
        assert_eq!(state.conversation.len(), 2);
        assert_eq!(state.validation_history.len(), 2);
    }

    #[tokio::test]
    async fn feedback_flows_back_to_solver() {
        let solver = Arc::new(SequentialMockProvider::new(vec![
            make_text_response("a(1)."),
            make_text_response("a(1). b(2)."),
        ]));
        let validator = Arc::new(SequentialMockProvider::new(vec![
            make_text_response("VALIDATION FAILED: b is missing"),
            make_text_response("VALIDATION PASSED"),
        ]));
        let c = controller(solver.clone(), validator);

        let state = c.run(SessionState::new("p", 5)).await;
        assert!(state.is_validated);
        assert_eq!(state.iteration_count, 2);

        let second = &solver.requests()[1];
        let last = second.messages.last().unwrap();
        assert!(last.content.contains("VALIDATION FAILED: b is missing"));
        assert!(last.content.contains("Current ASP code state:\na(1)."));
        // system + first prompt + first reply + feedback prompt
        assert_eq!(second.messages.len(), 4);
    }

    #[tokio::test]
    async fn stops_at_iteration_cap() {
        let solver = Arc::new(SequentialMockProvider::new(vec![
            make_text_response("a."),
            make_text_response("b."),
        ]));
        let validator = Arc::new(SequentialMockProvider::new(vec![
            make_text_response("VALIDATION FAILED"),
            make_text_response("VALIDATION FAILED again"),
        ]));
        let c = controller(solver, validator);

        let state = c.run(SessionState::new("p", 2)).await;
        assert!(!state.is_validated);
        assert_eq!(state.iteration_count, 2);
        assert!(state.error_code.is_none());
        assert_eq!(state.last_feedback, "VALIDATION FAILED again");
    }

    #[tokio::test]
    async fn empty_program_skips_validator() {
        let solver = Arc::new(SequentialMockProvider::single_text(""));
        let validator = Arc::new(SequentialMockProvider::new(vec![]));
        let c = controller(solver, validator.clone());

        let state = c.run(SessionState::new("p", 1)).await;
        assert_eq!(validator.call_count(), 0);
        assert_eq!(state.last_feedback, NO_CODE_FEEDBACK);
        assert!(!state.is_validated);
    }

    #[tokio::test]
    async fn connection_loss_ends_without_validation() {
        let provider = Arc::new(SequentialMockProvider::new(vec![make_tool_call_response(
            vec![make_tool_call("solve_model", json!({}))],
            "",
        )]));
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(FailingTool::new(
            "solve_model",
            GatewayError::ConnectionClosed("broken pipe".into()),
        )));
        let validator = Arc::new(SequentialMockProvider::new(vec![]));
        let c = IterationController::new(
            agent(AgentRole::Solver, provider, tools),
            agent(AgentRole::Validator, validator.clone(), ToolRegistry::new()),
            Arc::new(EventBus::default()),
        );

        let state = c.run(SessionState::new("p", 5)).await;
        assert_eq!(state.error_code, Some(ErrorCode::McpConnectionClosed));
        assert_eq!(state.iteration_count, 0);
        assert_eq!(state.last_feedback, SKIPPED_FEEDBACK);
        assert_eq!(validator.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_model_sets_runtime_error() {
        let solver = Arc::new(FailingProvider::new(ProviderError::ApiError {
            status_code: 404,
            message: "model 'nope' not found".into(),
        }));
        let validator = Arc::new(SequentialMockProvider::new(vec![]));
        let state = controller(solver, validator).run(SessionState::new("p", 3)).await;
        assert_eq!(state.error_code, Some(ErrorCode::RuntimeError));
        assert_eq!(state.iteration_count, 0);
    }

    #[tokio::test]
    async fn validated_program_is_post_processed() {
        let solver = Arc::new(SequentialMockProvider::single_text(
            "a(1).\nb(X) :- a(X).\n#show a/1.",
        ));
        let validator = Arc::new(SequentialMockProvider::single_text("VALIDATION PASSED"));
        let state = controller(solver, validator).run(SessionState::new("p", 1)).await;
        assert_eq!(state.asp_code, "a(1).\n% b(X) :- a(X).\n#show a/1.");
    }

    #[tokio::test]
    async fn session_step_limit_is_a_graph_error() {
        let looping = (0..10)
            .map(|_| make_tool_call_response(vec![make_tool_call("get_model", json!({}))], ""))
            .collect();
        let solver = Arc::new(SequentialMockProvider::new(looping));
        let validator = Arc::new(SequentialMockProvider::new(vec![]));
        let c = controller(solver, validator).with_session_step_limit(4);

        let state = c.run(SessionState::new("p", 3)).await;
        assert_eq!(state.error_code, Some(ErrorCode::GraphError));
        assert_eq!(state.steps_taken, 4);
        assert_eq!(state.statistics.tool_calls, 4);
    }

    #[tokio::test]
    async fn cancellation_interrupts_in_flight_turn() {
        let cancel = CancellationToken::new();
        let validator = Arc::new(SequentialMockProvider::new(vec![]));
        let c = controller(Arc::new(PendingProvider), validator).with_cancellation(cancel.clone());

        let handle = tokio::spawn(async move { c.run(SessionState::new("p", 3)).await });
        tokio::task::yield_now().await;
        cancel.cancel();

        let state = handle.await.unwrap();
        assert_eq!(state.error_code, Some(ErrorCode::UserStopped));
        assert_eq!(state.error_message.as_deref(), Some(STOPPED_MESSAGE));
    }

    #[tokio::test]
    async fn resumes_from_checkpoint() {
        let store: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());
        let mut saved = SessionState::new("p", 3);
        saved.iteration_count = 1;
        saved.asp_code = "a(1).".into();
        store
            .save("t1", Checkpoint { state: saved, next: Node::Validate, saved_at: Utc::now() })
            .await
            .unwrap();

        let solver = Arc::new(SequentialMockProvider::new(vec![]));
        let validator = Arc::new(SequentialMockProvider::single_text("VALIDATION PASSED"));
        let c = controller(solver, validator).with_checkpoints(store.clone(), "t1");

        let state = c.resume().await.unwrap();
        assert!(state.is_validated);
        assert_eq!(state.iteration_count, 1);

        let last = store.load("t1").await.unwrap().unwrap();
        assert_eq!(last.next, Node::End);
        assert!(last.state.is_validated);
    }

    #[tokio::test]
    async fn resume_without_checkpoint_fails() {
        let c = controller(
            Arc::new(SequentialMockProvider::new(vec![])),
            Arc::new(SequentialMockProvider::new(vec![])),
        )
        .with_checkpoints(Arc::new(InMemoryCheckpointStore::new()), "missing");
        assert!(c.resume().await.is_err());
    }
}
