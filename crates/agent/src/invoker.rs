//! Agent Invoker: one agent turn against the LLM and the solver tools.
//!
//! A turn feeds the conversation to the model, executes every tool call it
//! requests, and loops until the model answers with text only. The turn's
//! new messages and its usage are returned; the caller owns session state.

use std::sync::Arc;
use std::time::Instant;

use asploop_core::error::{ProviderError, ToolError};
use asploop_core::event::{DomainEvent, EventBus};
use asploop_core::message::{Message, TurnMessage};
use asploop_core::provider::{Provider, ProviderRequest};
use asploop_core::tool::{ToolCall, ToolRegistry};
use asploop_core::{Error, ToolOutcome, UsageStats};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Which side of the loop an agent plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Solver,
    Validator,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Solver => "solver",
            AgentRole::Validator => "validator",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one turn produced.
#[derive(Debug, Clone, Default)]
pub struct TurnOutput {
    /// Agent replies and tool results, in the order they happened
    pub new_messages: Vec<TurnMessage>,
    pub usage: UsageStats,
    /// LLM round trips taken
    pub steps: u32,
    /// The turn was cut off by its step limit before a final reply
    pub exhausted: bool,
}

impl TurnOutput {
    /// Text of the last message the turn produced.
    pub fn final_text(&self) -> &str {
        self.new_messages.last().map(TurnMessage::text).unwrap_or("")
    }
}

/// Prefix of the tool-result text that reports a failed tool invocation.
pub const TOOL_ERROR_PREFIX: &str = "An error occurred invoking the tool. Please try differently.";

/// An LLM bound to a role, a system prompt and a toolset.
pub struct AgentHandle {
    role: AgentRole,
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    system_prompt: String,
    tools: ToolRegistry,
    max_steps: u32,
    event_bus: Arc<EventBus>,
}

impl AgentHandle {
    pub fn new(
        role: AgentRole,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        tools: ToolRegistry,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            role,
            provider,
            model: model.into(),
            temperature: 0.0,
            system_prompt: system_prompt.into(),
            tools,
            max_steps: 50,
            event_bus,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Cap on LLM round trips within one turn.
    pub fn with_max_steps(mut self, max: u32) -> Self {
        self.max_steps = max;
        self
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one turn with the handle's own step cap.
    pub async fn invoke(&self, history: &[TurnMessage]) -> Result<TurnOutput, Error> {
        self.invoke_limited(history, self.max_steps).await
    }

    /// Run one turn allowing at most `step_limit` LLM round trips.
    ///
    /// Tool failures are handed back to the model as tool results. A closed
    /// solver connection and provider errors end the turn with `Err`; a
    /// missing model is reported as [`ProviderError::ModelNotFound`].
    pub async fn invoke_limited(
        &self,
        history: &[TurnMessage],
        step_limit: u32,
    ) -> Result<TurnOutput, Error> {
        let mut messages: Vec<Message> = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(&self.system_prompt));
        messages.extend(history.iter().map(TurnMessage::to_message));

        let tool_definitions = self.tools.definitions();
        let mut output = TurnOutput::default();

        debug!(role = %self.role, history = history.len(), "Starting agent turn");

        loop {
            if output.steps >= step_limit {
                warn!(
                    role = %self.role,
                    steps = output.steps,
                    "Step limit reached before a final reply"
                );
                output.exhausted = true;
                return Ok(output);
            }
            output.steps += 1;

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                temperature: self.temperature,
                max_tokens: None,
                tools: tool_definitions.clone(),
                stop: vec![],
            };

            let response = match self.provider.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    error!(role = %self.role, error = %e, "Model invocation failed");
                    if e.indicates_missing_model() {
                        return Err(
                            ProviderError::ModelNotFound(format!("{}: {e}", self.model)).into()
                        );
                    }
                    return Err(e.into());
                }
            };

            let usage = response.usage.unwrap_or_default();
            output.usage.record_usage(&usage);
            let tool_calls = response.message.tool_calls.clone();

            if tool_calls.is_empty() {
                info!(
                    role = %self.role,
                    input_tokens = usage.input_tokens,
                    output_tokens = usage.output_tokens,
                    total_tokens = usage.total_tokens,
                    "{} called LLM",
                    self.role
                );
            } else {
                for tc in &tool_calls {
                    info!(
                        role = %self.role,
                        tool = %tc.name,
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        total_tokens = usage.total_tokens,
                        "{} called tool: {}",
                        self.role,
                        tc.name
                    );
                }
            }

            self.event_bus.publish(DomainEvent::LlmCalled {
                agent: self.role.to_string(),
                model: response.model.clone(),
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
                timestamp: Utc::now(),
            });

            let reply = TurnMessage::agent_with_calls(response.message.content, tool_calls.clone());
            messages.push(reply.to_message());
            output.new_messages.push(reply);

            if tool_calls.is_empty() {
                return Ok(output);
            }

            for tc in &tool_calls {
                output.usage.tool_calls += 1;

                let start = Instant::now();
                let raw_arguments = if tc.arguments.trim().is_empty() {
                    "{}"
                } else {
                    tc.arguments.as_str()
                };
                let executed = match serde_json::from_str::<serde_json::Value>(raw_arguments) {
                    Ok(arguments) => {
                        let call = ToolCall {
                            id: tc.id.clone(),
                            name: tc.name.clone(),
                            arguments,
                        };
                        self.tools.execute(&call).await
                    }
                    Err(e) => Err(ToolError::InvalidArguments(e.to_string())),
                };
                let entry = match executed {
                    Ok(result) => TurnMessage::tool_result(&tc.id, &tc.name, result.output),
                    Err(e) if e.is_connection_closed() => {
                        error!(
                            role = %self.role,
                            tool = %tc.name,
                            error = %e,
                            "Solver connection closed during tool call"
                        );
                        return Err(e.into());
                    }
                    Err(e) => TurnMessage::ToolResult {
                        call_id: tc.id.clone(),
                        tool_name: tc.name.clone(),
                        text: format!("{TOOL_ERROR_PREFIX} ({e})"),
                        outcome: ToolOutcome::Failed,
                    },
                };
                let duration_ms = start.elapsed().as_millis() as u64;

                let success = matches!(
                    entry,
                    TurnMessage::ToolResult { outcome: ToolOutcome::Success, .. }
                );
                let outcome = if success { "success" } else { "failed" };
                info!(
                    role = %self.role,
                    tool = %tc.name,
                    outcome,
                    duration_ms,
                    "tools {} operation {outcome}",
                    tc.name
                );
                self.event_bus.publish(DomainEvent::ToolExecuted {
                    agent: self.role.to_string(),
                    tool_name: tc.name.clone(),
                    success,
                    duration_ms,
                    timestamp: Utc::now(),
                });

                messages.push(entry.to_message());
                output.new_messages.push(entry);
            }
        }
    }
}
