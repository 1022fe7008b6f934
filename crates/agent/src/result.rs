//! Result Assembler: the outcome of one solve and its exported records.

use asploop_core::error::root_cause;
use asploop_core::{Error, ErrorCode, TurnMessage, UsageStats};
use serde::{Deserialize, Serialize};

use crate::controller::SessionState;

/// The final outcome of a solving session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionResult {
    pub success: bool,
    pub asp_code: String,
    pub iterations: u32,
    pub message: String,
    pub error_code: Option<ErrorCode>,
    pub statistics: UsageStats,
    pub messages_history: Vec<TurnMessage>,
    pub validation_history: Vec<TurnMessage>,
}

/// The exported fields of a [`SolutionResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionRecord {
    pub success: bool,
    pub iterations: u32,
    pub asp_code: String,
    pub message: String,
    pub error_code: Option<ErrorCode>,
    pub statistics: UsageStats,
}

/// A record with both conversation logs attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullSolutionRecord {
    #[serde(flatten)]
    pub record: SolutionRecord,
    pub messages_history: Vec<TurnMessage>,
    pub validation_history: Vec<TurnMessage>,
}

impl SolutionResult {
    /// Assemble the outcome of a finished session.
    pub fn from_state(state: SessionState) -> Self {
        let success = state.is_validated && !state.has_error();

        let (message, error_code) = if let Some(code) = state.error_code {
            let message = state.error_message.unwrap_or_else(|| code.to_string());
            (message, Some(code))
        } else if !state.is_validated && state.iteration_count >= state.max_iterations {
            (
                format!(
                    "Max iterations ({}) reached. Best attempt returned.",
                    state.max_iterations
                ),
                Some(ErrorCode::MaxIter),
            )
        } else {
            (state.last_feedback, None)
        };

        Self {
            success,
            asp_code: state.asp_code,
            iterations: state.iteration_count,
            message,
            error_code,
            statistics: state.statistics,
            messages_history: state.conversation,
            validation_history: state.validation_history,
        }
    }

    /// A failed outcome before any turn ran.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            asp_code: String::new(),
            iterations: 0,
            message: message.into(),
            error_code: Some(code),
            statistics: UsageStats::default(),
            messages_history: Vec::new(),
            validation_history: Vec::new(),
        }
    }

    pub fn from_error(error: &Error) -> Self {
        Self::error(error.code(), root_cause(error))
    }

    pub fn has_code(&self) -> bool {
        !self.asp_code.trim().is_empty()
    }

    /// The exported record. A failure always carries a code.
    pub fn to_record(&self) -> SolutionRecord {
        let error_code = if self.success {
            None
        } else {
            Some(self.error_code.unwrap_or(ErrorCode::Unknown))
        };
        SolutionRecord {
            success: self.success,
            iterations: self.iterations,
            asp_code: self.asp_code.clone(),
            message: self.message.clone(),
            error_code,
            statistics: self.statistics,
        }
    }

    pub fn to_full_record(&self) -> FullSolutionRecord {
        FullSolutionRecord {
            record: self.to_record(),
            messages_history: self.messages_history.clone(),
            validation_history: self.validation_history.clone(),
        }
    }

    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        let status = if self.success { "SUCCESS" } else { "FAILED" };
        let mut line = format!(
            "{status} after {} iteration(s), {} tokens, {} tool calls",
            self.iterations, self.statistics.total_tokens, self.statistics.tool_calls
        );
        if let Some(code) = self.to_record().error_code {
            line.push_str(&format!(" [{code}] {}", self.message));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asploop_core::GatewayError;

    fn finished(iterations: u32, max: u32, validated: bool) -> SessionState {
        let mut s = SessionState::new("p", max);
        s.iteration_count = iterations;
        s.is_validated = validated;
        s.asp_code = "a(1).".into();
        s.last_feedback = "VALIDATION PASSED".into();
        s
    }

    #[test]
    fn validated_session_succeeds() {
        let result = SolutionResult::from_state(finished(1, 5, true));
        assert!(result.success);
        assert!(result.error_code.is_none());
        assert_eq!(result.message, "VALIDATION PASSED");
        assert!(result.to_record().error_code.is_none());
        assert!(result.has_code());
    }

    #[test]
    fn exhausted_iterations_are_flagged() {
        let result = SolutionResult::from_state(finished(3, 3, false));
        assert!(!result.success);
        assert_eq!(result.error_code, Some(ErrorCode::MaxIter));
        assert_eq!(result.message, "Max iterations (3) reached. Best attempt returned.");
        assert_eq!(result.asp_code, "a(1).");
    }

    #[test]
    fn errors_take_precedence_over_cap() {
        let mut s = finished(3, 3, false);
        s.fail(ErrorCode::McpConnectionClosed, "pipe closed");
        let result = SolutionResult::from_state(s);
        assert_eq!(result.error_code, Some(ErrorCode::McpConnectionClosed));
        assert_eq!(result.message, "pipe closed");
        assert_eq!(result.iterations, 3);
    }

    #[test]
    fn failure_without_code_exports_unknown() {
        let mut s = finished(1, 5, false);
        s.last_feedback = "VALIDATION FAILED".into();
        let result = SolutionResult::from_state(s);
        assert!(result.error_code.is_none());
        assert_eq!(result.to_record().error_code, Some(ErrorCode::Unknown));
    }

    #[test]
    fn record_serializes_codes_as_strings() {
        let result = SolutionResult::from_error(&Error::Gateway(GatewayError::Spawn {
            command: "uv".into(),
            reason: "No such file or directory".into(),
        }));
        let json = serde_json::to_value(result.to_record()).unwrap();
        assert_eq!(json["error_code"], "MCP_ERROR");
        assert_eq!(json["success"], false);
        assert_eq!(json["statistics"]["tool_calls"], 0);
    }

    #[test]
    fn full_record_flattens_fields() {
        let mut s = finished(1, 5, true);
        s.conversation.push(TurnMessage::human("solve"));
        let full = SolutionResult::from_state(s).to_full_record();
        let json = serde_json::to_value(&full).unwrap();
        assert_eq!(json["iterations"], 1);
        assert_eq!(json["messages_history"][0]["kind"], "human_prompt");
    }

    #[test]
    fn summary_mentions_code() {
        let result = SolutionResult::error(ErrorCode::FileError, "Problem file not found");
        assert!(result.summary().contains("[FILE_ERROR] Problem file not found"));
        assert!(!result.has_code());
    }
}
