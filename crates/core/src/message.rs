//! Message domain types.
//!
//! [`TurnMessage`] is what a session records: the human prompt that opened a
//! turn, agent replies, and tool results. [`Message`] is the role-tagged wire
//! shape handed to providers; every turn message converts into one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The controller's composed prompt
    User,
    /// The model
    Assistant,
    /// System instructions (agent prompt)
    System,
    /// Tool execution result
    Tool,
}

/// A single provider-facing message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content.into())
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content.into())
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content.into())
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, content.into());
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as JSON string
    pub arguments: String,
}

/// Whether a tool result reads as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Success,
    Failed,
}

impl ToolOutcome {
    /// Results mentioning "Failed" or "Error" count as failures.
    pub fn classify(text: &str) -> Self {
        if text.contains("Failed") || text.contains("Error") {
            ToolOutcome::Failed
        } else {
            ToolOutcome::Success
        }
    }
}

/// One entry of a session conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnMessage {
    HumanPrompt {
        text: String,
    },
    AgentReply {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<MessageToolCall>,
    },
    ToolResult {
        call_id: String,
        tool_name: String,
        text: String,
        outcome: ToolOutcome,
    },
}

impl TurnMessage {
    pub fn human(text: impl Into<String>) -> Self {
        TurnMessage::HumanPrompt { text: text.into() }
    }

    pub fn agent_with_calls(text: impl Into<String>, tool_calls: Vec<MessageToolCall>) -> Self {
        TurnMessage::AgentReply {
            text: text.into(),
            tool_calls,
        }
    }

    /// A tool result whose outcome is inferred from its text.
    pub fn tool_result(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let text = text.into();
        TurnMessage::ToolResult {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            outcome: ToolOutcome::classify(&text),
            text,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            TurnMessage::HumanPrompt { text }
            | TurnMessage::AgentReply { text, .. }
            | TurnMessage::ToolResult { text, .. } => text,
        }
    }

    pub fn is_agent_reply(&self) -> bool {
        matches!(self, TurnMessage::AgentReply { .. })
    }

    /// The provider-facing form of this entry.
    pub fn to_message(&self) -> Message {
        match self {
            TurnMessage::HumanPrompt { text } => Message::user(text.clone()),
            TurnMessage::AgentReply { text, tool_calls } => {
                let mut msg = Message::assistant(text.clone());
                msg.tool_calls = tool_calls.clone();
                msg
            }
            TurnMessage::ToolResult { call_id, text, .. } => {
                Message::tool_result(call_id.clone(), text.clone())
            }
        }
    }
}
