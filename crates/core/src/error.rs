//! Error types for the asploop domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Each collaborator
//! (provider, tool, gateway) has its own error enum; [`ErrorCode`] is the
//! flat taxonomy surfaced in session outcomes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all asploop operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Solver service errors ---
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    // --- Input files ---
    #[error("File error: {0}")]
    File(String),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Controller safety valve ---
    #[error("Step limit exceeded: {0}")]
    StepLimit(String),

    #[error("Execution stopped by user")]
    Cancelled,

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The outcome code this error is reported under.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Provider(e) => e.code(),
            Error::Tool(e) => e.code(),
            Error::Gateway(e) => e.code(),
            Error::File(_) => ErrorCode::FileError,
            Error::StepLimit(_) => ErrorCode::GraphError,
            Error::Cancelled => ErrorCode::UserStopped,
            other => classify_message(&other.to_string()),
        }
    }

    /// True when the solver service connection went away mid-turn.
    pub fn is_connection_closed(&self) -> bool {
        matches!(
            self,
            Error::Gateway(GatewayError::ConnectionClosed(_))
                | Error::Tool(ToolError::Gateway(GatewayError::ConnectionClosed(_)))
        )
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ProviderError::ModelNotFound(_) => ErrorCode::ModelNotFound,
            ProviderError::AuthenticationFailed(_) => ErrorCode::Auth,
            ProviderError::Timeout(_) => ErrorCode::Timeout,
            other => classify_message(&other.to_string()),
        }
    }

    /// Whether this error says the requested model identifier is unknown.
    pub fn indicates_missing_model(&self) -> bool {
        matches!(self, ProviderError::ModelNotFound(_))
            || mentions_missing_model(&self.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ToolError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ToolError::Gateway(e) => e.code(),
            other => classify_message(&other.to_string()),
        }
    }

    /// A closed transport is the one tool failure a turn cannot absorb.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, ToolError::Gateway(GatewayError::ConnectionClosed(_)))
    }
}

/// Errors talking to the solver service over its session connection.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Failed to start solver server '{command}': {reason}")]
    Spawn { command: String, reason: String },

    #[error("Solver server connection closed: {0}")]
    ConnectionClosed(String),

    #[error("Solver server protocol error: {0}")]
    Protocol(String),

    #[error("Solver server error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("Solver server session is not open")]
    NotConnected,
}

impl GatewayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::ConnectionClosed(_) => ErrorCode::McpConnectionClosed,
            _ => ErrorCode::McpError,
        }
    }
}

/// Terminal outcome codes, serialised as the strings callers match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    FileError,
    McpError,
    McpConnectionClosed,
    RuntimeError,
    ModelNotFound,
    Auth,
    GraphError,
    ValidationError,
    Timeout,
    MaxIter,
    UserStopped,
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::FileError => "FILE_ERROR",
            ErrorCode::McpError => "MCP_ERROR",
            ErrorCode::McpConnectionClosed => "MCP_CONNECTION_CLOSED",
            ErrorCode::RuntimeError => "RUNTIME_ERROR",
            ErrorCode::ModelNotFound => "MODEL_NOT_FOUND",
            ErrorCode::Auth => "AUTH",
            ErrorCode::GraphError => "GRAPH_ERROR",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::MaxIter => "MAX_ITER",
            ErrorCode::UserStopped => "USER_STOPPED",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `("404" or "not found") and "model"`, case-insensitive.
pub fn mentions_missing_model(message: &str) -> bool {
    let lowered = message.to_lowercase();
    (lowered.contains("404") || lowered.contains("not found")) && lowered.contains("model")
}

/// Best-effort keyword classification of an unstructured error message.
pub fn classify_message(message: &str) -> ErrorCode {
    let lowered = message.to_lowercase();

    if ["unauthorized", "invalid api key", "401", "403"]
        .iter()
        .any(|k| lowered.contains(k))
    {
        return ErrorCode::Auth;
    }

    if mentions_missing_model(&lowered) {
        return ErrorCode::ModelNotFound;
    }

    if ["file not found", "no such file", "cannot open"]
        .iter()
        .any(|k| lowered.contains(k))
    {
        return ErrorCode::FileError;
    }

    if lowered.contains("mcp") || lowered.contains("server") {
        return ErrorCode::McpError;
    }

    ErrorCode::Unknown
}

/// Display text of the innermost error in a `source()` chain.
pub fn root_cause(error: &(dyn std::error::Error + 'static)) -> String {
    let mut current = error;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}
