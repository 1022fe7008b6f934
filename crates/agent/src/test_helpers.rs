//! Shared test helpers: scripted providers and an in-process solver service.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use asploop_core::error::{GatewayError, ProviderError, ToolError};
use asploop_core::message::{Message, MessageToolCall};
use asploop_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use asploop_core::tool::{Tool, ToolRegistry, ToolResult};
use asploop_tools::{GatewaySession, SolverOperation, ToolGateway};

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue.
/// Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let count = requests.len();
        if count >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                count,
                responses.len()
            );
        }
        requests.push(request);
        Ok(responses[count].clone())
    }
}

/// A provider whose every call fails with the given error.
pub struct FailingProvider {
    error: ProviderError,
}

impl FailingProvider {
    pub fn new(error: ProviderError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(self.error.clone())
    }
}

/// A provider that never answers.
pub struct PendingProvider;

#[async_trait]
impl Provider for PendingProvider {
    fn name(&self) -> &str {
        "pending_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        std::future::pending().await
    }
}

fn mock_usage() -> Option<Usage> {
    Some(Usage {
        input_tokens: 10,
        output_tokens: 5,
        total_tokens: 15,
    })
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: mock_usage(),
        model: "mock-model".into(),
    }
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(
    tool_calls: Vec<MessageToolCall>,
    thought: &str,
) -> ProviderResponse {
    let mut msg = Message::assistant(thought);
    msg.tool_calls = tool_calls;
    ProviderResponse {
        message: msg,
        usage: mock_usage(),
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{}", name),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

/// A tool that always fails with a gateway error.
pub struct FailingTool {
    name: &'static str,
    error: GatewayError,
}

impl FailingTool {
    pub fn new(name: &'static str, error: GatewayError) -> Self {
        Self { name, error }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "always fails"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        Err(self.error.clone().into())
    }
}

/// In-process stand-in for the solver service's program buffer.
#[derive(Clone, Default)]
pub struct ProgramBuffer {
    items: Arc<Mutex<Vec<String>>>,
}

impl ProgramBuffer {
    /// The buffer contents joined one statement per line.
    pub fn program(&self) -> String {
        self.items.lock().unwrap().join("\n")
    }

    /// All six solver operations bound to this buffer.
    pub fn registry(&self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for op in SolverOperation::ALL {
            registry.register(Arc::new(BufferTool {
                op,
                items: Arc::clone(&self.items),
            }));
        }
        registry
    }
}

struct BufferTool {
    op: SolverOperation,
    items: Arc<Mutex<Vec<String>>>,
}

impl BufferTool {
    fn fail(&self, reason: &str) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: self.op.tool_name().into(),
            reason: reason.into(),
        }
    }

    fn index(&self, arguments: &serde_json::Value) -> Result<usize, ToolError> {
        arguments["index"]
            .as_u64()
            .map(|i| i as usize)
            .ok_or_else(|| ToolError::InvalidArguments("index is required".into()))
    }
}

#[async_trait]
impl Tool for BufferTool {
    fn name(&self) -> &str {
        self.op.tool_name()
    }

    fn description(&self) -> &str {
        "in-process solver operation"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let mut items = self.items.lock().unwrap();
        let output = match self.op {
            SolverOperation::AddItem => {
                let item = arguments["item"].as_str().unwrap_or_default().to_string();
                items.push(item);
                format!("Item added at index {}", items.len() - 1)
            }
            SolverOperation::ReplaceItem => {
                let index = self.index(&arguments)?;
                let item = arguments["item"].as_str().unwrap_or_default().to_string();
                let slot = items.get_mut(index).ok_or_else(|| self.fail("index out of range"))?;
                *slot = item;
                format!("Item {index} replaced")
            }
            SolverOperation::RemoveItem => {
                let index = self.index(&arguments)?;
                if index >= items.len() {
                    return Err(self.fail("index out of range"));
                }
                items.remove(index);
                format!("Item {index} removed")
            }
            SolverOperation::SolveModel => {
                if items.is_empty() {
                    "Error: the program is empty".to_string()
                } else {
                    "SATISFIABLE\nAnswer: 1".to_string()
                }
            }
            SolverOperation::GetModel => items.join("\n"),
            SolverOperation::ClearModel => {
                items.clear();
                "Model cleared".to_string()
            }
        };
        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output,
        })
    }
}

/// A gateway whose sessions share one [`ProgramBuffer`] and count closes.
#[derive(Default)]
pub struct MockGateway {
    pub buffer: ProgramBuffer,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
    pub fail_open: Option<GatewayError>,
}

impl MockGateway {
    pub fn failing(error: GatewayError) -> Self {
        Self {
            fail_open: Some(error),
            ..Self::default()
        }
    }

    pub fn closes(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolGateway for MockGateway {
    async fn open_session(&self) -> Result<Box<dyn GatewaySession>, GatewayError> {
        if let Some(e) = &self.fail_open {
            return Err(e.clone());
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            tools: self.buffer.registry(),
            closed: Arc::clone(&self.closed),
        }))
    }
}

struct MockSession {
    tools: ToolRegistry,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl GatewaySession for MockSession {
    fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
