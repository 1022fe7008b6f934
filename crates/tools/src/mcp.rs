//! MCP client for the solver service.
//!
//! Speaks JSON-RPC 2.0 over the stdio of a spawned server process: one
//! request per line, responses matched by id. Server notifications and
//! stray lines are skipped while waiting for a response.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use asploop_config::McpServerConfig;
use asploop_core::GatewayError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP JSON-RPC request.
#[derive(Debug, Serialize)]
struct McpRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

/// MCP JSON-RPC response.
#[derive(Debug, Deserialize)]
struct McpResponse {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<McpErrorObject>,
}

/// MCP error object.
#[derive(Debug, Deserialize)]
struct McpErrorObject {
    code: i64,
    message: String,
}

/// A tool advertised by the server in `tools/list`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "empty_schema", rename = "inputSchema")]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

/// MCP server process handle.
struct McpProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// A live session with one solver server process.
pub struct McpClient {
    name: String,
    process: Mutex<Option<McpProcess>>,
    request_id: AtomicU64,
}

impl McpClient {
    /// Spawn the server and complete the MCP handshake.
    pub async fn connect(config: &McpServerConfig) -> Result<Self, GatewayError> {
        info!(
            server = %config.name,
            command = %config.command,
            args = ?config.args,
            "Starting solver server"
        );

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| GatewayError::Spawn {
                command: config.command.clone(),
                reason: e.to_string(),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| GatewayError::Spawn {
            command: config.command.clone(),
            reason: "failed to capture stdin".into(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| GatewayError::Spawn {
            command: config.command.clone(),
            reason: "failed to capture stdout".into(),
        })?;

        let client = Self {
            name: config.name.clone(),
            process: Mutex::new(Some(McpProcess {
                child,
                stdin,
                stdout: BufReader::new(stdout),
            })),
            request_id: AtomicU64::new(0),
        };

        if let Err(e) = client.initialize().await {
            client.close().await;
            return Err(e);
        }

        Ok(client)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the server process is still attached.
    pub async fn is_connected(&self) -> bool {
        self.process.lock().await.is_some()
    }

    async fn initialize(&self) -> Result<(), GatewayError> {
        let result = self
            .call_method(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "asploop",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            )
            .await?;

        if let Some(server) = result.get("serverInfo") {
            debug!(server = %server, "Solver server initialized");
        }

        self.send_notification("notifications/initialized", json!({}))
            .await
    }

    /// Fetch the server's tool catalogue.
    pub async fn list_tools(&self) -> Result<Vec<RemoteTool>, GatewayError> {
        let result = self.call_method("tools/list", json!({})).await?;
        let tools = result.get("tools").cloned().unwrap_or_else(|| json!([]));
        serde_json::from_value(tools)
            .map_err(|e| GatewayError::Protocol(format!("invalid tools/list result: {e}")))
    }

    /// Invoke a tool and return its text output.
    ///
    /// Server-side failures come back as text starting with `Error:` so the
    /// calling agent can read them. Only transport faults are `Err`.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, GatewayError> {
        let arguments = if arguments.is_null() { json!({}) } else { arguments };
        let outcome = self
            .call_method("tools/call", json!({ "name": name, "arguments": arguments }))
            .await;

        match outcome {
            Ok(result) => Ok(tool_result_text(&result)),
            Err(GatewayError::Remote { code, message }) => {
                warn!(tool = %name, code, message = %message, "Solver server rejected tool call");
                Ok(format!("Error: {message}"))
            }
            Err(e) => Err(e),
        }
    }

    /// Kill and reap the server process. Safe to call more than once.
    pub async fn close(&self) {
        let mut guard = self.process.lock().await;
        if let Some(mut process) = guard.take() {
            drop(process.stdin);
            if let Err(e) = process.child.kill().await {
                debug!(error = %e, "Solver server already exited");
            }
            info!(server = %self.name, "Solver server session closed");
        }
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    async fn call_method(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let id = self.next_id();
        let request = McpRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let line = serde_json::to_string(&request)
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        let mut guard = self.process.lock().await;
        let process = guard.as_mut().ok_or(GatewayError::NotConnected)?;

        trace!(method, id, "-> solver server");
        write_line(&mut process.stdin, &line).await?;

        loop {
            let mut buf = String::new();
            let read = process
                .stdout
                .read_line(&mut buf)
                .await
                .map_err(|e| GatewayError::ConnectionClosed(format!("read failed: {e}")))?;
            if read == 0 {
                return Err(GatewayError::ConnectionClosed(format!(
                    "server closed stdout while waiting for '{method}'"
                )));
            }

            let trimmed = buf.trim();
            if trimmed.is_empty() {
                continue;
            }

            let response: McpResponse = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(_) => {
                    trace!(line = %trimmed, "Skipping non JSON-RPC output");
                    continue;
                }
            };

            // Notifications and responses to other requests
            if response.id.as_ref().and_then(Value::as_u64) != Some(id) {
                continue;
            }

            if let Some(error) = response.error {
                return Err(GatewayError::Remote {
                    code: error.code,
                    message: error.message,
                });
            }

            return Ok(response.result.unwrap_or(Value::Null));
        }
    }

    async fn send_notification(&self, method: &str, params: Value) -> Result<(), GatewayError> {
        let notification = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        });
        let line = serde_json::to_string(&notification)
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        let mut guard = self.process.lock().await;
        let process = guard.as_mut().ok_or(GatewayError::NotConnected)?;
        write_line(&mut process.stdin, &line).await
    }
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> Result<(), GatewayError> {
    let closed = |e: std::io::Error| GatewayError::ConnectionClosed(format!("write failed: {e}"));
    stdin.write_all(line.as_bytes()).await.map_err(closed)?;
    stdin.write_all(b"\n").await.map_err(closed)?;
    stdin.flush().await.map_err(closed)
}

/// Concatenate the text parts of a `tools/call` result.
fn tool_result_text(result: &Value) -> String {
    let text = result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    let is_error = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if is_error && !text.starts_with("Error") {
        format!("Error: {text}")
    } else {
        text
    }
}
