//! Tool Gateway: session-scoped access to the solver service's operations.
//!
//! A [`ToolGateway`] opens one [`GatewaySession`] per problem. The session
//! exposes the remote operations as [`Tool`]s and must be closed when the
//! problem is done, whatever the outcome.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use asploop_config::McpServerConfig;
use asploop_core::{GatewayError, Tool, ToolError, ToolOutcome, ToolRegistry, ToolResult};
use tracing::{debug, info};

use crate::mcp::{McpClient, RemoteTool};

/// Opens isolated solver-service sessions.
#[async_trait]
pub trait ToolGateway: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn GatewaySession>, GatewayError>;
}

/// One open connection to the solver service.
#[async_trait]
pub trait GatewaySession: Send + Sync {
    /// Every operation the service offers.
    fn tools(&self) -> &ToolRegistry;

    /// Release the connection. Must be idempotent.
    async fn close(&self);
}

/// Gateway that launches the configured MCP server for every session.
pub struct McpToolGateway {
    config: McpServerConfig,
}

impl McpToolGateway {
    pub fn new(config: McpServerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ToolGateway for McpToolGateway {
    async fn open_session(&self) -> Result<Box<dyn GatewaySession>, GatewayError> {
        let client = Arc::new(McpClient::connect(&self.config).await?);

        let remote = match client.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                client.close().await;
                return Err(e);
            }
        };

        let mut tools = ToolRegistry::new();
        for tool in remote {
            tools.register(Arc::new(McpTool::new(Arc::clone(&client), tool)));
        }
        info!(
            server = %self.config.name,
            count = tools.len(),
            tools = ?tools.names(),
            "Loaded solver tools"
        );

        Ok(Box::new(McpSession { client, tools }))
    }
}

/// An open MCP session and the tools bound to it.
pub struct McpSession {
    client: Arc<McpClient>,
    tools: ToolRegistry,
}

#[async_trait]
impl GatewaySession for McpSession {
    fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    async fn close(&self) {
        self.client.close().await;
    }
}

/// A remote solver operation exposed as a local [`Tool`].
pub struct McpTool {
    client: Arc<McpClient>,
    name: String,
    description: String,
    schema: serde_json::Value,
}

impl McpTool {
    pub fn new(client: Arc<McpClient>, remote: RemoteTool) -> Self {
        Self {
            client,
            description: remote.description.unwrap_or_else(|| remote.name.clone()),
            name: remote.name,
            schema: remote.input_schema,
        }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.schema.clone()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let start = Instant::now();
        let output = self.client.call_tool(&self.name, arguments).await?;
        debug!(
            tool = %self.name,
            duration_ms = start.elapsed().as_millis() as u64,
            "Solver operation returned"
        );

        Ok(ToolResult {
            call_id: String::new(),
            success: ToolOutcome::classify(&output) == ToolOutcome::Success,
            output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_server_fails_to_open() {
        let gateway = McpToolGateway::new(McpServerConfig {
            command: "definitely-not-a-real-mcp-server".into(),
            args: vec![],
            name: "missing".into(),
        });
        let err = gateway.open_session().await.err().unwrap();
        assert!(matches!(err, GatewayError::Spawn { .. }));
    }

    #[tokio::test]
    async fn session_exposes_remote_tools() {
        let init = r#"{"jsonrpc":"2.0","id":1,"result":{}}"#;
        let list = r#"{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"get_model"},{"name":"solve_model","description":"Run clingo"}]}}"#;
        let call = r#"{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"Error: unsafe variable"}]}}"#;
        let script = format!(
            "read line\nprintf '%s\\n' '{init}'\nread line\nread line\nprintf '%s\\n' '{list}'\nread line\nprintf '%s\\n' '{call}'\nsleep 1\n"
        );
        let gateway = McpToolGateway::new(McpServerConfig {
            command: "sh".into(),
            args: vec!["-c".into(), script],
            name: "scripted".into(),
        });

        let session = gateway.open_session().await.unwrap();
        assert_eq!(session.tools().names(), vec!["get_model", "solve_model"]);
        let solve = session.tools().get("solve_model").unwrap();
        assert_eq!(solve.description(), "Run clingo");

        let result = solve.execute(serde_json::json!({})).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.output, "Error: unsafe variable");

        session.close().await;
        session.close().await;
    }
}
