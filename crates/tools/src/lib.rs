//! Tool Gateway client for asploop.
//!
//! The solver service (an MCP server wrapping an ASP solver) owns the
//! mutable program buffer. This crate connects to it over stdio, exposes its
//! operations as `asploop_core::Tool`s, and builds the per-role toolsets.

pub mod gateway;
pub mod mcp;
pub mod toolset;

pub use gateway::{GatewaySession, McpSession, McpTool, McpToolGateway, ToolGateway};
pub use mcp::{McpClient, RemoteTool};
pub use toolset::{report_missing_operations, validator_toolset, SolverOperation};
