//! # asploop Core
//!
//! Domain types, traits, and error definitions for the asploop
//! solver/validator loop. This crate has **no framework dependencies**: it
//! defines the domain model that the provider, tool gateway and agent crates
//! implement against.
//!
//! ## Design
//!
//! Every external collaborator (LLM backend, solver-service tools) is a trait
//! here. Implementations live in their own crates, which keeps the iteration
//! controller testable with scripted providers and in-process tools.

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;
pub mod usage;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ErrorCode, GatewayError, ProviderError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, MessageToolCall, Role, ToolOutcome, TurnMessage};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
pub use usage::UsageStats;
