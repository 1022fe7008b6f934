//! Role toolsets: which solver operations each agent may call.

use asploop_core::ToolRegistry;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The operations a solver service is expected to offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverOperation {
    AddItem,
    ReplaceItem,
    RemoveItem,
    SolveModel,
    GetModel,
    ClearModel,
}

impl SolverOperation {
    pub const ALL: [SolverOperation; 6] = [
        SolverOperation::AddItem,
        SolverOperation::ReplaceItem,
        SolverOperation::RemoveItem,
        SolverOperation::SolveModel,
        SolverOperation::GetModel,
        SolverOperation::ClearModel,
    ];

    pub fn tool_name(&self) -> &'static str {
        match self {
            SolverOperation::AddItem => "add_item",
            SolverOperation::ReplaceItem => "replace_item",
            SolverOperation::RemoveItem => "remove_item",
            SolverOperation::SolveModel => "solve_model",
            SolverOperation::GetModel => "get_model",
            SolverOperation::ClearModel => "clear_model",
        }
    }

    pub fn from_tool_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.tool_name() == name)
    }
}

/// Warn about expected operations the service did not advertise.
pub fn report_missing_operations(tools: &ToolRegistry) -> Vec<SolverOperation> {
    let missing: Vec<SolverOperation> = SolverOperation::ALL
        .into_iter()
        .filter(|op| tools.get(op.tool_name()).is_none())
        .collect();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|op| op.tool_name()).collect();
        warn!(missing = ?names, "Solver service lacks expected operations");
    }
    missing
}

/// The validator's restricted view of the session tools.
///
/// Names the session does not offer are skipped with a warning.
pub fn validator_toolset<S: AsRef<str>>(all: &ToolRegistry, names: &[S]) -> ToolRegistry {
    for name in names {
        if all.get(name.as_ref()).is_none() {
            warn!(tool = %name.as_ref(), "Validator tool not offered by solver service, ignoring");
        }
    }
    all.subset(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use asploop_core::{Tool, ToolError, ToolResult};
    use std::sync::Arc;

    struct Named(&'static str);

    #[async_trait]
    impl Tool for Named {
        fn name(&self) -> &str { self.0 }
        fn description(&self) -> &str { "" }
        fn parameters_schema(&self) -> serde_json::Value { serde_json::json!({"type": "object"}) }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult { call_id: String::new(), success: true, output: String::new() })
        }
    }

    fn full_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for op in SolverOperation::ALL {
            registry.register(Arc::new(Named(op.tool_name())));
        }
        registry
    }

    #[test]
    fn operation_names_round_trip() {
        for op in SolverOperation::ALL {
            assert_eq!(SolverOperation::from_tool_name(op.tool_name()), Some(op));
        }
        assert_eq!(SolverOperation::from_tool_name("teleport"), None);
    }

    #[test]
    fn validator_gets_only_configured_tools() {
        let validator = validator_toolset(&full_registry(), &["solve_model", "get_model", "fly"]);
        assert_eq!(validator.names(), vec!["get_model", "solve_model"]);
    }

    #[test]
    fn missing_operations_reported() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Named("solve_model")));
        let missing = report_missing_operations(&registry);
        assert_eq!(missing.len(), 5);
        assert!(report_missing_operations(&full_registry()).is_empty());
    }
}
