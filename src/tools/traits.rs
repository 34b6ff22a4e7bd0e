//! Core tool trait and result types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::ToolDefinition;
use crate::context::ExecutionContext;
use crate::error::Result;

/// Call parameters as a JSON object
pub type ToolParams = Map<String, Value>;

/// What the caller should do after a tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NextStep {
    Continue,
    Repeat,
    RequestUserInput,
}

/// Result of a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step: Option<NextStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_params: Vec<String>,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(output: impl Into<Value>) -> Self {
        ToolResult {
            success: true,
            output: output.into(),
            next_step: None,
            required_params: Vec::new(),
        }
    }

    /// Create a failed result
    pub fn failure(message: impl Into<String>) -> Self {
        ToolResult {
            success: false,
            output: Value::String(message.into()),
            next_step: None,
            required_params: Vec::new(),
        }
    }

    /// Create a result that suspends execution for user-supplied parameters
    pub fn request_user_input(
        required_params: Vec<String>,
        message: impl Into<String>,
    ) -> Self {
        ToolResult {
            success: false,
            output: Value::String(message.into()),
            next_step: Some(NextStep::RequestUserInput),
            required_params,
        }
    }

    /// Whether this result suspends execution for user input
    pub fn requires_user_input(&self) -> bool {
        self.next_step == Some(NextStep::RequestUserInput)
    }
}

/// A callable capability dispatched by the agent executor.
///
/// Definition-driven plug-ins (the API and prompt engines) receive the
/// `ToolDefinition` they are executing; native tools are passed `None` and
/// must ignore the argument.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Registration key in the tool registry
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// Parameters the plug-in itself requires (definition-driven plug-ins
    /// declare none; their requirements come from the tool definition)
    fn mandatory_params(&self) -> &[&str] {
        &[]
    }

    /// Execute the tool
    async fn execute(
        &self,
        params: &ToolParams,
        context: &ExecutionContext,
        tool_def: Option<&ToolDefinition>,
    ) -> Result<ToolResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_result_constructors() {
        let ok = ToolResult::success(json!({"temp": 27}));
        assert!(ok.success);
        assert!(!ok.requires_user_input());

        let failed = ToolResult::failure("boom");
        assert!(!failed.success);
        assert_eq!(failed.output, json!("boom"));

        let pending = ToolResult::request_user_input(vec!["recipient".into()], "need more");
        assert!(pending.requires_user_input());
        assert_eq!(pending.required_params, vec!["recipient"]);
    }

    #[test]
    fn test_next_step_wire_format() {
        let json = serde_json::to_value(NextStep::RequestUserInput).unwrap();
        assert_eq!(json, "REQUEST_USER_INPUT");
    }
}
