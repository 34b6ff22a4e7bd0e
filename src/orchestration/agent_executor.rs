//! Agent executor: parameter validation, dispatch-key selection, and
//! plug-in invocation
//!
//! Nothing escapes this layer as an error: every failure mode — unknown
//! tool, missing parameters, unregistered plug-in, plug-in panic-adjacent
//! errors — comes back as a `ToolResult` the reason-act loop can observe.

use std::sync::Arc;

use tracing::{info, warn};

use crate::catalog::{AgentDefinition, ToolDefinition, ToolKind};
use crate::context::ExecutionContext;
use crate::tools::{ToolParams, ToolRegistry, ToolResult, API_TOOL_NAME, PROMPT_TOOL_NAME};

/// Validates and dispatches one tool invocation on behalf of an agent
#[derive(Clone)]
pub struct AgentExecutor {
    registry: Arc<ToolRegistry>,
}

impl AgentExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        AgentExecutor { registry }
    }

    /// Execute `tool_name` as declared on `agent` with the given parameters
    pub async fn execute(
        &self,
        agent: &AgentDefinition,
        tool_name: &str,
        params: &ToolParams,
        context: &ExecutionContext,
    ) -> ToolResult {
        if tool_name.is_empty() {
            return ToolResult::failure("Agente ou ferramenta inválidos");
        }

        info!(
            agent_id = %agent.agent_id,
            tool = tool_name,
            "agent executing tool"
        );

        let Some(tool_def) = agent.tools.iter().find(|t| t.name == tool_name) else {
            return ToolResult::failure("Agente ou ferramenta inválidos");
        };

        // Mandatory-parameter validation
        let missing: Vec<String> = tool_def
            .required_param_names()
            .into_iter()
            .filter(|name| !params.contains_key(*name))
            .map(String::from)
            .collect();

        if !missing.is_empty() {
            return ToolResult::request_user_input(
                missing.clone(),
                format!(
                    "Parâmetros necessários para a ferramenta '{}': {}",
                    tool_name,
                    missing.join(", ")
                ),
            );
        }

        let dispatch_key = dispatch_key(tool_def);
        let Some(plugin) = self.registry.get(dispatch_key) else {
            return ToolResult::failure(format!(
                "Implementação '{}' não encontrada no registro",
                dispatch_key
            ));
        };

        // Definition-driven plug-ins receive the tool definition; native
        // tools do not
        let definition = match tool_def.kind {
            ToolKind::Api(_) | ToolKind::LlmPrompt { .. } => Some(tool_def),
            ToolKind::Native => None,
        };

        match plugin.execute(params, context, definition).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = tool_name, "tool execution failed: {}", e);
                ToolResult::failure(format!(
                    "Erro na execução da ferramenta '{}': {}",
                    tool_name, e
                ))
            }
        }
    }
}

/// Select the registry key for a tool definition: the generic engines for
/// definition-driven kinds, the tool's own name for native tools
fn dispatch_key(tool_def: &ToolDefinition) -> &str {
    match tool_def.kind {
        ToolKind::LlmPrompt { .. } => PROMPT_TOOL_NAME,
        ToolKind::Api(_) => API_TOOL_NAME,
        ToolKind::Native => tool_def.name.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ParameterSpec;
    use crate::error::Result;
    use crate::tools::{NextStep, Tool};
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "sendEmail"
        }

        fn description(&self) -> &str {
            "echoes its params"
        }

        async fn execute(
            &self,
            params: &ToolParams,
            _context: &ExecutionContext,
            _tool_def: Option<&ToolDefinition>,
        ) -> Result<ToolResult> {
            Ok(ToolResult::success(json!({"sent": params.clone()})))
        }
    }

    fn agent_with_send_email() -> AgentDefinition {
        AgentDefinition {
            agent_id: "MailAgent".into(),
            description: "Sends email".into(),
            active: true,
            tools: vec![ToolDefinition {
                name: "sendEmail".into(),
                description: "Send an email".into(),
                parameters: vec![
                    ParameterSpec {
                        name: "recipient".into(),
                        type_tag: "string".into(),
                        description: String::new(),
                        required: true,
                    },
                    ParameterSpec {
                        name: "subject".into(),
                        type_tag: "string".into(),
                        description: String::new(),
                        required: true,
                    },
                ],
                kind: ToolKind::Native,
                active: true,
            }],
            response_guideline: None,
        }
    }

    fn executor() -> AgentExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        AgentExecutor::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_missing_params_request_user_input() {
        let executor = executor();
        let agent = agent_with_send_email();
        let context = ExecutionContext::default();

        let mut params = ToolParams::new();
        params.insert("subject".into(), json!("Meeting"));

        let result = executor
            .execute(&agent, "sendEmail", &params, &context)
            .await;

        assert!(!result.success);
        assert_eq!(result.next_step, Some(NextStep::RequestUserInput));
        assert_eq!(result.required_params, vec!["recipient"]);
        assert!(result.output.as_str().unwrap().contains("recipient"));
    }

    #[tokio::test]
    async fn test_supplying_missing_params_completes() {
        // parameter-validation idempotence: adding the missing set yields a
        // non-input-requesting result
        let executor = executor();
        let agent = agent_with_send_email();
        let context = ExecutionContext::default();

        let mut params = ToolParams::new();
        params.insert("subject".into(), json!("Meeting"));
        params.insert("recipient".into(), json!("bob@example.com"));

        let result = executor
            .execute(&agent, "sendEmail", &params, &context)
            .await;

        assert!(result.success);
        assert!(result.next_step.is_none());
    }

    #[tokio::test]
    async fn test_unknown_tool_on_agent() {
        let executor = executor();
        let agent = agent_with_send_email();
        let result = executor
            .execute(
                &agent,
                "unknownTool",
                &ToolParams::new(),
                &ExecutionContext::default(),
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.output, json!("Agente ou ferramenta inválidos"));
    }

    #[tokio::test]
    async fn test_unregistered_plugin() {
        // agent declares a native tool no plug-in provides
        let executor = executor();
        let mut agent = agent_with_send_email();
        agent.tools[0].name = "ghostTool".into();
        agent.tools[0].parameters.clear();

        let result = executor
            .execute(
                &agent,
                "ghostTool",
                &ToolParams::new(),
                &ExecutionContext::default(),
            )
            .await;

        assert!(!result.success);
        assert!(result.output.as_str().unwrap().contains("ghostTool"));
    }

    #[test]
    fn test_dispatch_key_selection() {
        let mut tool = ToolDefinition {
            name: "anything".into(),
            description: String::new(),
            parameters: vec![],
            kind: ToolKind::Native,
            active: true,
        };
        assert_eq!(dispatch_key(&tool), "anything");

        tool.kind = ToolKind::LlmPrompt {
            template: "t".into(),
        };
        assert_eq!(dispatch_key(&tool), PROMPT_TOOL_NAME);
    }
}
