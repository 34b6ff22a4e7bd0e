//! Capability-listing native tool
//!
//! Inspects the execution context and renders the non-system managers as a
//! human-readable bullet list.

use async_trait::async_trait;

use crate::catalog::{ToolDefinition, LIST_CAPABILITIES_TOOL};
use crate::context::ExecutionContext;
use crate::error::Result;

use super::traits::{Tool, ToolParams, ToolResult};

/// Lists the public capabilities available to the current user
pub struct ListCapabilitiesTool;

#[async_trait]
impl Tool for ListCapabilitiesTool {
    fn name(&self) -> &str {
        LIST_CAPABILITIES_TOOL
    }

    fn description(&self) -> &str {
        "Lista e descreve as principais capacidades e ferramentas disponíveis para ajudar o usuário."
    }

    async fn execute(
        &self,
        _params: &ToolParams,
        context: &ExecutionContext,
        _tool_def: Option<&ToolDefinition>,
    ) -> Result<ToolResult> {
        let public_managers: Vec<_> = context
            .available_managers
            .iter()
            .filter(|m| !m.is_system_tool)
            .collect();

        if public_managers.is_empty() {
            return Ok(ToolResult::success(
                "No momento, não tenho ferramentas específicas disponíveis.",
            ));
        }

        let mut lines = vec!["Claro! Eu posso te ajudar com as seguintes capacidades:".to_string()];
        for manager in public_managers {
            lines.push(format!("\n- **{}**:", manager.description));
            for agent in &manager.agents {
                for tool in &agent.tools {
                    lines.push(format!("  - {}", tool.description));
                }
            }
        }

        Ok(ToolResult::success(lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{meta_manager, AgentDefinition, ManagerDefinition, ToolKind};

    fn public_manager(description: &str, tool_description: &str) -> ManagerDefinition {
        ManagerDefinition {
            manager_id: "WeatherManager".into(),
            description: description.into(),
            active: true,
            agents: vec![AgentDefinition {
                agent_id: "WeatherAgent".into(),
                description: "Forecast specialist".into(),
                active: true,
                tools: vec![ToolDefinition {
                    name: "getWeather".into(),
                    description: tool_description.into(),
                    parameters: vec![],
                    kind: ToolKind::Native,
                    active: true,
                }],
                response_guideline: None,
            }],
            is_system_tool: false,
        }
    }

    #[tokio::test]
    async fn test_lists_only_public_managers() {
        let mut context = ExecutionContext::new("s1", "alice", "what can you do?");
        context.available_managers = vec![
            meta_manager(),
            public_manager("Previsão do tempo", "Consulta a previsão por cidade"),
        ];

        let result = ListCapabilitiesTool
            .execute(&ToolParams::new(), &context, None)
            .await
            .unwrap();

        let output = result.output.as_str().unwrap();
        assert!(output.contains("Previsão do tempo"));
        assert!(output.contains("Consulta a previsão por cidade"));
        assert!(!output.contains("SYS_META_MANAGER"));
        assert!(!output.contains("listar capacidades"));
    }

    #[tokio::test]
    async fn test_no_public_managers() {
        let mut context = ExecutionContext::new("s1", "alice", "help");
        context.available_managers = vec![meta_manager()];

        let result = ListCapabilitiesTool
            .execute(&ToolParams::new(), &context, None)
            .await
            .unwrap();

        assert!(result
            .output
            .as_str()
            .unwrap()
            .contains("não tenho ferramentas específicas"));
    }
}
