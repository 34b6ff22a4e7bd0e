//! Generic prompt-execution plug-in for LLM-backed tool definitions
//!
//! The prompt template lives in the tool definition; this plug-in fills its
//! `{placeholder}` slots from the call parameters and runs the result
//! through the LLM. Registered under the `PromptExecutionTool` dispatch key.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::catalog::{ToolDefinition, ToolKind};
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::llm::LlmClient;

use super::traits::{Tool, ToolParams, ToolResult};

/// Dispatch key for LLM-prompt tool definitions
pub const PROMPT_TOOL_NAME: &str = "PromptExecutionTool";

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{(\w+)\}").expect("valid placeholder regex"))
}

/// Stateless executor for prompt-backed tools
pub struct PromptExecutionTool {
    llm: Arc<dyn LlmClient>,
}

impl PromptExecutionTool {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        PromptExecutionTool { llm }
    }
}

/// Fill `{placeholder}` slots from the call parameters; a placeholder with
/// no matching parameter is an error naming the missing key
fn fill_template(template: &str, params: &ToolParams) -> std::result::Result<String, String> {
    let mut missing = None;
    let filled = placeholder_pattern().replace_all(template, |caps: &regex::Captures| {
        let key = &caps[1];
        match params.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => {
                missing.get_or_insert_with(|| key.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(key) => Err(key),
        None => Ok(filled.into_owned()),
    }
}

#[async_trait]
impl Tool for PromptExecutionTool {
    fn name(&self) -> &str {
        PROMPT_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Um motor de execução para ferramentas baseadas em prompts de LLM."
    }

    async fn execute(
        &self,
        params: &ToolParams,
        _context: &ExecutionContext,
        tool_def: Option<&ToolDefinition>,
    ) -> Result<ToolResult> {
        let Some(tool_def) = tool_def else {
            return Ok(ToolResult::failure(
                "Ferramenta de prompt chamada sem definição.",
            ));
        };
        let ToolKind::LlmPrompt { template } = &tool_def.kind else {
            return Ok(ToolResult::failure(format!(
                "Ferramenta '{}' não possui um template de prompt configurado.",
                tool_def.name
            )));
        };

        let prompt = match fill_template(template, params) {
            Ok(prompt) => prompt,
            Err(missing) => {
                return Ok(ToolResult::failure(format!(
                    "Erro ao formatar o prompt para '{}'. Parâmetro ausente: {}",
                    tool_def.name, missing
                )));
            }
        };

        match self.llm.generate(&prompt, None).await {
            Ok(output) => Ok(ToolResult::success(output)),
            Err(e) => Ok(ToolResult::failure(format!(
                "Ocorreu um erro ao executar o prompt na LLM: {}",
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedLlmClient;
    use serde_json::json;

    fn prompt_tool_def(template: &str) -> ToolDefinition {
        ToolDefinition {
            name: "summarizeTicket".into(),
            description: "Summarize a support ticket".into(),
            parameters: vec![],
            kind: ToolKind::LlmPrompt {
                template: template.into(),
            },
            active: true,
        }
    }

    #[tokio::test]
    async fn test_template_filled_and_executed() {
        let llm = Arc::new(ScriptedLlmClient::new(["summary text"]));
        let tool = PromptExecutionTool::new(llm.clone());

        let mut params = ToolParams::new();
        params.insert("ticket".into(), json!("printer on fire"));

        let result = tool
            .execute(
                &params,
                &ExecutionContext::default(),
                Some(&prompt_tool_def("Resuma o chamado: {ticket}")),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output, json!("summary text"));
        assert_eq!(llm.prompts()[0], "Resuma o chamado: printer on fire");
    }

    #[tokio::test]
    async fn test_missing_placeholder_param_fails() {
        let tool = PromptExecutionTool::new(Arc::new(ScriptedLlmClient::new(["unused"])));

        let result = tool
            .execute(
                &ToolParams::new(),
                &ExecutionContext::default(),
                Some(&prompt_tool_def("Resuma: {ticket}")),
            )
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.output.as_str().unwrap().contains("ticket"));
    }
}
