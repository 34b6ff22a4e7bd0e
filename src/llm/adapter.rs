//! Structured LLM adapter
//!
//! Turns free-text model output into the three structured operations the
//! engine needs: the delegation decision, one reason-act step, and the final
//! consolidated response. Parsing is total — a response the model mangles
//! degrades to a safe default instead of failing the execution.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::catalog::{simplified_catalog, ManagerDefinition};
use crate::context::ExecutionContext;
use crate::error::Result;

use super::client::LlmClient;
use super::templates::{self, PromptSet};

/// Fallback when the delegator response cannot be parsed
const DELEGATOR_PARSE_APOLOGY: &str =
    "Desculpe, tive um problema ao decidir o que fazer a seguir. Tente novamente.";

/// One prior message of the session, rendered into the delegator prompt
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: String,
    pub message: String,
}

/// The delegator's decision for the next orchestration step
#[derive(Debug, Clone, Deserialize)]
pub struct NextActionPlan {
    #[serde(default)]
    pub decision: String,
    #[serde(default)]
    pub thought: Option<String>,
    #[serde(default)]
    pub manager_id: Option<String>,
    #[serde(default)]
    pub new_question: Option<String>,
    #[serde(default)]
    pub final_answer: Option<String>,
}

impl NextActionPlan {
    fn apology() -> Self {
        NextActionPlan {
            decision: "final_answer".to_string(),
            thought: None,
            manager_id: None,
            new_question: None,
            final_answer: Some(DELEGATOR_PARSE_APOLOGY.to_string()),
        }
    }
}

/// One parsed reason-act step; absent sections are empty strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactStep {
    pub thought: String,
    pub action: String,
    pub final_answer: String,
}

/// Renders prompts and parses structured output out of free text
pub struct LlmAdapter {
    client: Arc<dyn LlmClient>,
    prompts: PromptSet,
}

impl LlmAdapter {
    pub fn new(client: Arc<dyn LlmClient>, prompts: PromptSet) -> Self {
        LlmAdapter { client, prompts }
    }

    /// The model id behind this adapter
    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Raw generation under the default system instruction (used by the
    /// prompt-execution tool and the conversation summarizer)
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        self.client
            .generate(prompt, Some(self.prompts.system_instruction()))
            .await
    }

    /// Ask the delegator for the next orchestration step.
    ///
    /// Never fails: an unreachable model or unparseable response is coerced
    /// into a `final_answer` decision carrying an apology.
    pub async fn decide_next_manager_action(
        &self,
        context: &ExecutionContext,
        chat_history: &[ChatTurn],
    ) -> NextActionPlan {
        let catalog = simplified_catalog(&context.available_managers);
        let data = json!({
            "user_id": context.user_id,
            "chat_history": format_chat_history(chat_history),
            "user_input": context.user_question,
            "available_managers": pretty_json(&catalog),
            "previous_results": pretty_json(&context.previous_results),
            "react_history": format_history(&context.react_history),
            "current_date": Utc::now().format("%d/%m/%Y %H:%M").to_string(),
        });

        let prompt = match self.prompts.render(templates::DELEGATOR, &data) {
            Ok(prompt) => prompt,
            Err(e) => {
                error!("failed to render delegator prompt: {}", e);
                return NextActionPlan::apology();
            }
        };

        let response = match self
            .client
            .generate(
                &prompt,
                Some("Você é um orquestrador de IA que responde em JSON."),
            )
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("delegator LLM call failed: {}", e);
                return NextActionPlan::apology();
            }
        };

        match extract_json_object(&response)
            .and_then(|raw| serde_json::from_str::<NextActionPlan>(raw).ok())
        {
            Some(plan) => plan,
            None => {
                error!("failed to decode delegator JSON: {}", response);
                NextActionPlan::apology()
            }
        }
    }

    /// Run one reason-act cycle for a manager and parse the labeled sections
    pub async fn react_cycle(
        &self,
        user_id: &str,
        manager: &ManagerDefinition,
        context: &ExecutionContext,
        history: &[String],
        original_question: &str,
    ) -> Result<ReactStep> {
        let data = json!({
            "user_id": user_id,
            "manager_id": manager.manager_id,
            "manager_description": manager.description,
            "step_objective": context.user_question,
            "original_user_question": original_question,
            "previous_results": pretty_json(&context.previous_results),
            "history": format_history(history),
            "available_tools": format_manager_tools(manager),
            "current_date": Utc::now().format("%d/%m/%Y %H:%M").to_string(),
        });

        let prompt = self.prompts.render(templates::REACT_CYCLE, &data)?;
        let response = self
            .client
            .generate(&prompt, Some(self.prompts.system_instruction()))
            .await?;

        debug!(manager_id = %manager.manager_id, "react response: {}", response);
        Ok(parse_react_response(&response))
    }

    /// Synthesize the final user-facing response from the raw tool results,
    /// the reasoning history, and the per-agent formatting guidelines
    pub async fn consolidate_final_response(
        &self,
        context: &ExecutionContext,
        formatting_guidelines: &[String],
    ) -> Result<String> {
        let guidelines_section = if formatting_guidelines.is_empty() {
            String::new()
        } else {
            format!(
                "### 📜 Regras de Formatação Obrigatórias\n\
                 Para construir a resposta final, você DEVE seguir estas regras de formatação para as informações correspondentes:\n- {}",
                formatting_guidelines.join("\n- ")
            )
        };

        let data = json!({
            "user_question": context.user_question,
            "previous_results": pretty_json(&context.previous_results),
            "react_history": context.react_history.join("\n"),
            "guidelines_section": guidelines_section,
        });

        let prompt = self.prompts.render(templates::FINAL_RESPONSE, &data)?;
        let response = self
            .client
            .generate(&prompt, Some(self.prompts.system_instruction()))
            .await?;
        Ok(response.trim().to_string())
    }
}

fn pretty_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

fn format_chat_history(history: &[ChatTurn]) -> String {
    if history.is_empty() {
        return "Nenhuma mensagem anterior.".to_string();
    }
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.message))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_history(history: &[String]) -> String {
    if history.is_empty() {
        "Nenhum histórico de raciocínio ainda.".to_string()
    } else {
        history.join("\n")
    }
}

/// Format a manager's active tools grouped by agent, for the react prompt
fn format_manager_tools(manager: &ManagerDefinition) -> String {
    let mut lines = Vec::new();

    for agent in &manager.agents {
        if !agent.active {
            continue;
        }

        let tool_lines: Vec<String> = agent
            .tools
            .iter()
            .filter(|t| t.active)
            .map(|t| {
                let params = t
                    .parameters
                    .iter()
                    .map(|p| format!("{}: {}", p.name, p.type_tag))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("  - {}({}): {}", t.name, params, t.description)
            })
            .collect();

        if !tool_lines.is_empty() {
            lines.push(format!("Agente: {} ({})", agent.agent_id, agent.description));
            lines.extend(tool_lines);
        }
    }

    lines.join("\n")
}

/// Extract the first balanced `{…}` object from free text, honoring strings
/// and escapes. Returns `None` when no balanced object exists.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse a reason-act response by locating the `[THOUGHT]:`, `[ACTION]:`,
/// and `[FINAL_ANSWER]:` labels case-insensitively, in any order. Missing
/// sections become empty strings; this parser never fails.
///
/// Each section runs from its label to the next occurrence of one of the
/// *other* two labels (or end of text) — a repeat of the same label is part
/// of the section's content, not a boundary.
pub fn parse_react_response(response: &str) -> ReactStep {
    let step = ReactStep {
        thought: extract_section(response, "[THOUGHT]:", &["[ACTION]", "[FINAL_ANSWER]"]),
        action: extract_section(response, "[ACTION]:", &["[THOUGHT]", "[FINAL_ANSWER]"]),
        final_answer: extract_section(response, "[FINAL_ANSWER]:", &["[THOUGHT]", "[ACTION]"]),
    };

    if !step.action.is_empty() && !step.final_answer.is_empty() {
        warn!("react response carries both action and final answer; final answer wins");
    }

    step
}

/// Content of the first occurrence of `label`, bounded by the earliest
/// following `boundaries` occurrence or end of text
fn extract_section(response: &str, label: &str, boundaries: &[&str]) -> String {
    let Some(pos) = find_ascii_ci(response, label, 0) else {
        return String::new();
    };
    let start = pos + label.len();
    let end = boundaries
        .iter()
        .filter_map(|boundary| find_ascii_ci(response, boundary, start))
        .min()
        .unwrap_or(response.len());
    response[start..end].trim().to_string()
}

/// First ASCII-case-insensitive occurrence of `needle` at or after `from`.
/// The needles are ASCII, so byte offsets stay aligned with the original
/// text.
fn find_ascii_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || haystack.len() < from + needle.len() {
        return None;
    }
    (from..=haystack.len() - needle.len())
        .find(|&pos| haystack[pos..pos + needle.len()].eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_object_balanced() {
        let text = r#"Some preamble {"decision": "call_manager", "params": {"a": 1}} trailing"#;
        let raw = extract_json_object(text).unwrap();
        assert_eq!(
            raw,
            r#"{"decision": "call_manager", "params": {"a": 1}}"#
        );
    }

    #[test]
    fn test_extract_json_object_handles_braces_in_strings() {
        let text = r#"{"thought": "use {placeholder} syntax"} extra }"#;
        let raw = extract_json_object(text).unwrap();
        assert_eq!(raw, r#"{"thought": "use {placeholder} syntax"}"#);
    }

    #[test]
    fn test_extract_json_object_none_without_braces() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("unclosed { object").is_none());
    }

    #[test]
    fn test_parse_react_all_sections() {
        let response = "[THOUGHT]: need the forecast\n[ACTION]: getWeather(city=Uberlândia)";
        let step = parse_react_response(response);
        assert_eq!(step.thought, "need the forecast");
        assert_eq!(step.action, "getWeather(city=Uberlândia)");
        assert_eq!(step.final_answer, "");
    }

    #[test]
    fn test_parse_react_case_insensitive_and_reordered() {
        let response = "[final_answer]: done\n[thought]: wrapping up";
        let step = parse_react_response(response);
        assert_eq!(step.final_answer, "done");
        assert_eq!(step.thought, "wrapping up");
    }

    #[test]
    fn test_parse_react_missing_sections_are_empty() {
        let step = parse_react_response("free text with no labels at all");
        assert_eq!(step, ReactStep::default());
    }

    #[test]
    fn test_parse_react_repeated_label_is_content_not_boundary() {
        let response = "[THOUGHT]: first\n[THOUGHT]: second\n[ACTION]: getWeather(city=X)";
        let step = parse_react_response(response);
        // only the other labels end a section; a repeat of the same label
        // is swallowed into the first section's content
        assert_eq!(step.thought, "first\n[THOUGHT]: second");
        assert_eq!(step.action, "getWeather(city=X)");
    }

    #[test]
    fn test_next_action_plan_deserializes_partial_json() {
        let plan: NextActionPlan =
            serde_json::from_str(r#"{"decision": "final_answer", "thought": "ok"}"#).unwrap();
        assert_eq!(plan.decision, "final_answer");
        assert_eq!(plan.thought.as_deref(), Some("ok"));
        assert!(plan.manager_id.is_none());
    }
}
