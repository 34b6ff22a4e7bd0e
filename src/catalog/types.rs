//! Declarative definitions for managers, agents, and tools
//!
//! Definitions are immutable within one execution: the loader returns a fresh
//! snapshot per request and nothing mutates it afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A declared tool parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    /// Semantic type tag shown to the LLM (e.g. "string", "date")
    #[serde(rename = "type")]
    pub type_tag: String,
    pub description: String,
    pub required: bool,
}

/// Authentication scheme for API-backed tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiAuthType {
    None,
    Bearer,
}

/// Authentication config for API-backed tools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiAuthConfig {
    #[serde(rename = "type")]
    pub auth_type: ApiAuthType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// HTTP call configuration for API-backed tools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiToolConfig {
    pub method: String,
    /// May contain `{placeholder}` path segments filled from call parameters
    pub base_url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Optional JSON body whose `"{param}"` string values are filled from call parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_template: Option<serde_json::Value>,
    pub auth: ApiAuthConfig,
}

/// How a tool is implemented, and the data its plug-in needs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolKind {
    /// Dispatched to the generic HTTP-call plug-in
    Api(ApiToolConfig),
    /// Dispatched to the generic prompt-execution plug-in
    LlmPrompt { template: String },
    /// Dispatched to a plug-in registered under the tool's own name
    Native,
}

/// Declarative tool specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    #[serde(flatten)]
    pub kind: ToolKind,
    pub active: bool,
}

impl ToolDefinition {
    /// Names of the parameters declared `required`
    pub fn required_param_names(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Concise signature for prompts: `"p1: T1, p2: T2"`, or `"Nenhum"` when empty
    pub fn prompt_signature(&self) -> String {
        if self.parameters.is_empty() {
            return "Nenhum".to_string();
        }
        self.parameters
            .iter()
            .map(|p| format!("{}: {}", p.name, p.type_tag))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A specialist that owns a set of tools within one manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub agent_id: String,
    pub description: String,
    pub active: bool,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    /// Instruction for the final-answer synthesizer on how to format this agent's output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_guideline: Option<String>,
}

/// A named bundle of agents exposing one thematic capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerDefinition {
    pub manager_id: String,
    pub description: String,
    pub active: bool,
    #[serde(default)]
    pub agents: Vec<AgentDefinition>,
    /// System managers are hidden from the capability listing
    #[serde(default)]
    pub is_system_tool: bool,
}

/// One tool row of the simplified catalog embedded in the delegator prompt
#[derive(Debug, Clone, Serialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
    pub parameters: String,
}

/// One manager row of the simplified catalog embedded in the delegator prompt
#[derive(Debug, Clone, Serialize)]
pub struct ManagerSummary {
    pub manager_id: String,
    pub description: String,
    pub tools: Vec<ToolSummary>,
}

/// Build the token-frugal catalog used by the delegator prompt.
///
/// Filters to active managers/agents/tools and omits managers left with no
/// active tools.
pub fn simplified_catalog(managers: &[ManagerDefinition]) -> Vec<ManagerSummary> {
    let mut summaries = Vec::new();

    for manager in managers {
        if !manager.active {
            continue;
        }

        let mut tools = Vec::new();
        for agent in &manager.agents {
            if !agent.active {
                continue;
            }
            for tool in &agent.tools {
                if !tool.active {
                    continue;
                }
                tools.push(ToolSummary {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.prompt_signature(),
                });
            }
        }

        if !tools.is_empty() {
            summaries.push(ManagerSummary {
                manager_id: manager.manager_id.clone(),
                description: manager.description.clone(),
                tools,
            });
        }
    }

    summaries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str, active: bool, params: Vec<ParameterSpec>) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: format!("{} tool", name),
            parameters: params,
            kind: ToolKind::Native,
            active,
        }
    }

    fn param(name: &str, required: bool) -> ParameterSpec {
        ParameterSpec {
            name: name.to_string(),
            type_tag: "string".to_string(),
            description: String::new(),
            required,
        }
    }

    #[test]
    fn test_prompt_signature() {
        let t = tool("getWeather", true, vec![param("city", true), param("day", false)]);
        assert_eq!(t.prompt_signature(), "city: string, day: string");

        let bare = tool("listCapabilities", true, vec![]);
        assert_eq!(bare.prompt_signature(), "Nenhum");
    }

    #[test]
    fn test_required_param_names() {
        let t = tool("sendEmail", true, vec![param("recipient", true), param("cc", false)]);
        assert_eq!(t.required_param_names(), vec!["recipient"]);
    }

    #[test]
    fn test_simplified_catalog_filters_inactive() {
        let managers = vec![
            ManagerDefinition {
                manager_id: "WeatherManager".into(),
                description: "Weather".into(),
                active: true,
                agents: vec![AgentDefinition {
                    agent_id: "WeatherAgent".into(),
                    description: "Forecasts".into(),
                    active: true,
                    tools: vec![tool("getWeather", true, vec![param("city", true)])],
                    response_guideline: None,
                }],
                is_system_tool: false,
            },
            ManagerDefinition {
                manager_id: "EmptyManager".into(),
                description: "No active tools".into(),
                active: true,
                agents: vec![AgentDefinition {
                    agent_id: "IdleAgent".into(),
                    description: String::new(),
                    active: true,
                    tools: vec![tool("off", false, vec![])],
                    response_guideline: None,
                }],
                is_system_tool: false,
            },
            ManagerDefinition {
                manager_id: "InactiveManager".into(),
                description: String::new(),
                active: false,
                agents: vec![],
                is_system_tool: false,
            },
        ];

        let catalog = simplified_catalog(&managers);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].manager_id, "WeatherManager");
        assert_eq!(catalog[0].tools[0].parameters, "city: string");
    }

    #[test]
    fn test_tool_kind_tagged_serialization() {
        let t = ToolDefinition {
            name: "lookupOrder".into(),
            description: "Order lookup".into(),
            parameters: vec![],
            kind: ToolKind::Api(ApiToolConfig {
                method: "GET".into(),
                base_url: "https://api.example.com/orders/{id}".into(),
                headers: HashMap::new(),
                body_template: None,
                auth: ApiAuthConfig {
                    auth_type: ApiAuthType::None,
                    token: None,
                },
            }),
            active: true,
        };

        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["kind"], "api");

        let back: ToolDefinition = serde_json::from_value(json).unwrap();
        assert!(matches!(back.kind, ToolKind::Api(_)));
    }
}
