//! Built-in system managers
//!
//! These are injected by the loader on every request, ahead of (and after)
//! the user's project catalog. They are flagged `is_system_tool` so the
//! capability listing never shows them.

use super::types::{
    AgentDefinition, ManagerDefinition, ParameterSpec, ToolDefinition, ToolKind,
};

/// Manager id of the built-in meta manager
pub const META_MANAGER_ID: &str = "SYS_META_MANAGER";

/// Manager id of the built-in long-term-memory manager
pub const MEMORY_MANAGER_ID: &str = "SYS_MEMORY_MANAGER";

/// Dispatch name of the capability-listing native tool
pub const LIST_CAPABILITIES_TOOL: &str = "listCapabilities";

/// Dispatch name of the long-term-memory search native tool
pub const SEARCH_LONG_TERM_MEMORY_TOOL: &str = "searchLongTermMemory";

/// The meta manager: tools about the system itself
pub fn meta_manager() -> ManagerDefinition {
    ManagerDefinition {
        manager_id: META_MANAGER_ID.to_string(),
        description: "Gerencia ferramentas sobre o próprio sistema, como listar capacidades."
            .to_string(),
        active: true,
        is_system_tool: true,
        agents: vec![AgentDefinition {
            agent_id: "SYS_CAPABILITIES_AGENT".to_string(),
            description: "Agente que sabe descrever as funcionalidades do sistema.".to_string(),
            active: true,
            tools: vec![ToolDefinition {
                name: LIST_CAPABILITIES_TOOL.to_string(),
                description:
                    "Lista e descreve as principais capacidades e ferramentas disponíveis para ajudar o usuário."
                        .to_string(),
                parameters: vec![],
                kind: ToolKind::Native,
                active: true,
            }],
            response_guideline: None,
        }],
    }
}

/// The memory manager: recall from summarized past conversations
pub fn memory_manager() -> ManagerDefinition {
    ManagerDefinition {
        manager_id: MEMORY_MANAGER_ID.to_string(),
        description:
            "Especialista em acessar a memória de longo prazo do usuário para lembrar de conversas e informações passadas."
                .to_string(),
        active: true,
        is_system_tool: true,
        agents: vec![AgentDefinition {
            agent_id: "SYS_RECALL_AGENT".to_string(),
            description: "Agente com a capacidade de buscar em resumos de conversas antigas."
                .to_string(),
            active: true,
            tools: vec![ToolDefinition {
                name: SEARCH_LONG_TERM_MEMORY_TOOL.to_string(),
                description:
                    "Use para buscar informações ou contexto de conversas que aconteceram há mais de um dia. Ótima para perguntas como 'lembra quando falamos sobre X?' ou 'qual foi a decisão sobre Y?'."
                        .to_string(),
                parameters: vec![ParameterSpec {
                    name: "query".to_string(),
                    type_tag: "string".to_string(),
                    description: "O tópico ou pergunta a ser buscado na memória.".to_string(),
                    required: true,
                }],
                kind: ToolKind::Native,
                active: true,
            }],
            response_guideline: None,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_managers_are_hidden() {
        assert!(meta_manager().is_system_tool);
        assert!(memory_manager().is_system_tool);
    }

    #[test]
    fn test_memory_tool_requires_query() {
        let manager = memory_manager();
        let tool = &manager.agents[0].tools[0];
        assert_eq!(tool.name, SEARCH_LONG_TERM_MEMORY_TOOL);
        assert_eq!(tool.required_param_names(), vec!["query"]);
    }
}
