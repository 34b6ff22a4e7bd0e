//! Definition catalog: managers, agents, tools, and the per-user loader
//!
//! A *manager* bundles agents around one capability; an *agent* owns tools;
//! a *tool* is a declarative spec dispatched to a plug-in at runtime.

mod loader;
mod system;
mod types;

pub use loader::{DefinitionLoader, UserDefinitions};
pub use system::{
    memory_manager, meta_manager, LIST_CAPABILITIES_TOOL, MEMORY_MANAGER_ID, META_MANAGER_ID,
    SEARCH_LONG_TERM_MEMORY_TOOL,
};
pub use types::{
    simplified_catalog, AgentDefinition, ApiAuthConfig, ApiAuthType, ApiToolConfig,
    ManagerDefinition, ManagerSummary, ParameterSpec, ToolDefinition, ToolKind, ToolSummary,
};
