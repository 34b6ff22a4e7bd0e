//! Tool plug-ins and the process-wide registry
//!
//! Plug-ins come in two shapes: definition-driven engines (the API and
//! prompt executors, dispatched for every `Api`/`LlmPrompt` tool definition)
//! and native tools registered under their own names.

mod api_call;
mod capabilities;
mod memory_search;
mod prompt;
mod registry;
mod traits;

pub use api_call::{ApiCallTool, API_TOOL_NAME};
pub use capabilities::ListCapabilitiesTool;
pub use memory_search::SearchLongTermMemoryTool;
pub use prompt::{PromptExecutionTool, PROMPT_TOOL_NAME};
pub use registry::ToolRegistry;
pub use traits::{NextStep, Tool, ToolParams, ToolResult};

use std::sync::Arc;

use crate::llm::LlmClient;
use crate::memory::Embedder;
use crate::storage::LongTermMemoryStore;

/// Build the registry of built-in plug-ins at worker startup.
///
/// The registry is immutable afterwards; callers wrap it in an `Arc` and
/// share it across the process.
pub fn builtin_registry(
    llm: Arc<dyn LlmClient>,
    memory_store: Arc<dyn LongTermMemoryStore>,
    embedder: Arc<dyn Embedder>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ApiCallTool::new(reqwest::Client::new())));
    registry.register(Arc::new(PromptExecutionTool::new(llm)));
    registry.register(Arc::new(ListCapabilitiesTool));
    registry.register(Arc::new(SearchLongTermMemoryTool::new(
        memory_store,
        embedder,
    )));
    registry
}
