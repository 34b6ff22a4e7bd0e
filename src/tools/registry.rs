//! Tool registry - resolves dispatch keys to plug-in instances
//!
//! Built once at worker startup from the built-in plug-ins and read-only
//! afterwards. Registration key is the tool's declared name; a duplicate
//! name logs a warning and the last registration wins.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use super::traits::Tool;

/// Registry of available tool plug-ins
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        ToolRegistry {
            tools: HashMap::new(),
        }
    }

    /// Register a plug-in under its declared name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            warn!(tool = %name, "tool already registered; overwriting");
        }
        info!(tool = %name, "tool registered");
        self.tools.insert(name, tool);
    }

    /// Resolve a dispatch key to a plug-in
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Snapshot of the registered plug-ins
    pub fn list(&self) -> HashMap<String, Arc<dyn Tool>> {
        self.tools.clone()
    }

    /// Number of registered plug-ins
    pub fn count(&self) -> usize {
        self.tools.len()
    }

    /// Registered dispatch keys
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}
