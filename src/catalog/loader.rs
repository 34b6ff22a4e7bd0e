//! Per-user definition assembly
//!
//! One aggregated read per request: the user record drives which project
//! catalogs are visible and whether the memory manager is injected. The
//! returned snapshot is fresh on every call — definitions may change between
//! executions, so nothing here is cached.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::storage::CatalogStore;

use super::system::{memory_manager, meta_manager};
use super::types::{AgentDefinition, ManagerDefinition};

/// The catalog permitted to one user for one execution
#[derive(Debug, Clone, Default)]
pub struct UserDefinitions {
    pub managers: Vec<ManagerDefinition>,
    /// All agents across the returned managers, keyed by `agent_id`
    pub agents: HashMap<String, AgentDefinition>,
}

/// Loads the manager/agent/tool catalog permitted to a given user
#[derive(Clone)]
pub struct DefinitionLoader {
    catalog: Arc<dyn CatalogStore>,
}

impl DefinitionLoader {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        DefinitionLoader { catalog }
    }

    /// Load all definitions permitted to `user_id`.
    ///
    /// Always prepends the built-in meta manager. Appends the memory manager
    /// when the user opted into long-term memory. An unknown user gets the
    /// system defaults only; an unreachable catalog store is an error.
    pub async fn load_for_user(&self, user_id: &str) -> Result<UserDefinitions> {
        let user = self
            .catalog
            .fetch_user(user_id)
            .await
            .map_err(|e| Error::DefinitionsUnavailable(e.to_string()))?;

        let meta = meta_manager();
        let mut defs = UserDefinitions::default();
        index_agents(&meta, &mut defs.agents);
        defs.managers.push(meta);

        let Some(user) = user else {
            warn!(user_id, "user not found; returning system defaults only");
            return Ok(defs);
        };

        if !user.projects.is_empty() {
            let managers = self
                .catalog
                .fetch_managers_for_projects(&user.projects)
                .await
                .map_err(|e| Error::DefinitionsUnavailable(e.to_string()))?;

            debug!(
                user_id,
                managers = managers.len(),
                "loaded project catalog"
            );

            for manager in managers {
                index_agents(&manager, &mut defs.agents);
                defs.managers.push(manager);
            }
        }

        if user.settings.long_term_memory_enabled {
            info!(user_id, "injecting memory manager");
            let memory = memory_manager();
            index_agents(&memory, &mut defs.agents);
            defs.managers.push(memory);
        }

        Ok(defs)
    }
}

fn index_agents(manager: &ManagerDefinition, agents: &mut HashMap<String, AgentDefinition>) {
    for agent in &manager.agents {
        agents.insert(agent.agent_id.clone(), agent.clone());
    }
}
