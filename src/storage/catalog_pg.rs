//! PostgreSQL catalog store: users plus the manager → agent → tool catalog
//!
//! Manager and agent rows reference their children by name; the fetch
//! assembles the nested definitions in one pass per level, restricted to
//! active rows.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::types::Json;

use crate::catalog::{AgentDefinition, ManagerDefinition, ToolDefinition};
use crate::error::Result;

use super::postgres::PostgresPool;
use super::{CatalogStore, UserRecord, UserSettings};

/// Manager row payload: definition fields plus child agent ids
#[derive(Debug, Deserialize)]
struct ManagerRowDef {
    description: String,
    #[serde(default)]
    is_system_tool: bool,
    #[serde(default)]
    agents: Vec<String>,
}

/// Agent row payload: definition fields plus child tool names
#[derive(Debug, Deserialize)]
struct AgentRowDef {
    description: String,
    #[serde(default)]
    response_guideline: Option<String>,
    #[serde(default)]
    tools: Vec<String>,
}

/// PostgreSQL-backed catalog store
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PostgresPool,
}

impl PgCatalogStore {
    pub fn new(pool: PostgresPool) -> Self {
        PgCatalogStore { pool }
    }

    async fn fetch_agents(
        &self,
        agent_ids: &[String],
    ) -> Result<HashMap<String, (AgentRowDef, Vec<String>)>> {
        let rows: Vec<(String, Json<AgentRowDef>)> = sqlx::query_as(
            "SELECT agent_id, definition FROM catalog_agents WHERE agent_id = ANY($1) AND active",
        )
        .bind(agent_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(agent_id, Json(def))| {
                let tools = def.tools.clone();
                (agent_id, (def, tools))
            })
            .collect())
    }

    async fn fetch_tools(&self, tool_names: &[String]) -> Result<HashMap<String, ToolDefinition>> {
        let rows: Vec<(String, Json<ToolDefinition>)> = sqlx::query_as(
            "SELECT tool_name, definition FROM catalog_tools WHERE tool_name = ANY($1) AND active",
        )
        .bind(tool_names)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(name, Json(def))| (name, def))
            .collect())
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn fetch_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let row: Option<(String, Json<Vec<String>>, Json<UserSettings>)> = sqlx::query_as(
            "SELECT username, projects, settings FROM catalog_users WHERE username = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(username, Json(projects), Json(settings))| UserRecord {
            username,
            projects,
            settings,
        }))
    }

    async fn fetch_managers_for_projects(
        &self,
        projects: &[String],
    ) -> Result<Vec<ManagerDefinition>> {
        let manager_rows: Vec<(String, Json<ManagerRowDef>)> = sqlx::query_as(
            r#"
            SELECT manager_id, definition
            FROM catalog_managers
            WHERE project_name = ANY($1) AND active
            ORDER BY manager_id
        "#,
        )
        .bind(projects)
        .fetch_all(&self.pool)
        .await?;

        // Gather all referenced agent ids, then all referenced tool names
        let agent_ids: Vec<String> = manager_rows
            .iter()
            .flat_map(|(_, Json(def))| def.agents.iter().cloned())
            .collect();
        let agents = self.fetch_agents(&agent_ids).await?;

        let tool_names: Vec<String> = agents
            .values()
            .flat_map(|(_, tools)| tools.iter().cloned())
            .collect();
        let tools = self.fetch_tools(&tool_names).await?;

        let mut managers = Vec::with_capacity(manager_rows.len());
        for (manager_id, Json(def)) in manager_rows {
            let nested_agents: Vec<AgentDefinition> = def
                .agents
                .iter()
                .filter_map(|agent_id| agents.get(agent_id).map(|a| (agent_id, a)))
                .map(|(agent_id, (agent_def, tool_refs))| AgentDefinition {
                    agent_id: agent_id.clone(),
                    description: agent_def.description.clone(),
                    active: true,
                    tools: tool_refs
                        .iter()
                        .filter_map(|name| tools.get(name).cloned())
                        .collect(),
                    response_guideline: agent_def.response_guideline.clone(),
                })
                .collect();

            managers.push(ManagerDefinition {
                manager_id,
                description: def.description,
                active: true,
                agents: nested_agents,
                is_system_tool: def.is_system_tool,
            });
        }

        Ok(managers)
    }
}
