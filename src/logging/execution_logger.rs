//! Execution logger: in-memory registry of live executions, finalized
//! exactly once into the durable store
//!
//! One document accumulates per execution while it runs, keyed by session.
//! Finalizing stamps the end timestamp and duration, inserts the document,
//! and drops the in-memory entry. Persistence is best-effort: a store failure
//! is logged and swallowed, never surfaced to the orchestration path.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::config::API_VERSION;
use crate::context::{ExecutionContext, PendingAction};
use crate::storage::ExecutionLogStore;

/// Tool outputs longer than this are truncated in `output_summary`
const OUTPUT_SUMMARY_CHARS: usize = 300;

/// Static metadata stamped on every execution-log document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMetadata {
    pub api_version: String,
    pub llm_model: String,
    pub execution_mode: String,
}

/// One recorded tool invocation inside a manager log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocationRecord {
    pub success: bool,
    pub output_summary: String,
    pub full_output: Value,
}

/// The log of one manager delegation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerLog {
    pub manager_id: String,
    pub new_question: String,
    #[serde(default)]
    pub previous_results: BTreeMap<String, BTreeMap<String, ToolInvocationRecord>>,
    #[serde(default)]
    pub react_history: Vec<String>,
}

/// One durable execution-log document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogDoc {
    pub session_id: String,
    pub execution_id: String,
    pub user_id: String,
    pub user_question: String,
    pub start_timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    pub status: String,
    /// Manager ids in first-delegation order
    #[serde(default)]
    pub orchestrator: Vec<String>,
    #[serde(default)]
    pub managers: Vec<ManagerLog>,
    #[serde(default)]
    pub final_output: String,
    #[serde(default)]
    pub pending_actions: Vec<PendingAction>,
    pub metadata: LogMetadata,
}

/// Reason-act entry labels recognized by the manager log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactEntryKind {
    Thought,
    Action,
    Observation,
    FinalAnswer,
}

impl ReactEntryKind {
    fn prefix(self) -> &'static str {
        match self {
            ReactEntryKind::Thought => "[THOUGHT]",
            ReactEntryKind::Action => "[ACTION]",
            ReactEntryKind::Observation => "[OBSERVATION]",
            ReactEntryKind::FinalAnswer => "[FINAL_ANSWER]",
        }
    }
}

/// Durable hierarchical log of live executions
#[derive(Clone)]
pub struct ExecutionLogger {
    store: Arc<dyn ExecutionLogStore>,
    registry: Arc<Mutex<HashMap<String, ExecutionLogDoc>>>,
    llm_model: String,
}

impl ExecutionLogger {
    pub fn new(store: Arc<dyn ExecutionLogStore>, llm_model: impl Into<String>) -> Self {
        ExecutionLogger {
            store,
            registry: Arc::new(Mutex::new(HashMap::new())),
            llm_model: llm_model.into(),
        }
    }

    /// Open a new execution log for a session
    pub async fn initialize(
        &self,
        session_id: &str,
        execution_id: &str,
        user_id: &str,
        user_question: &str,
    ) {
        let doc = ExecutionLogDoc {
            session_id: session_id.to_string(),
            execution_id: execution_id.to_string(),
            user_id: user_id.to_string(),
            user_question: user_question.to_string(),
            start_timestamp: Utc::now(),
            end_timestamp: None,
            duration_ms: None,
            status: "in_progress".to_string(),
            orchestrator: Vec::new(),
            managers: Vec::new(),
            final_output: String::new(),
            pending_actions: Vec::new(),
            metadata: LogMetadata {
                api_version: API_VERSION.to_string(),
                llm_model: self.llm_model.clone(),
                execution_mode: "orchestrator".to_string(),
            },
        };
        self.registry
            .lock()
            .await
            .insert(session_id.to_string(), doc);
    }

    /// Record a delegation to a manager
    pub async fn add_manager(&self, session_id: &str, manager_id: &str, new_question: &str) {
        let mut registry = self.registry.lock().await;
        let Some(doc) = registry.get_mut(session_id) else {
            return;
        };
        doc.managers.push(ManagerLog {
            manager_id: manager_id.to_string(),
            new_question: new_question.to_string(),
            previous_results: BTreeMap::new(),
            react_history: Vec::new(),
        });
        if !doc.orchestrator.iter().any(|m| m == manager_id) {
            doc.orchestrator.push(manager_id.to_string());
        }
    }

    /// Append a reason-act entry to a manager's history, normalizing the
    /// label prefix (an entry that already carries it is kept verbatim)
    pub async fn log_react_entry(
        &self,
        session_id: &str,
        manager_id: &str,
        kind: ReactEntryKind,
        entry: &str,
    ) {
        let mut registry = self.registry.lock().await;
        let Some(manager) = registry
            .get_mut(session_id)
            .and_then(|doc| latest_manager_mut(doc, manager_id))
        else {
            return;
        };

        let trimmed = entry.trim();
        let formatted = if trimmed.starts_with(kind.prefix()) {
            trimmed.to_string()
        } else {
            format!("{}: {}", kind.prefix(), trimmed)
        };
        manager.react_history.push(formatted);
    }

    /// Record a tool invocation under the owning manager, with a truncated
    /// summary alongside the full output
    pub async fn log_tool_result(
        &self,
        session_id: &str,
        manager_id: &str,
        agent_id: &str,
        tool_name: &str,
        success: bool,
        output: &Value,
    ) {
        let mut registry = self.registry.lock().await;
        let Some(manager) = registry
            .get_mut(session_id)
            .and_then(|doc| latest_manager_mut(doc, manager_id))
        else {
            return;
        };

        let rendered = stringify_output(output);
        let output_summary = if rendered.chars().count() > OUTPUT_SUMMARY_CHARS {
            let truncated: String = rendered.chars().take(OUTPUT_SUMMARY_CHARS).collect();
            format!("{}...", truncated)
        } else {
            rendered
        };

        manager
            .previous_results
            .entry(agent_id.to_string())
            .or_default()
            .insert(
                tool_name.to_string(),
                ToolInvocationRecord {
                    success,
                    output_summary,
                    full_output: output.clone(),
                },
            );
    }

    pub async fn update_final_output(&self, session_id: &str, final_output: &str) {
        if let Some(doc) = self.registry.lock().await.get_mut(session_id) {
            doc.final_output = final_output.to_string();
        }
    }

    pub async fn update_pending_actions(&self, session_id: &str, actions: &[PendingAction]) {
        if let Some(doc) = self.registry.lock().await.get_mut(session_id) {
            doc.pending_actions = actions.to_vec();
        }
    }

    /// Finalize the execution: stamp end/duration, persist exactly once, and
    /// drop the in-memory entry. Store failures are logged and swallowed.
    pub async fn finalize(&self, session_id: &str, status: &str) {
        let doc = {
            let mut registry = self.registry.lock().await;
            registry.remove(session_id)
        };
        let Some(mut doc) = doc else {
            warn!(session_id, "finalize called with no open execution log");
            return;
        };

        let end = Utc::now();
        doc.duration_ms = Some((end - doc.start_timestamp).num_milliseconds());
        doc.end_timestamp = Some(end);
        doc.status = status.to_string();

        match self.store.insert(&doc).await {
            Ok(()) => debug!(
                session_id,
                execution_id = %doc.execution_id,
                status,
                "execution log persisted"
            ),
            Err(e) => error!(
                session_id,
                execution_id = %doc.execution_id,
                "failed to persist execution log: {}",
                e
            ),
        }
    }

    /// Rebuild an execution context from the latest persisted log of a
    /// session, consolidating every manager's results and history
    pub async fn reconstruct_context(&self, session_id: &str) -> Option<ExecutionContext> {
        let doc = match self.store.latest_for_session(session_id).await {
            Ok(doc) => doc?,
            Err(e) => {
                error!(session_id, "failed to load execution log: {}", e);
                return None;
            }
        };

        let mut context = ExecutionContext::new(
            doc.session_id.clone(),
            doc.user_id.clone(),
            doc.user_question.clone(),
        );
        context.execution_id = Some(doc.execution_id.clone());
        context.pending_actions = doc.pending_actions.clone();
        if !doc.final_output.is_empty() {
            context.final_output = Some(doc.final_output.clone());
        }

        for manager in &doc.managers {
            context
                .react_history
                .extend(manager.react_history.iter().cloned());
            for (agent_id, tools) in &manager.previous_results {
                for (tool_name, record) in tools {
                    context.record_result(agent_id, tool_name, record.full_output.clone());
                }
            }
        }

        Some(context)
    }
}

fn latest_manager_mut<'a>(
    doc: &'a mut ExecutionLogDoc,
    manager_id: &str,
) -> Option<&'a mut ManagerLog> {
    doc.managers
        .iter_mut()
        .rev()
        .find(|m| m.manager_id == manager_id)
}

fn stringify_output(output: &Value) -> String {
    match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
