//! Per-request execution state
//!
//! One `ExecutionContext` is created per orchestrator invocation and carried
//! through the delegation loop, the manager reason-act loops, and tool
//! dispatch. Two invariants govern it:
//!
//! - `previous_results` grows monotonically: entries are never removed, and a
//!   key is only overwritten by re-running that tool.
//! - `react_history` is append-only within an execution; delegation
//!   boundaries snapshot it and restore the snapshot with the delegation's
//!   entries appended.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{AgentDefinition, ManagerDefinition};

/// Raw tool outputs keyed by `agent_id` then `tool_name`
pub type PreviousResults = BTreeMap<String, BTreeMap<String, Value>>;

/// A signal that execution is paused awaiting user-supplied parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAction {
    pub agent_id: String,
    pub required_params: Vec<String>,
}

/// The mutable per-request state passed through all loops
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub session_id: String,
    pub user_id: String,
    pub user_question: String,
    /// Assigned once when the execution log is opened
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    #[serde(default)]
    pub previous_results: PreviousResults,
    #[serde(default)]
    pub react_history: Vec<String>,
    #[serde(default)]
    pub pending_actions: Vec<PendingAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_output: Option<String>,
    #[serde(default)]
    pub available_managers: Vec<ManagerDefinition>,
    #[serde(default)]
    pub available_agents: HashMap<String, AgentDefinition>,
}

impl ExecutionContext {
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        user_question: impl Into<String>,
    ) -> Self {
        ExecutionContext {
            session_id: session_id.into(),
            user_id: user_id.into(),
            user_question: user_question.into(),
            ..Default::default()
        }
    }

    /// Derive the context handed to a delegated manager: a deep copy with an
    /// empty reason-act history and the manager's sub-question as objective.
    pub fn step_context(&self, new_question: &str) -> ExecutionContext {
        let mut step = self.clone();
        step.react_history = Vec::new();
        step.user_question = new_question.to_string();
        step
    }

    /// Record one tool output under its owning agent
    pub fn record_result(&mut self, agent_id: &str, tool_name: &str, output: Value) {
        self.previous_results
            .entry(agent_id.to_string())
            .or_default()
            .insert(tool_name.to_string(), output);
    }

    /// Look up the named manager in the loaded catalog
    pub fn find_manager(&self, manager_id: &str) -> Option<&ManagerDefinition> {
        self.available_managers
            .iter()
            .find(|m| m.manager_id == manager_id)
    }
}

/// Merge `source` results into `target`: new keys are added, existing
/// `(agent_id, tool_name)` keys are overwritten by `source` (last write
/// wins), and nothing is ever removed from `target`.
pub fn consolidate_results(target: &mut PreviousResults, source: &PreviousResults) {
    for (agent_id, tools) in source {
        let entry = target.entry(agent_id.clone()).or_default();
        for (tool_name, output) in tools {
            entry.insert(tool_name.clone(), output.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_context_resets_history_and_question() {
        let mut outer = ExecutionContext::new("s1", "alice", "original question");
        outer.react_history.push("[ORCHESTRATOR_THOUGHT]: x".into());
        outer.record_result("AgentA", "toolA", json!({"a": 1}));

        let step = outer.step_context("sub question");
        assert!(step.react_history.is_empty());
        assert_eq!(step.user_question, "sub question");
        // prior results travel into the step context
        assert_eq!(step.previous_results["AgentA"]["toolA"], json!({"a": 1}));
        // the outer context is untouched
        assert_eq!(outer.user_question, "original question");
        assert_eq!(outer.react_history.len(), 1);
    }

    #[test]
    fn test_consolidate_preserves_and_overwrites() {
        let mut target = PreviousResults::new();
        let mut source = PreviousResults::new();

        target
            .entry("AgentA".into())
            .or_default()
            .insert("toolA".into(), json!("old"));
        target
            .entry("AgentB".into())
            .or_default()
            .insert("toolB".into(), json!("kept"));

        source
            .entry("AgentA".into())
            .or_default()
            .insert("toolA".into(), json!("new"));
        source
            .entry("AgentC".into())
            .or_default()
            .insert("toolC".into(), json!("added"));

        consolidate_results(&mut target, &source);

        assert_eq!(target["AgentA"]["toolA"], json!("new"));
        assert_eq!(target["AgentB"]["toolB"], json!("kept"));
        assert_eq!(target["AgentC"]["toolC"], json!("added"));
    }

    #[test]
    fn test_record_result_last_write_wins() {
        let mut ctx = ExecutionContext::new("s1", "alice", "q");
        ctx.record_result("AgentA", "toolA", json!(1));
        ctx.record_result("AgentA", "toolA", json!(2));
        assert_eq!(ctx.previous_results["AgentA"]["toolA"], json!(2));
    }
}
