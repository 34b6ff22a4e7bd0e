//! Manager executor: the bounded reason-act loop
//!
//! Drives one manager against one sub-question for at most
//! `max_react_cycles` iterations. Whatever happens inside the loop — final
//! answer, pending input, unrecognized actions, tool failures — the exit
//! path restores the snapshot-and-merge contract: results and history
//! captured on entry are preserved, with the loop's own entries merged on
//! top. That is what keeps sibling managers' results intact across nested
//! delegations.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::catalog::{AgentDefinition, ManagerDefinition};
use crate::context::{consolidate_results, ExecutionContext, PendingAction};
use crate::llm::LlmAdapter;
use crate::logging::{ExecutionLogger, ReactEntryKind};
use crate::tools::ToolParams;

use super::action::{parse_action, ParsedAction};
use super::agent_executor::AgentExecutor;

/// Runs the reason-act loop for one manager
#[derive(Clone)]
pub struct ManagerExecutor {
    adapter: Arc<LlmAdapter>,
    agent_executor: AgentExecutor,
    logger: ExecutionLogger,
    max_react_cycles: u32,
}

impl ManagerExecutor {
    pub fn new(
        adapter: Arc<LlmAdapter>,
        agent_executor: AgentExecutor,
        logger: ExecutionLogger,
        max_react_cycles: u32,
    ) -> Self {
        ManagerExecutor {
            adapter,
            agent_executor,
            logger,
            max_react_cycles,
        }
    }

    /// Execute the manager against the context's current objective.
    ///
    /// Returns true when execution must suspend for user input.
    pub async fn execute(
        &self,
        manager: &ManagerDefinition,
        context: &mut ExecutionContext,
        original_question: &str,
    ) -> bool {
        // Snapshot on entry; merged back on every exit path below
        let initial_results = context.previous_results.clone();
        let initial_history = context.react_history.clone();

        let requires_input = self.run_react_loop(manager, context, original_question).await;

        // previous_results := initial ∪ locally-produced (loop output wins)
        let produced = std::mem::take(&mut context.previous_results);
        context.previous_results = initial_results;
        consolidate_results(&mut context.previous_results, &produced);

        // react_history := initial ++ locally-produced
        let local: Vec<String> = context
            .react_history
            .split_off(initial_history.len().min(context.react_history.len()));
        context.react_history = initial_history;
        context.react_history.extend(local);

        requires_input
    }

    async fn run_react_loop(
        &self,
        manager: &ManagerDefinition,
        context: &mut ExecutionContext,
        original_question: &str,
    ) -> bool {
        for cycle in 0..self.max_react_cycles {
            info!(
                manager_id = %manager.manager_id,
                cycle = cycle + 1,
                max = self.max_react_cycles,
                "react cycle"
            );

            let step = match self
                .adapter
                .react_cycle(
                    &context.user_id,
                    manager,
                    context,
                    &context.react_history,
                    original_question,
                )
                .await
            {
                Ok(step) => step,
                Err(e) => {
                    // a failed cycle is a no-op, not a crash
                    warn!(manager_id = %manager.manager_id, "react cycle failed: {}", e);
                    Default::default()
                }
            };

            if !step.thought.is_empty() {
                let entry = format!("[THOUGHT]: {}", step.thought);
                info!("{}", entry);
                context.react_history.push(entry);
                self.logger
                    .log_react_entry(
                        &context.session_id,
                        &manager.manager_id,
                        ReactEntryKind::Thought,
                        &step.thought,
                    )
                    .await;
            }

            if !step.final_answer.is_empty() {
                let entry = format!("[FINAL_ANSWER]: {}", step.final_answer);
                info!("{}", entry);
                context.react_history.push(entry);
                context.final_output = Some(step.final_answer.clone());
                self.logger
                    .log_react_entry(
                        &context.session_id,
                        &manager.manager_id,
                        ReactEntryKind::FinalAnswer,
                        &step.final_answer,
                    )
                    .await;
                return false;
            }

            if !step.action.is_empty() {
                let entry = format!("[ACTION]: {}", step.action);
                info!("{}", entry);
                context.react_history.push(entry);
                self.logger
                    .log_react_entry(
                        &context.session_id,
                        &manager.manager_id,
                        ReactEntryKind::Action,
                        &step.action,
                    )
                    .await;

                match self.run_action(manager, context, &step.action).await {
                    ActionOutcome::Observed(observation) => {
                        self.record_observation(manager, context, &observation).await;
                    }
                    ActionOutcome::NeedsUserInput => return true,
                }
            }

            if cycle == self.max_react_cycles - 1 {
                context
                    .react_history
                    .push("[OBSERVATION]: Limite máximo de ciclos atingido".to_string());
            }
        }

        false
    }

    async fn run_action(
        &self,
        manager: &ManagerDefinition,
        context: &mut ExecutionContext,
        action: &str,
    ) -> ActionOutcome {
        match parse_action(action) {
            ParsedAction::Invoke { tool_name, params } => {
                self.dispatch_tool(manager, context, &tool_name, params).await
            }
            ParsedAction::Unrecognized => ActionOutcome::Observed(format!(
                "Formato de ação não reconhecido: {}",
                action
            )),
        }
    }

    async fn dispatch_tool(
        &self,
        manager: &ManagerDefinition,
        context: &mut ExecutionContext,
        tool_name: &str,
        params: ToolParams,
    ) -> ActionOutcome {
        // case-insensitive owner lookup; dispatch uses the canonical name
        let Some((agent, canonical_name)) = find_agent_by_tool(manager, tool_name) else {
            return ActionOutcome::Observed(format!(
                "Ferramenta '{}' ou seu agente não foram encontrados",
                tool_name
            ));
        };
        let agent_id = agent.agent_id.clone();
        let canonical_name = canonical_name.to_string();

        let result = self
            .agent_executor
            .execute(agent, &canonical_name, &params, context)
            .await;

        if result.requires_user_input() {
            context.pending_actions.push(PendingAction {
                agent_id,
                required_params: result.required_params.clone(),
            });
            return ActionOutcome::NeedsUserInput;
        }

        let observation = stringify_output(&result.output);
        self.logger
            .log_tool_result(
                &context.session_id,
                &manager.manager_id,
                &agent_id,
                &canonical_name,
                result.success,
                &result.output,
            )
            .await;
        context.record_result(&agent_id, &canonical_name, result.output);

        ActionOutcome::Observed(observation)
    }

    async fn record_observation(
        &self,
        manager: &ManagerDefinition,
        context: &mut ExecutionContext,
        observation: &str,
    ) {
        let entry = format!("[OBSERVATION]: {}", observation);
        info!("{}", entry);
        context.react_history.push(entry);
        self.logger
            .log_react_entry(
                &context.session_id,
                &manager.manager_id,
                ReactEntryKind::Observation,
                observation,
            )
            .await;
    }
}

enum ActionOutcome {
    Observed(String),
    NeedsUserInput,
}

/// Find the agent owning `tool_name` (case-insensitive) and the tool's
/// canonical declared name
fn find_agent_by_tool<'a>(
    manager: &'a ManagerDefinition,
    tool_name: &str,
) -> Option<(&'a AgentDefinition, &'a str)> {
    for agent in &manager.agents {
        for tool in &agent.tools {
            if tool.name.eq_ignore_ascii_case(tool_name) {
                return Some((agent, tool.name.as_str()));
            }
        }
    }
    None
}

/// Render a tool output for the observation entry: maps and lists as JSON,
/// everything else as plain text
fn stringify_output(output: &Value) -> String {
    match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ToolDefinition, ToolKind};
    use crate::error::Result;
    use crate::llm::mock::ScriptedLlmClient;
    use crate::llm::PromptSet;
    use crate::logging::ExecutionLogger;
    use crate::storage::inmem::InMemoryExecutionLogStore;
    use crate::tools::{Tool, ToolRegistry, ToolResult};
    use async_trait::async_trait;
    use serde_json::json;

    fn manager_with_tool(tool_name: &str) -> ManagerDefinition {
        ManagerDefinition {
            manager_id: "WeatherManager".into(),
            description: "Weather".into(),
            active: true,
            agents: vec![AgentDefinition {
                agent_id: "WeatherAgent".into(),
                description: "Forecasts".into(),
                active: true,
                tools: vec![ToolDefinition {
                    name: tool_name.into(),
                    description: String::new(),
                    parameters: vec![],
                    kind: ToolKind::Native,
                    active: true,
                }],
                response_guideline: None,
            }],
            is_system_tool: false,
        }
    }

    #[test]
    fn test_find_agent_by_tool_case_insensitive() {
        let manager = manager_with_tool("getWeather");
        let (agent, canonical) = find_agent_by_tool(&manager, "GETWEATHER").unwrap();
        assert_eq!(agent.agent_id, "WeatherAgent");
        assert_eq!(canonical, "getWeather");
    }

    #[test]
    fn test_find_agent_by_tool_missing() {
        let manager = manager_with_tool("getWeather");
        assert!(find_agent_by_tool(&manager, "sendEmail").is_none());
    }

    struct WeatherStub;

    #[async_trait]
    impl Tool for WeatherStub {
        fn name(&self) -> &str {
            "getWeather"
        }

        fn description(&self) -> &str {
            "stub"
        }

        async fn execute(
            &self,
            _params: &crate::tools::ToolParams,
            _context: &ExecutionContext,
            _tool_def: Option<&ToolDefinition>,
        ) -> Result<ToolResult> {
            Ok(ToolResult::success(json!({"temp": 27})))
        }
    }

    fn executor_with<I, S>(responses: I) -> ManagerExecutor
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let llm = std::sync::Arc::new(ScriptedLlmClient::new(responses));
        let adapter = Arc::new(LlmAdapter::new(
            llm,
            PromptSet::load("prompts").unwrap(),
        ));
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(WeatherStub));
        let logger = ExecutionLogger::new(
            Arc::new(InMemoryExecutionLogStore::default()),
            "test-model",
        );
        ManagerExecutor::new(adapter, AgentExecutor::new(Arc::new(registry)), logger, 2)
    }

    #[tokio::test]
    async fn test_snapshot_merge_preserves_prior_state() {
        let executor = executor_with([
            "[THOUGHT]: consultar\n[ACTION]: getWeather(city=Uberlândia)",
            "[FINAL_ANSWER]: clima coletado",
        ]);
        let manager = manager_with_tool("getWeather");

        let mut context = ExecutionContext::new("s1", "alice", "sub-question");
        context.record_result("OtherAgent", "otherTool", json!("prior result"));
        context
            .react_history
            .push("[ORCHESTRATOR_THOUGHT]: antes".to_string());

        let needs_input = executor.execute(&manager, &mut context, "original").await;
        assert!(!needs_input);

        // prior state survives the loop
        assert_eq!(
            context.previous_results["OtherAgent"]["otherTool"],
            json!("prior result")
        );
        // the loop's own result is merged on top
        assert_eq!(
            context.previous_results["WeatherAgent"]["getWeather"],
            json!({"temp": 27})
        );
        // history: initial entries first, loop entries appended in order
        assert_eq!(context.react_history[0], "[ORCHESTRATOR_THOUGHT]: antes");
        assert_eq!(
            context.react_history[1],
            "[THOUGHT]: consultar"
        );
        assert!(context.react_history[2].starts_with("[ACTION]: getWeather"));
        assert_eq!(context.react_history[3], r#"[OBSERVATION]: {"temp":27}"#);
        assert_eq!(
            context.react_history[4],
            "[FINAL_ANSWER]: clima coletado"
        );
        assert_eq!(context.final_output.as_deref(), Some("clima coletado"));
    }

    #[tokio::test]
    async fn test_pending_input_still_merges_prior_state() {
        // getWeather declares a required parameter the action omits
        let executor = executor_with(["[ACTION]: getWeather()"]);
        let mut manager = manager_with_tool("getWeather");
        manager.agents[0].tools[0].parameters = vec![crate::catalog::ParameterSpec {
            name: "city".into(),
            type_tag: "string".into(),
            description: String::new(),
            required: true,
        }];

        let mut context = ExecutionContext::new("s1", "alice", "sub-question");
        context.record_result("OtherAgent", "otherTool", json!("prior result"));

        let needs_input = executor.execute(&manager, &mut context, "original").await;
        assert!(needs_input);
        assert_eq!(context.pending_actions[0].agent_id, "WeatherAgent");
        assert_eq!(context.pending_actions[0].required_params, vec!["city"]);
        // the early exit still went through the merge
        assert_eq!(
            context.previous_results["OtherAgent"]["otherTool"],
            json!("prior result")
        );
    }

    #[test]
    fn test_stringify_output_shapes() {
        assert_eq!(stringify_output(&serde_json::json!("plain")), "plain");
        assert_eq!(
            stringify_output(&serde_json::json!({"temp": 27})),
            r#"{"temp":27}"#
        );
        assert_eq!(stringify_output(&serde_json::json!([1, 2])), "[1,2]");
    }
}
