//! Top-level delegation loop
//!
//! One invocation per job: load the user's catalog, open the logs, then ask
//! the delegator — at most `max_cycles` times — whether to delegate to a
//! manager or synthesize the final answer. Delegations run on a deep-copied
//! step context and are merged back, so a manager can never lose a sibling's
//! results.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::catalog::DefinitionLoader;
use crate::config::LoopLimits;
use crate::context::{consolidate_results, ExecutionContext};
use crate::llm::{ChatTurn, LlmAdapter};
use crate::logging::ExecutionLogger;
use crate::storage::{ConversationLog, JobPayload, MessageRole};

use super::manager_executor::ManagerExecutor;

/// Message of the pending response asking the user for more input
pub const PENDING_INPUT_MESSAGE: &str = "Precisamos de mais informações para continuar.";

const NO_MANAGERS_APOLOGY: &str =
    "Não tenho as ferramentas necessárias para responder à sua pergunta no momento.";
const DECISION_ERROR_APOLOGY: &str =
    "Desculpe, ocorreu um erro no meu processo de decisão.";
const NO_ANSWER_FALLBACK: &str = "Desculpe, não consegui elaborar uma resposta.";

/// How many prior session messages the delegator sees
const CHAT_HISTORY_MESSAGES: usize = 10;

/// The outcome of one orchestration run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorResponse {
    Completed {
        session_id: String,
        response: String,
    },
    Pending {
        session_id: String,
        message: String,
        required_params: Vec<String>,
        context: Box<ExecutionContext>,
    },
    Error {
        message: String,
    },
}

/// The top-level orchestration engine
pub struct Orchestrator {
    adapter: Arc<LlmAdapter>,
    manager_executor: ManagerExecutor,
    loader: DefinitionLoader,
    conversations: ConversationLog,
    logger: ExecutionLogger,
    limits: LoopLimits,
}

impl Orchestrator {
    pub fn new(
        adapter: Arc<LlmAdapter>,
        manager_executor: ManagerExecutor,
        loader: DefinitionLoader,
        conversations: ConversationLog,
        logger: ExecutionLogger,
        limits: LoopLimits,
    ) -> Self {
        Orchestrator {
            adapter,
            manager_executor,
            loader,
            conversations,
            logger,
            limits,
        }
    }

    /// Process one queued job to completion, suspension, or failure
    pub async fn process_task(&self, job: &JobPayload) -> crate::error::Result<OrchestratorResponse> {
        if job.user_id.is_empty() || job.user_input.is_empty() {
            return Err(crate::error::Error::InvalidInput(
                "user_id e user_input são obrigatórios no payload da tarefa.".into(),
            ));
        }

        info!(session_id = %job.session_id, task_id = %job.task_id, "orchestrator processing task");

        let mut context =
            ExecutionContext::new(&job.session_id, &job.user_id, &job.user_input);

        match self.loader.load_for_user(&context.user_id).await {
            Ok(defs) => {
                context.available_managers = defs.managers;
                context.available_agents = defs.agents;
            }
            Err(e) => {
                error!(user_id = %context.user_id, "failed to load definitions: {}", e);
            }
        }

        if context.available_managers.is_empty() {
            warn!(user_id = %context.user_id, "no active managers for user");
            return Ok(OrchestratorResponse::Completed {
                session_id: context.session_id,
                response: NO_MANAGERS_APOLOGY.to_string(),
            });
        }

        self.initialize_logs(&mut context).await;
        Ok(self.delegation_loop(&mut context).await)
    }

    async fn initialize_logs(&self, context: &mut ExecutionContext) {
        let hex = Uuid::new_v4().simple().to_string();
        let execution_id = format!("exec_{}", &hex[..8]);
        context.execution_id = Some(execution_id.clone());

        self.conversations
            .log_message(
                &context.session_id,
                &execution_id,
                MessageRole::User,
                &context.user_id,
                &context.user_question,
            )
            .await;

        self.logger
            .initialize(
                &context.session_id,
                &execution_id,
                &context.user_id,
                &context.user_question,
            )
            .await;
    }

    async fn delegation_loop(&self, context: &mut ExecutionContext) -> OrchestratorResponse {
        let chat_history: Vec<ChatTurn> = self
            .conversations
            .last_messages(&context.session_id, CHAT_HISTORY_MESSAGES)
            .await
            .into_iter()
            .map(|m| ChatTurn {
                role: m.role.to_string(),
                message: m.message,
            })
            .collect();

        for cycle in 0..self.limits.max_cycles {
            info!(
                session_id = %context.session_id,
                cycle = cycle + 1,
                max = self.limits.max_cycles,
                "orchestration cycle"
            );

            let plan = self
                .adapter
                .decide_next_manager_action(context, &chat_history)
                .await;

            let thought = plan
                .thought
                .clone()
                .unwrap_or_else(|| "Nenhum pensamento registrado.".to_string());
            info!("[ORCHESTRATOR_THOUGHT]: {}", thought);
            context
                .react_history
                .push(format!("[ORCHESTRATOR_THOUGHT]: {}", thought));

            match plan.decision.as_str() {
                "final_answer" => {
                    info!("delegator signaled completion; building final response");
                    let final_answer = self
                        .build_final_response(context, plan.final_answer.as_deref())
                        .await;
                    return self.completed_response(context, final_answer).await;
                }
                "call_manager" => {
                    let (Some(manager_id), Some(new_question)) =
                        (plan.manager_id.clone(), plan.new_question.clone())
                    else {
                        let message = "Decisão de chamar manager inválida (faltando manager_id ou new_question).";
                        error!("{}", message);
                        return self
                            .completed_response(
                                context,
                                format!("Ocorreu um erro interno: {}", message),
                            )
                            .await;
                    };

                    info!(%manager_id, %new_question, "delegating to manager");
                    let needs_input = self
                        .execute_single_manager(context, &manager_id, &new_question)
                        .await;

                    if needs_input {
                        info!("execution paused awaiting user input");
                        return self.pending_response(context).await;
                    }
                }
                other => {
                    error!("unknown delegator decision '{}'; finishing", other);
                    return self
                        .completed_response(context, DECISION_ERROR_APOLOGY.to_string())
                        .await;
                }
            }
        }

        warn!(
            session_id = %context.session_id,
            "max orchestration cycles reached; forcing final response"
        );
        let final_answer = self.build_final_response(context, None).await;
        self.completed_response(context, final_answer).await
    }

    /// Delegate one step to a manager and merge its context back
    async fn execute_single_manager(
        &self,
        context: &mut ExecutionContext,
        manager_id: &str,
        new_question: &str,
    ) -> bool {
        let Some(manager) = context.find_manager(manager_id).cloned() else {
            error!(manager_id, "manager not found or not permitted for user");
            context.react_history.push(format!(
                "[ORCHESTRATOR_OBSERVATION]: Tentativa de chamar um manager inválido '{}'.",
                manager_id
            ));
            return false;
        };

        self.logger
            .add_manager(&context.session_id, manager_id, new_question)
            .await;

        let mut step = context.step_context(new_question);
        let needs_input = self
            .manager_executor
            .execute(&manager, &mut step, &context.user_question)
            .await;

        consolidate_results(&mut context.previous_results, &step.previous_results);
        context.react_history.extend(step.react_history);
        if needs_input {
            context.pending_actions = step.pending_actions;
        }

        needs_input
    }

    /// Collect per-agent formatting guidelines and synthesize the final
    /// user-facing answer
    async fn build_final_response(
        &self,
        context: &ExecutionContext,
        coerced_answer: Option<&str>,
    ) -> String {
        let mut guidelines = Vec::new();
        for agent_id in context.previous_results.keys() {
            let Some(agent) = context.available_agents.get(agent_id) else {
                warn!(%agent_id, "result-producing agent missing from catalog; no guideline");
                continue;
            };
            if let Some(guideline) = &agent.response_guideline {
                guidelines.push(format!(
                    "Para os resultados do especialista '{}', siga esta regra de formato: '{}'",
                    agent.description, guideline
                ));
            }
        }

        match self
            .adapter
            .consolidate_final_response(context, &guidelines)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("final-response consolidation failed: {}", e);
                coerced_answer
                    .map(String::from)
                    .unwrap_or_else(|| NO_ANSWER_FALLBACK.to_string())
            }
        }
    }

    async fn completed_response(
        &self,
        context: &ExecutionContext,
        final_answer: String,
    ) -> OrchestratorResponse {
        self.log_final_response(context, &final_answer).await;
        OrchestratorResponse::Completed {
            session_id: context.session_id.clone(),
            response: final_answer,
        }
    }

    async fn pending_response(&self, context: &ExecutionContext) -> OrchestratorResponse {
        let Some(first) = context.pending_actions.first() else {
            error!("pending response requested without a pending action");
            return OrchestratorResponse::Error {
                message: "Erro interno.".to_string(),
            };
        };

        self.logger
            .update_pending_actions(&context.session_id, &context.pending_actions)
            .await;
        self.logger.finalize(&context.session_id, "pending").await;

        OrchestratorResponse::Pending {
            session_id: context.session_id.clone(),
            message: PENDING_INPUT_MESSAGE.to_string(),
            required_params: first.required_params.clone(),
            context: Box::new(context.clone()),
        }
    }

    async fn log_final_response(&self, context: &ExecutionContext, response: &str) {
        let execution_id = context.execution_id.as_deref().unwrap_or_default();
        self.conversations
            .log_message(
                &context.session_id,
                execution_id,
                MessageRole::System,
                "orchestrator",
                response,
            )
            .await;
        self.logger
            .update_final_output(&context.session_id, response)
            .await;
        self.logger.finalize(&context.session_id, "completed").await;
    }
}
