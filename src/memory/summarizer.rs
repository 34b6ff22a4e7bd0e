//! Conversation summarizer: the long-term-memory batch job
//!
//! Runs as an independent process. Sessions whose last message is older than
//! the retention window are summarized with the LLM, embedded, stored in the
//! vector memory, and then pruned from the short-term conversation log. A
//! session whose summary or embedding fails is skipped and retried on the
//! next run.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::error::Result;
use crate::llm::LlmClient;
use crate::memory::Embedder;
use crate::storage::{ConversationStore, LongTermMemoryStore, MemoryPoint, SessionMessages};

/// Outcome of one summarization run
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryJobReport {
    pub sessions_found: usize,
    pub sessions_summarized: usize,
    pub messages_pruned: u64,
}

/// The long-term-memory batch job
pub struct MemoryJob {
    conversations: Arc<dyn ConversationStore>,
    memory: Arc<dyn LongTermMemoryStore>,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LlmClient>,
    retention_days: i64,
}

impl MemoryJob {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        memory: Arc<dyn LongTermMemoryStore>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LlmClient>,
        retention_days: i64,
    ) -> Self {
        MemoryJob {
            conversations,
            memory,
            embedder,
            llm,
            retention_days,
        }
    }

    /// Process every aged session once
    pub async fn run(&self) -> Result<MemoryJobReport> {
        let cutoff = Utc::now() - Duration::days(self.retention_days);
        let sessions = self.conversations.sessions_older_than(cutoff).await?;

        let mut report = MemoryJobReport {
            sessions_found: sessions.len(),
            ..Default::default()
        };
        info!(sessions = sessions.len(), "memory job: sessions to process");

        let mut points = Vec::new();
        let mut processed_ids = Vec::new();

        for session in &sessions {
            match self.summarize_session(session).await {
                Ok(Some(point)) => {
                    points.push(point);
                    processed_ids.push(session.session_id.clone());
                    report.sessions_summarized += 1;
                }
                Ok(None) => {
                    warn!(session_id = %session.session_id, "empty summary; skipping session");
                }
                Err(e) => {
                    warn!(session_id = %session.session_id, "failed to summarize session: {}", e);
                }
            }
        }

        if !points.is_empty() {
            self.memory.upsert(points).await?;
            report.messages_pruned = self.conversations.delete_sessions(&processed_ids).await?;
            info!(
                summarized = report.sessions_summarized,
                pruned = report.messages_pruned,
                "memory job: summaries stored, short-term log pruned"
            );
        }

        Ok(report)
    }

    async fn summarize_session(&self, session: &SessionMessages) -> Result<Option<MemoryPoint>> {
        let conversation_text = session
            .messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.message))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Resuma a seguinte conversa entre um usuário e um assistente de IA em um ou dois parágrafos.\n\
             Foque nos principais problemas resolvidos, informações chave trocadas e no resultado final.\n\
             Não inclua saudações ou despedidas, vá direto ao ponto.\n\n\
             CONVERSA:\n{}\n\nRESUMO CONCISO:",
            conversation_text
        );

        let summary = self.llm.generate(&prompt, None).await?.trim().to_string();
        if summary.is_empty() {
            return Ok(None);
        }

        let embedding = self.embedder.embed(&summary).await?;

        let first = session.messages.first();
        let last = session.messages.last();
        let now = Utc::now();

        Ok(Some(MemoryPoint {
            user_id: session.user_id.clone(),
            session_id: session.session_id.clone(),
            summary,
            conversation_start: first.map(|m| m.timestamp).unwrap_or(now),
            conversation_end: last.map(|m| m.timestamp).unwrap_or(now),
            processed_at: now,
            embedding,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedLlmClient;
    use crate::storage::inmem::{InMemoryConversationStore, InMemoryLongTermMemoryStore};
    use crate::storage::{ConversationMessage, MessageRole};
    use async_trait::async_trait;
    use chrono::Duration;

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.5; 4])
        }

        fn dimensions(&self) -> usize {
            4
        }
    }

    async fn seed_session(
        store: &InMemoryConversationStore,
        session_id: &str,
        age_days: i64,
    ) {
        for (role, text) in [
            (MessageRole::User, "como resolver o bug do projeto Alpha?"),
            (MessageRole::System, "corrigindo a condição de corrida"),
        ] {
            store
                .append(ConversationMessage {
                    session_id: session_id.to_string(),
                    execution_id: "exec_1".to_string(),
                    role,
                    user_id: "alice".to_string(),
                    message: text.to_string(),
                    timestamp: Utc::now() - Duration::days(age_days),
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_aged_sessions_are_summarized_and_pruned() {
        let conversations = Arc::new(InMemoryConversationStore::default());
        let memory = Arc::new(InMemoryLongTermMemoryStore::default());
        let llm = Arc::new(ScriptedLlmClient::new([
            "O usuário resolveu um bug do projeto Alpha.",
        ]));

        seed_session(&conversations, "old-session", 3).await;
        seed_session(&conversations, "fresh-session", 0).await;

        let job = MemoryJob::new(
            conversations.clone(),
            memory.clone(),
            Arc::new(StubEmbedder),
            llm,
            1,
        );
        let report = job.run().await.unwrap();

        assert_eq!(report.sessions_found, 1);
        assert_eq!(report.sessions_summarized, 1);
        assert_eq!(report.messages_pruned, 2);

        let points = memory.points();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].session_id, "old-session");
        assert_eq!(points[0].user_id, "alice");

        // fresh session survives in the short-term log
        let remaining = conversations.messages();
        assert!(remaining.iter().all(|m| m.session_id == "fresh-session"));
    }

    #[tokio::test]
    async fn test_failed_summary_skips_session() {
        let conversations = Arc::new(InMemoryConversationStore::default());
        let memory = Arc::new(InMemoryLongTermMemoryStore::default());
        // the script is empty, so generation errors out
        let llm = Arc::new(ScriptedLlmClient::new(Vec::<String>::new()));

        seed_session(&conversations, "old-session", 3).await;

        let job = MemoryJob::new(
            conversations.clone(),
            memory.clone(),
            Arc::new(StubEmbedder),
            llm,
            1,
        );
        let report = job.run().await.unwrap();

        assert_eq!(report.sessions_summarized, 0);
        assert!(memory.points().is_empty());
        // the session stays for the next run
        assert_eq!(conversations.messages().len(), 2);
    }
}
