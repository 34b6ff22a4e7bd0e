//! Conversation log: PostgreSQL backend plus the cached service wrapper

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use tracing::{debug, warn};

use crate::error::Result;

use super::postgres::PostgresPool;
use super::{ConversationMessage, ConversationStore, MessageRole, SessionMessages};

/// PostgreSQL-backed conversation store
#[derive(Clone)]
pub struct PgConversationStore {
    pool: PostgresPool,
}

impl PgConversationStore {
    pub fn new(pool: PostgresPool) -> Self {
        PgConversationStore { pool }
    }
}

type MessageRow = (String, String, String, String, String, DateTime<Utc>);

fn row_to_message(row: MessageRow) -> ConversationMessage {
    let (session_id, execution_id, role, user_id, message, timestamp) = row;
    ConversationMessage {
        session_id,
        execution_id,
        role: if role == "user" {
            MessageRole::User
        } else {
            MessageRole::System
        },
        user_id,
        message,
        timestamp,
    }
}

#[async_trait]
impl ConversationStore for PgConversationStore {
    async fn append(&self, message: ConversationMessage) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO conversation_history (session_id, execution_id, role, user_id, message, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6)
        "#,
        )
        .bind(&message.session_id)
        .bind(&message.execution_id)
        .bind(message.role.to_string())
        .bind(&message.user_id)
        .bind(&message.message)
        .bind(message.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(&self, session_id: &str, n: usize) -> Result<Vec<ConversationMessage>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT session_id, execution_id, role, user_id, message, timestamp
            FROM conversation_history
            WHERE session_id = $1
            ORDER BY timestamp DESC
            LIMIT $2
        "#,
        )
        .bind(session_id)
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await?;

        // newest-first from the query; reverse to chronological order
        Ok(rows.into_iter().rev().map(row_to_message).collect())
    }

    async fn history(&self, session_id: &str) -> Result<Vec<ConversationMessage>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT session_id, execution_id, role, user_id, message, timestamp
            FROM conversation_history
            WHERE session_id = $1
            ORDER BY timestamp ASC
        "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_message).collect())
    }

    async fn clear_session(&self, session_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM conversation_history WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn sessions_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<SessionMessages>> {
        let stale: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT session_id
            FROM conversation_history
            GROUP BY session_id
            HAVING MAX(timestamp) < $1
        "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        let mut sessions = Vec::with_capacity(stale.len());
        for (session_id,) in stale {
            let messages = self.history(&session_id).await?;
            let Some(first) = messages.first() else {
                continue;
            };
            sessions.push(SessionMessages {
                session_id,
                user_id: first.user_id.clone(),
                messages,
            });
        }
        Ok(sessions)
    }

    async fn delete_sessions(&self, session_ids: &[String]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM conversation_history WHERE session_id = ANY($1)")
            .bind(session_ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Conversation-log service: wraps a store with an in-process snapshot cache.
///
/// Full-history reads are cached per session as immutable `Arc` snapshots;
/// every write invalidates the session's entry. Writes are best-effort on the
/// orchestration path — a store failure is logged, not propagated.
#[derive(Clone)]
pub struct ConversationLog {
    store: Arc<dyn ConversationStore>,
    history_cache: Cache<String, Arc<[ConversationMessage]>>,
}

impl ConversationLog {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        ConversationLog {
            store,
            history_cache: Cache::builder()
                .max_capacity(500)
                .time_to_live(Duration::from_secs(5 * 60))
                .build(),
        }
    }

    /// Record a message; failures are logged and swallowed (logging is
    /// best-effort by design)
    pub async fn log_message(
        &self,
        session_id: &str,
        execution_id: &str,
        role: MessageRole,
        user_id: &str,
        message: &str,
    ) {
        let entry = ConversationMessage {
            session_id: session_id.to_string(),
            execution_id: execution_id.to_string(),
            role,
            user_id: user_id.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        };

        if let Err(e) = self.store.append(entry).await {
            warn!(session_id, "failed to persist conversation message: {}", e);
        }
        self.history_cache.invalidate(session_id).await;
    }

    /// Last `n` messages of a session in chronological order (uncached)
    pub async fn last_messages(&self, session_id: &str, n: usize) -> Vec<ConversationMessage> {
        match self.store.recent(session_id, n).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(session_id, "failed to read recent messages: {}", e);
                Vec::new()
            }
        }
    }

    /// Full session history as an immutable snapshot
    pub async fn full_history(&self, session_id: &str) -> Arc<[ConversationMessage]> {
        if let Some(cached) = self.history_cache.get(session_id).await {
            debug!(session_id, "conversation history cache hit");
            return cached;
        }

        let history: Arc<[ConversationMessage]> = match self.store.history(session_id).await {
            Ok(messages) => messages.into(),
            Err(e) => {
                warn!(session_id, "failed to read conversation history: {}", e);
                Vec::new().into()
            }
        };

        self.history_cache
            .insert(session_id.to_string(), history.clone())
            .await;
        history
    }

    /// Remove a session's history and drop its cache entry
    pub async fn clear_session(&self, session_id: &str) -> Result<u64> {
        self.history_cache.invalidate(session_id).await;
        self.store.clear_session(session_id).await
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::inmem::InMemoryConversationStore;

    #[tokio::test]
    async fn test_write_invalidates_history_cache() {
        let store = Arc::new(InMemoryConversationStore::default());
        let log = ConversationLog::new(store);

        log.log_message("s1", "exec_1", MessageRole::User, "alice", "first")
            .await;
        let snapshot = log.full_history("s1").await;
        assert_eq!(snapshot.len(), 1);

        log.log_message("s1", "exec_1", MessageRole::System, "orchestrator", "reply")
            .await;
        let refreshed = log.full_history("s1").await;
        assert_eq!(refreshed.len(), 2);
        // the first snapshot is unaffected by the later write
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn test_last_messages_chronological() {
        let store = Arc::new(InMemoryConversationStore::default());
        let log = ConversationLog::new(store);

        for i in 0..5 {
            log.log_message("s1", "exec_1", MessageRole::User, "alice", &format!("m{}", i))
                .await;
        }

        let last = log.last_messages("s1", 3).await;
        let texts: Vec<&str> = last.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["m2", "m3", "m4"]);
    }
}
