//! PostgreSQL + pgvector long-term memory store
//!
//! Summarized conversations with 768-dim embeddings, searched by cosine
//! similarity and always filtered by `user_id`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;

use crate::error::Result;

use super::postgres::PostgresPool;
use super::{LongTermMemoryStore, MemoryHit, MemoryPoint};

/// PostgreSQL-backed long-term memory store
#[derive(Clone)]
pub struct PgLongTermMemoryStore {
    pool: PostgresPool,
}

impl PgLongTermMemoryStore {
    pub fn new(pool: PostgresPool) -> Self {
        PgLongTermMemoryStore { pool }
    }
}

#[async_trait]
impl LongTermMemoryStore for PgLongTermMemoryStore {
    async fn upsert(&self, points: Vec<MemoryPoint>) -> Result<()> {
        for point in points {
            sqlx::query(
                r#"
                INSERT INTO long_term_memory
                    (user_id, session_id, summary, conversation_start, conversation_end, processed_at, embedding)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
            )
            .bind(&point.user_id)
            .bind(&point.session_id)
            .bind(&point.summary)
            .bind(point.conversation_start)
            .bind(point.conversation_end)
            .bind(point.processed_at)
            .bind(Vector::from(point.embedding.clone()))
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn search(
        &self,
        user_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<MemoryHit>> {
        let query_vector = Vector::from(embedding.to_vec());

        let rows: Vec<(String, DateTime<Utc>, f64)> = sqlx::query_as(
            r#"
            SELECT summary, conversation_end, 1 - (embedding <=> $1) AS score
            FROM long_term_memory
            WHERE user_id = $2 AND embedding IS NOT NULL
            ORDER BY embedding <=> $1
            LIMIT $3
        "#,
        )
        .bind(&query_vector)
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(summary, conversation_end, score)| MemoryHit {
                summary,
                conversation_end,
                score: score as f32,
            })
            .collect())
    }
}
