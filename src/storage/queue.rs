//! Background job queue
//!
//! The queue contract is at-least-once: a claimed job that fails (or whose
//! worker dies before acknowledging) is re-queued until its retry budget is
//! exhausted. The PostgreSQL implementation claims with
//! `FOR UPDATE SKIP LOCKED` so concurrent workers never double-claim.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use uuid::Uuid;

use crate::error::Result;

use super::postgres::PostgresPool;
use super::JobQueue;

/// Where to deliver the result of a job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub addressing_info: Value,
}

/// The payload queued for one orchestration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    pub task_id: String,
    pub user_id: String,
    pub session_id: String,
    pub user_input: String,
    #[serde(default)]
    pub callback_details: CallbackDetails,
}

/// A job claimed by a worker
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: Uuid,
    pub payload: JobPayload,
    /// Attempt number, 1-based
    pub attempts: u32,
}

/// PostgreSQL-backed job queue
#[derive(Clone)]
pub struct PgJobQueue {
    pool: PostgresPool,
    max_retries: u32,
}

impl PgJobQueue {
    pub fn new(pool: PostgresPool, max_retries: u32) -> Self {
        PgJobQueue { pool, max_retries }
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, payload: &JobPayload) -> Result<()> {
        sqlx::query("INSERT INTO jobs (payload) VALUES ($1)")
            .bind(Json(payload))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn claim(&self) -> Result<Option<ClaimedJob>> {
        let row: Option<(Uuid, Json<JobPayload>, i32)> = sqlx::query_as(
            r#"
            UPDATE jobs
            SET status = 'running', attempts = attempts + 1, claimed_at = NOW()
            WHERE id = (
                SELECT id FROM jobs
                WHERE status = 'queued'
                ORDER BY enqueued_at
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING id, payload, attempts
        "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, Json(payload), attempts)| ClaimedJob {
            id,
            payload,
            attempts: attempts as u32,
        }))
    }

    async fn complete(&self, job_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fail(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = CASE WHEN attempts >= $2 THEN 'failed' ELSE 'queued' END
            WHERE id = $1
        "#,
        )
        .bind(job_id)
        .bind(self.max_retries as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
