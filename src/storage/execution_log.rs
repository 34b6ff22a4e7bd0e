//! PostgreSQL execution-log store: one JSONB document per execution

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

use crate::error::Result;
use crate::logging::ExecutionLogDoc;

use super::postgres::PostgresPool;
use super::ExecutionLogStore;

/// PostgreSQL-backed execution-log store
#[derive(Clone)]
pub struct PgExecutionLogStore {
    pool: PostgresPool,
}

impl PgExecutionLogStore {
    pub fn new(pool: PostgresPool) -> Self {
        PgExecutionLogStore { pool }
    }
}

#[async_trait]
impl ExecutionLogStore for PgExecutionLogStore {
    async fn insert(&self, doc: &ExecutionLogDoc) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO execution_logs (execution_id, session_id, start_timestamp, doc)
            VALUES ($1, $2, $3, $4)
        "#,
        )
        .bind(&doc.execution_id)
        .bind(&doc.session_id)
        .bind(doc.start_timestamp)
        .bind(Json(doc))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_for_session(&self, session_id: &str) -> Result<Option<ExecutionLogDoc>> {
        let row: Option<(Json<ExecutionLogDoc>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT doc, start_timestamp
            FROM execution_logs
            WHERE session_id = $1
            ORDER BY start_timestamp DESC
            LIMIT 1
        "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(Json(doc), _)| doc))
    }
}
