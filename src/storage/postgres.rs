//! PostgreSQL connection pool and schema migrations

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use secrecy::ExposeSecret;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// PostgreSQL connection pool type alias
pub type PostgresPool = PgPool;

/// Initialize the PostgreSQL connection pool
pub async fn init_pool(config: &DatabaseConfig) -> Result<PostgresPool> {
    info!("Initializing PostgreSQL connection pool");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(config.url.expose_secret())
        .await?;

    verify_database(&pool).await?;

    info!("PostgreSQL connection pool initialized successfully");
    Ok(pool)
}

/// Verify the connection and the pgvector extension
async fn verify_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;

    let result: Option<(String,)> =
        sqlx::query_as("SELECT extname FROM pg_extension WHERE extname = 'vector'")
            .fetch_optional(pool)
            .await?;

    if result.is_none() {
        return Err(Error::Database(sqlx::Error::Configuration(
            "pgvector extension is not installed. Run: CREATE EXTENSION vector;".into(),
        )));
    }

    Ok(())
}

/// Database migrations
pub mod migrations {
    use super::*;
    use tracing::warn;

    /// Run all migrations
    pub async fn run(pool: &PgPool) -> Result<()> {
        info!("Running database migrations");

        match sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(pool)
            .await
        {
            Ok(_) => info!("pgvector extension enabled"),
            Err(e) => {
                warn!(
                    "Could not create pgvector extension: {}. Vector memory may not work.",
                    e
                );
            }
        }

        // Conversation history
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversation_history (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                session_id TEXT NOT NULL,
                execution_id TEXT NOT NULL,
                role TEXT NOT NULL,
                user_id TEXT NOT NULL,
                message TEXT NOT NULL,
                timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .execute(pool)
        .await?;

        // Execution logs: one JSONB document per completed execution
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS execution_logs (
                execution_id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                start_timestamp TIMESTAMPTZ NOT NULL,
                doc JSONB NOT NULL
            )
        "#,
        )
        .execute(pool)
        .await?;

        // Users and definition catalog
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS catalog_users (
                username TEXT PRIMARY KEY,
                projects JSONB NOT NULL DEFAULT '[]',
                settings JSONB NOT NULL DEFAULT '{}'
            )
        "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS catalog_managers (
                manager_id TEXT PRIMARY KEY,
                project_name TEXT NOT NULL,
                active BOOLEAN NOT NULL DEFAULT TRUE,
                definition JSONB NOT NULL
            )
        "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS catalog_agents (
                agent_id TEXT PRIMARY KEY,
                active BOOLEAN NOT NULL DEFAULT TRUE,
                definition JSONB NOT NULL
            )
        "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS catalog_tools (
                tool_name TEXT PRIMARY KEY,
                active BOOLEAN NOT NULL DEFAULT TRUE,
                definition JSONB NOT NULL
            )
        "#,
        )
        .execute(pool)
        .await?;

        // Long-term memory: summarized conversations with 768-dim embeddings
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS long_term_memory (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                summary TEXT NOT NULL,
                conversation_start TIMESTAMPTZ NOT NULL,
                conversation_end TIMESTAMPTZ NOT NULL,
                processed_at TIMESTAMPTZ NOT NULL,
                embedding vector(768)
            )
        "#,
        )
        .execute(pool)
        .await?;

        // Background job queue
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                payload JSONB NOT NULL,
                status TEXT NOT NULL DEFAULT 'queued',
                attempts INTEGER NOT NULL DEFAULT 0,
                enqueued_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                claimed_at TIMESTAMPTZ
            )
        "#,
        )
        .execute(pool)
        .await?;

        // Indexes (each must be a separate query for SQLx)
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_conversation_history_session ON conversation_history(session_id)",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_conversation_history_session_ts ON conversation_history(session_id, timestamp)",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_execution_logs_session ON execution_logs(session_id)",
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status, enqueued_at)")
            .execute(pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_long_term_memory_user ON long_term_memory(user_id)",
        )
        .execute(pool)
        .await?;

        // Cosine-distance index for memory search (IVFFlat)
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_long_term_memory_embedding ON long_term_memory
            USING ivfflat (embedding vector_cosine_ops) WITH (lists = 100)
        "#,
        )
        .execute(pool)
        .await
        .ok(); // Ignore if not enough data or vector type not available

        info!("Database migrations complete");
        Ok(())
    }
}
