//! Long-term-memory batch job
//!
//! Independent process: summarizes aged conversation sessions into the
//! vector memory and prunes the short-term log. Intended to run on a
//! schedule (cron or equivalent).

use std::sync::Arc;

use conductor::config::Config;
use conductor::llm::{ChatApiClient, LlmClient};
use conductor::memory::{EmbeddingService, MemoryJob};
use conductor::storage::{postgres, PgConversationStore, PgLongTermMemoryStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;

    let pool = postgres::init_pool(&config.database).await?;
    postgres::migrations::run(&pool).await?;

    let llm: Arc<dyn LlmClient> = Arc::new(ChatApiClient::new(&config.llm)?);
    let job = MemoryJob::new(
        Arc::new(PgConversationStore::new(pool.clone())),
        Arc::new(PgLongTermMemoryStore::new(pool)),
        Arc::new(EmbeddingService::new()?),
        llm,
        config.memory_retention_days,
    );

    let report = job.run().await?;
    tracing::info!(
        found = report.sessions_found,
        summarized = report.sessions_summarized,
        pruned = report.messages_pruned,
        "memory job finished"
    );

    Ok(())
}
