//! Conductor background worker
//!
//! Builds the full service graph — stores, registry, LLM adapter,
//! orchestrator — and consumes jobs from the queue until terminated. Each
//! worker process establishes its own store connections.

use std::sync::Arc;

use conductor::catalog::DefinitionLoader;
use conductor::config::Config;
use conductor::llm::{ChatApiClient, LlmAdapter, LlmClient, PromptSet};
use conductor::logging::ExecutionLogger;
use conductor::memory::EmbeddingService;
use conductor::orchestration::{AgentExecutor, ManagerExecutor, Orchestrator};
use conductor::storage::{
    postgres, ConversationLog, PgCatalogStore, PgConversationStore, PgExecutionLogStore,
    PgJobQueue, PgLongTermMemoryStore,
};
use conductor::tools;
use conductor::worker::Worker;
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
    let prompts = PromptSet::load(&config.prompts_dir)?;
    let adapter = Arc::new(LlmAdapter::new(llm.clone(), prompts));

    let memory_store = Arc::new(PgLongTermMemoryStore::new(pool.clone()));
    let embedder = Arc::new(EmbeddingService::new()?);

    let registry = Arc::new(tools::builtin_registry(
        llm.clone(),
        memory_store,
        embedder,
    ));
    tracing::info!(tools = registry.count(), "tool registry ready");

    let logger = ExecutionLogger::new(
        Arc::new(PgExecutionLogStore::new(pool.clone())),
        llm.model(),
    );
    let conversations = ConversationLog::new(Arc::new(PgConversationStore::new(pool.clone())));
    let loader = DefinitionLoader::new(Arc::new(PgCatalogStore::new(pool.clone())));

    let manager_executor = ManagerExecutor::new(
        adapter.clone(),
        AgentExecutor::new(registry),
        logger.clone(),
        config.limits.max_react_cycles,
    );
    let orchestrator = Arc::new(Orchestrator::new(
        adapter,
        manager_executor,
        loader,
        conversations,
        logger,
        config.limits,
    ));

    let queue = Arc::new(PgJobQueue::new(pool, config.worker.job_max_retries));
    let worker = Worker::new(queue, orchestrator, config.worker.clone());

    worker.run().await;
    Ok(())
}
