//! Conductor HTTP ingress
//!
//! Accepts questions on `POST /api/v1/ask`, enqueues them for the background
//! workers, and answers 202 with tracking ids.

use std::sync::Arc;

use conductor::config::Config;
use conductor::gateway;
use conductor::storage::{postgres, PgJobQueue};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;

    let pool = postgres::init_pool(&config.database).await?;
    postgres::migrations::run(&pool).await?;

    let queue = Arc::new(PgJobQueue::new(pool, config.worker.job_max_retries));
    let app = gateway::router(queue);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("ingress listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
