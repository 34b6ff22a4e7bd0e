//! Environment-driven configuration
//!
//! All settings come from environment variables (a `.env` file is honored in
//! development). Credentials are wrapped in `SecretString` so they never leak
//! through Debug output or logs.

use secrecy::SecretString;

use crate::error::{Error, Result};

/// Application name reported by the health endpoint and execution-log metadata
pub const APP_NAME: &str = "Conductor";

/// API version reported in execution-log metadata
pub const API_VERSION: &str = "1.0.0";

/// LLM backend configuration (OpenAI-compatible chat completions API)
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API key for the LLM provider
    pub api_key: SecretString,
    /// Model identifier
    pub model: String,
    /// Base URL of the chat-completions API
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// PostgreSQL configuration (documents, queue, and vector memory)
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection URL
    pub url: SecretString,
    /// Maximum pool connections
    pub max_connections: u32,
    /// Connect/acquire timeout in seconds
    pub connect_timeout_secs: u64,
}

/// Bounds for the two nested decision loops
#[derive(Debug, Clone, Copy)]
pub struct LoopLimits {
    /// Maximum orchestrator delegation cycles per execution
    pub max_cycles: u32,
    /// Maximum reason-act cycles per manager invocation
    pub max_react_cycles: u32,
}

impl Default for LoopLimits {
    fn default() -> Self {
        LoopLimits {
            max_cycles: 5,
            max_react_cycles: 2,
        }
    }
}

/// Worker runtime configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Wall-clock limit for one job in seconds
    pub job_time_limit_secs: u64,
    /// Queue-level retry budget per job
    pub job_max_retries: u32,
    /// Webhook callback timeout in seconds
    pub callback_timeout_secs: u64,
    /// Idle poll interval when the queue is empty, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            job_time_limit_secs: 600,
            job_max_retries: 3,
            callback_timeout_secs: 15,
            poll_interval_ms: 500,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub database: DatabaseConfig,
    pub limits: LoopLimits,
    pub worker: WorkerConfig,
    /// Ingress bind address
    pub bind_addr: String,
    /// Directory holding the prompt templates
    pub prompts_dir: String,
    /// Sessions idle longer than this many days are summarized into long-term memory
    pub memory_retention_days: i64,
    /// Verbose logging / diagnostics flag
    pub debug: bool,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_key = std::env::var("LLM_API_KEY")
            .map_err(|_| Error::Config("LLM_API_KEY is not set".into()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| Error::Config("DATABASE_URL is not set".into()))?;

        Ok(Config {
            llm: LlmConfig {
                api_key: SecretString::from(api_key),
                model: std::env::var("LLM_MODEL")
                    .unwrap_or_else(|_| "openai/gpt-4o-mini".to_string()),
                base_url: std::env::var("LLM_BASE_URL")
                    .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string()),
                timeout_secs: env_parse("LLM_TIMEOUT_SECS", 120),
            },
            database: DatabaseConfig {
                url: SecretString::from(database_url),
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 5),
                connect_timeout_secs: env_parse("DATABASE_TIMEOUT_SECS", 30),
            },
            limits: LoopLimits {
                max_cycles: env_parse("MAX_CYCLES", 5),
                max_react_cycles: env_parse("MAX_REACT_CYCLES", 2),
            },
            worker: WorkerConfig {
                job_time_limit_secs: env_parse("JOB_TIME_LIMIT_SECS", 600),
                job_max_retries: env_parse("JOB_MAX_RETRIES", 3),
                callback_timeout_secs: env_parse("CALLBACK_TIMEOUT_SECS", 15),
                poll_interval_ms: env_parse("WORKER_POLL_INTERVAL_MS", 500),
            },
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            prompts_dir: std::env::var("PROMPTS_DIR").unwrap_or_else(|_| "prompts".to_string()),
            memory_retention_days: env_parse("MEMORY_RETENTION_DAYS", 1),
            debug: std::env::var("DEBUG")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
