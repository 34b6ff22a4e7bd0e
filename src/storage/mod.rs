//! Storage contracts and backends
//!
//! Every persistent collaborator is a trait so the orchestration engine can
//! be driven against in-memory fakes in tests and PostgreSQL in production:
//!
//! - `ConversationStore`: per-session chronological message log
//! - `ExecutionLogStore`: one durable document per execution
//! - `CatalogStore`: user records and the manager/agent/tool catalog
//! - `LongTermMemoryStore`: summarized conversations with 768-dim embeddings
//! - `JobQueue`: at-least-once background job queue
//!
//! All backend writes are single-row atomic operations; no in-process lock is
//! held across awaits on the orchestration path.

mod catalog_pg;
mod conversation;
mod execution_log;
pub mod inmem;
mod long_term_memory;
pub mod postgres;
mod queue;

pub use catalog_pg::PgCatalogStore;
pub use conversation::{ConversationLog, PgConversationStore};
pub use execution_log::PgExecutionLogStore;
pub use long_term_memory::PgLongTermMemoryStore;
pub use queue::{CallbackDetails, ClaimedJob, JobPayload, PgJobQueue};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::ManagerDefinition;
use crate::error::Result;
use crate::logging::ExecutionLogDoc;

/// Who authored a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    System,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// One message in the per-session conversation log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub session_id: String,
    pub execution_id: String,
    pub role: MessageRole,
    pub user_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// All messages of one session, grouped for the memory batch job
#[derive(Debug, Clone)]
pub struct SessionMessages {
    pub session_id: String,
    pub user_id: String,
    pub messages: Vec<ConversationMessage>,
}

/// Per-user feature switches
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub long_term_memory_enabled: bool,
}

/// A user record from the catalog store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub settings: UserSettings,
}

/// A summarized conversation stored in long-term memory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryPoint {
    pub user_id: String,
    pub session_id: String,
    pub summary: String,
    pub conversation_start: DateTime<Utc>,
    pub conversation_end: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
    /// 768-dim embedding of the summary
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

/// A long-term-memory search hit
#[derive(Debug, Clone)]
pub struct MemoryHit {
    pub summary: String,
    pub conversation_end: DateTime<Utc>,
    /// Cosine similarity in [0, 1], higher is more similar
    pub score: f32,
}

/// Per-session chronological message store
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append one message (atomic)
    async fn append(&self, message: ConversationMessage) -> Result<()>;

    /// Last `n` messages of a session in chronological order
    async fn recent(&self, session_id: &str, n: usize) -> Result<Vec<ConversationMessage>>;

    /// Full history of a session in chronological order
    async fn history(&self, session_id: &str) -> Result<Vec<ConversationMessage>>;

    /// Remove all messages of a session
    async fn clear_session(&self, session_id: &str) -> Result<u64>;

    /// Sessions whose last message is older than `cutoff`, with their messages
    async fn sessions_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<SessionMessages>>;

    /// Remove all messages of the given sessions
    async fn delete_sessions(&self, session_ids: &[String]) -> Result<u64>;
}

/// Durable store for finalized execution-log documents
#[async_trait]
pub trait ExecutionLogStore: Send + Sync {
    /// Insert a finalized document; `execution_id` is unique
    async fn insert(&self, doc: &ExecutionLogDoc) -> Result<()>;

    /// Latest document for a session by `start_timestamp`
    async fn latest_for_session(&self, session_id: &str) -> Result<Option<ExecutionLogDoc>>;
}

/// User records and the manager/agent/tool definition catalog
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn fetch_user(&self, user_id: &str) -> Result<Option<UserRecord>>;

    /// Active managers of the given projects with active agents/tools nested
    async fn fetch_managers_for_projects(
        &self,
        projects: &[String],
    ) -> Result<Vec<ManagerDefinition>>;
}

/// Vector store for summarized conversations
#[async_trait]
pub trait LongTermMemoryStore: Send + Sync {
    async fn upsert(&self, points: Vec<MemoryPoint>) -> Result<()>;

    /// Top-`limit` summaries for a user by cosine similarity to `embedding`
    async fn search(
        &self,
        user_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<MemoryHit>>;
}

/// At-least-once background job queue
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, payload: &JobPayload) -> Result<()>;

    /// Claim the next queued job, if any
    async fn claim(&self) -> Result<Option<ClaimedJob>>;

    /// Acknowledge successful processing
    async fn complete(&self, job_id: uuid::Uuid) -> Result<()>;

    /// Record a failed attempt; the job is re-queued until its retry budget
    /// is exhausted, then dead-lettered
    async fn fail(&self, job_id: uuid::Uuid) -> Result<()>;
}
