//! # Conductor
//!
//! A hierarchical AI agent orchestrator. An HTTP ingress accepts a
//! natural-language question and enqueues it; background workers drive a
//! two-level delegation loop — orchestrator picks managers, each manager
//! runs a bounded reason-act loop over its agents' tools — and the result
//! is delivered via webhook callback.
//!
//! ## Architecture
//!
//! - **Catalog** (`catalog`): manager/agent/tool definitions and the
//!   per-user loader
//! - **Context** (`context`): the per-request state with its consolidation
//!   invariants
//! - **LLM** (`llm`): chat-API client, prompt templates, and the structured
//!   adapter that parses decisions and reason-act sections out of free text
//! - **Orchestration** (`orchestration`): the delegation loop, the manager
//!   reason-act loop, and the agent executor
//! - **Tools** (`tools`): the plug-in contract, the registry, and the
//!   built-in plug-ins (API calls, prompt execution, capabilities, memory)
//! - **Storage** (`storage`): trait contracts with PostgreSQL and in-memory
//!   backends (conversation log, execution logs, catalog, vector memory,
//!   job queue)
//! - **Logging** (`logging`): the durable hierarchical execution log
//! - **Memory** (`memory`): embeddings and the conversation summarizer job
//! - **Worker** (`worker`): the queue consumer with webhook callbacks
//! - **Gateway** (`gateway`): the axum ingress router
//!
//! ## Design principles
//!
//! 1. **Explicit services**: stores, registry, and loggers are long-lived
//!    services constructed at startup and injected — no hidden globals
//! 2. **Total parsing**: LLM output parsers never fail; mangled responses
//!    degrade to safe defaults
//! 3. **Snapshot-and-merge**: nested loops can never lose a sibling's
//!    results or rewrite history

// Definition catalog and per-user loader
pub mod catalog;

// Environment-driven configuration
pub mod config;

// Per-request execution state
pub mod context;

// Error types
pub mod error;

// HTTP ingress router
pub mod gateway;

// LLM client, templates, and structured adapter
pub mod llm;

// Durable execution logging
pub mod logging;

// Embeddings and the long-term-memory batch job
pub mod memory;

// The hierarchical orchestration engine
pub mod orchestration;

// Storage contracts and backends
pub mod storage;

// Tool plug-ins and registry
pub mod tools;

// Background worker runtime
pub mod worker;

// Re-export commonly used items
pub use error::{Error, Result};

pub use catalog::{AgentDefinition, DefinitionLoader, ManagerDefinition, ToolDefinition, ToolKind};
pub use context::{ExecutionContext, PendingAction};
pub use orchestration::{AgentExecutor, ManagerExecutor, Orchestrator, OrchestratorResponse};
pub use tools::{Tool, ToolRegistry, ToolResult};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
