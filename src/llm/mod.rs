//! LLM integration: HTTP client, prompt templates, and the structured adapter
//!
//! The contract with the model is strictly text-in / text-out. Everything
//! structured (delegation decisions, reason-act sections) is parsed out of
//! free text by the adapter, which is total: parse failures degrade to safe
//! defaults, never panics or propagated errors on the decision path.

mod adapter;
mod client;
pub mod mock;
mod templates;

pub use adapter::{
    extract_json_object, parse_react_response, ChatTurn, LlmAdapter, NextActionPlan, ReactStep,
};
pub use client::{ChatApiClient, LlmClient};
pub use templates::PromptSet;
