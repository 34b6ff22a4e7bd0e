//! Scripted LLM client for tests and offline development
//!
//! Returns canned responses in order and records every prompt it receives.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::client::LlmClient;

/// An `LlmClient` that replays a fixed script of responses
pub struct ScriptedLlmClient {
    responses: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
    calls: Mutex<usize>,
}

impl ScriptedLlmClient {
    /// Build a client that returns `responses` in order, then errors
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedLlmClient {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
            calls: Mutex::new(0),
        }
    }

    /// All prompts received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Number of generate calls made so far
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn generate(&self, prompt: &str, _system_instruction: Option<&str>) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        *self.calls.lock().unwrap() += 1;

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(Error::Llm("scripted responses exhausted".into()));
        }
        Ok(responses.remove(0))
    }

    fn model(&self) -> &str {
        "scripted-test-model"
    }
}
