//! OpenAI-compatible chat-completions client

use async_trait::async_trait;
use reqwest::{header, Client};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// Text-in / text-out LLM contract
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion for `prompt`, optionally under a system instruction
    async fn generate(&self, prompt: &str, system_instruction: Option<&str>) -> Result<String>;

    /// Model identifier, for execution-log metadata
    fn model(&self) -> &str;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u32,
}

/// HTTP client for an OpenAI-compatible chat-completions API
#[derive(Clone)]
pub struct ChatApiClient {
    client: Client,
    base_url: String,
    model: String,
}

impl ChatApiClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret()))
                .map_err(|e| Error::Config(format!("Invalid API key format: {}", e)))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(ChatApiClient {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl LlmClient for ChatApiClient {
    async fn generate(&self, prompt: &str, system_instruction: Option<&str>) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_instruction {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        debug!(model = %self.model, "sending chat completion request");

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(%status, "LLM API error: {}", error_text);
            return Err(Error::Llm(format!("API error ({}): {}", status, error_text)));
        }

        let body = response.json::<ChatCompletionResponse>().await?;
        if let Some(usage) = &body.usage {
            info!(model = %self.model, tokens = usage.total_tokens, "chat completion received");
        }

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Llm("empty completion response".into()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}
