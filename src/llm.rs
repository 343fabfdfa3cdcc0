use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LlmConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LLM returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("failed to parse LLM JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("LLM returned an empty completion")]
    Empty,
}

/// A chat-completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Full chat completion with the main model.
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// Single-prompt query against the (usually smaller) sub model.
    async fn sub_query(&self, prompt: &str) -> Result<String, LlmError>;
}

/// OpenAI-compatible chat completions client. Works against OpenAI, Ollama's
/// `/v1` endpoint and LM Studio alike.
pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    sub_model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            sub_model: config.sub_model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
        })
    }

    /// Resolve the chat completions endpoint from the base URL.
    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    /// Non-streaming chat completion.
    async fn complete(&self, messages: &[Message], model: &str) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": 2048,
        });

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(LlmError::Server {
                status: status.as_u16(),
                body: text,
            });
        }

        let json: serde_json::Value = serde_json::from_str(&text)?;
        extract_content(&json).ok_or(LlmError::Empty)
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.complete(messages, &self.model).await
    }

    async fn sub_query(&self, prompt: &str) -> Result<String, LlmError> {
        self.complete(&[Message::user(prompt)], &self.sub_model).await
    }
}

/// Pull `choices[0].message.content`, treating null or blank content as absent.
fn extract_content(json: &serde_json::Value) -> Option<String> {
    json["choices"]
        .get(0)
        .and_then(|c| c["message"]["content"].as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
