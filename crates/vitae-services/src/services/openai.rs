//! OpenAI chat completion provider.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vitae_core::PipelineError;

use super::completion::{filter_supported_messages, ChatMessage, ChatRole, CompletionClient};

#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

// Chat Completions API request/response
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<MessageParam<'a>>,
}

#[derive(Debug, Serialize)]
struct MessageParam<'a> {
    role: ChatRole,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            max_tokens,
            client,
        })
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn call_chat_completions(&self, messages: Vec<MessageParam<'_>>) -> Result<String> {
        let body = ChatCompletionRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages,
        };

        let start = std::time::Instant::now();
        let response = self
            .client
            .post(self.chat_completions_url())
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Failed to send Chat Completions API request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "OpenAI Chat Completions API failed with status {}: {}",
                status,
                error_text
            ));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse Chat Completions API response")?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("OpenAI response contained no choices"))?
            .message
            .content
            .unwrap_or_default();

        tracing::debug!(
            model = %self.model,
            response_len = text.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Chat completion received"
        );

        Ok(text)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, PipelineError> {
        let supported: Vec<MessageParam<'_>> = filter_supported_messages(messages)
            .into_iter()
            .map(|(role, content)| MessageParam { role, content })
            .collect();

        if supported.is_empty() {
            return Err(PipelineError::Completion(
                "no messages provided to be sent to OpenAI".to_string(),
            ));
        }

        self.call_chat_completions(supported).await.map_err(|e| {
            tracing::error!(error = %e, model = %self.model, "OpenAI completion failed");
            PipelineError::Completion(format!("{:#}", e))
        })
    }
}
