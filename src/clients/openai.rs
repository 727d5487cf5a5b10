//! OpenAI-compatible chat-completions backend

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clients::traits::{BackendError, Instruction, ModelBackend};
use crate::config::BackendConfig;
use crate::utils::truncate_snippet;

#[derive(Clone, Debug)]
pub struct OpenAiClient {
    endpoint: String,
    api_key: String,
    model: String,
    client: Client,
    request_timeout_ms: u64,
    max_retries: u32,
    retry_delay_ms: u64,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Outcome of a single HTTP attempt that did not produce text.
enum AttemptError {
    Retryable(BackendError),
    Fatal(BackendError),
}

impl OpenAiClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .context("OPENAI_API_KEY is required to build the model backend")?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .context("Failed to build reqwest client with timeout")?;

        Ok(Self {
            endpoint: chat_endpoint(&config.base_url),
            api_key,
            model: config.model.clone(),
            client,
            request_timeout_ms: config.request_timeout_ms,
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn attempt(&self, body: &ChatRequest<'_>) -> Result<String, AttemptError> {
        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            let err = BackendError::Unavailable {
                message: format!(
                    "OpenAI API error {}: {}",
                    status,
                    truncate_snippet(text.trim(), 300)
                ),
            };
            return Err(if is_retryable_status(status) {
                AttemptError::Retryable(err)
            } else {
                AttemptError::Fatal(err)
            });
        }

        let parsed: ChatResponse = res.json().await.map_err(|e| {
            if e.is_timeout() {
                AttemptError::Fatal(BackendError::Timeout {
                    timeout_ms: self.request_timeout_ms,
                })
            } else {
                AttemptError::Fatal(BackendError::Unavailable {
                    message: format!("Failed to decode completion envelope: {}", e),
                })
            }
        })?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            AttemptError::Fatal(BackendError::Unavailable {
                message: "completion contained no choices".to_string(),
            })
        })?;

        // A null content is passed through as empty text; the caller decides
        // whether that parses.
        Ok(choice.message.content.unwrap_or_default())
    }

    fn classify_transport(&self, err: reqwest::Error) -> AttemptError {
        if err.is_timeout() {
            AttemptError::Fatal(BackendError::Timeout {
                timeout_ms: self.request_timeout_ms,
            })
        } else {
            AttemptError::Retryable(BackendError::Unavailable {
                message: format!("HTTP request failed: {}", err),
            })
        }
    }
}

#[async_trait]
impl ModelBackend for OpenAiClient {
    async fn complete(&self, instruction: &Instruction) -> Result<String, BackendError> {
        let body = build_request(&self.model, instruction);

        debug!(
            task = instruction.task.as_str(),
            prompt = instruction.prompt_id,
            model = %self.model,
            max_tokens = instruction.max_tokens,
            "sending chat completion"
        );

        let mut last_err: Option<BackendError> = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay_ms = self.retry_delay_ms.saturating_mul(1u64 << (attempt - 1).min(16));
                warn!(
                    task = instruction.task.as_str(),
                    attempt,
                    delay_ms,
                    "retrying chat completion"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            match self.attempt(&body).await {
                Ok(text) => return Ok(text),
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Retryable(e)) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| BackendError::Unavailable {
            message: "Unknown chat completion error".to_string(),
        }))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn build_request<'a>(model: &'a str, instruction: &'a Instruction) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: [
            ChatMessage {
                role: "system",
                content: &instruction.system,
            },
            ChatMessage {
                role: "user",
                content: &instruction.user,
            },
        ],
        temperature: instruction.temperature,
        max_tokens: instruction.max_tokens,
        response_format: instruction.structured.then_some(ResponseFormat {
            kind: "json_object",
        }),
    }
}

/// Ensure the configured base URL points at the chat-completions route.
fn chat_endpoint(base_url: &str) -> String {
    if base_url.ends_with("/chat/completions") {
        base_url.to_string()
    } else {
        format!("{}/chat/completions", base_url.trim_end_matches('/'))
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
