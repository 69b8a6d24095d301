use super::types::{ChatMessage, ChatRequest, ChatResponse};
use crate::config::LlmConfig;
use crate::error::{credential_error, llm_error, AppResult, Error};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, warn};

pub const INVALID_API_KEY: &str =
    "Invalid OpenRouter API key. Please re-configure your key in settings.";

const RETRY_BACKOFF: Duration = Duration::from_millis(250);
const APP_REFERER: &str = "https://github.com/calchat/calchat";
const APP_TITLE: &str = "calchat";

/// A chat completion backend
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the conversation and return the assistant's reply.
    ///
    /// An empty `tools` slice sends no tool definitions at all.
    async fn complete(&self, messages: &[ChatMessage], tools: &[Value]) -> AppResult<ChatMessage>;
}

/// OpenRouter (OpenAI-compatible) chat completions client.
///
/// Built per request from the user's decrypted key and dropped afterwards.
pub struct OpenRouterClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_attempts: u32,
}

impl fmt::Debug for OpenRouterClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRouterClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

/// Outcome of a single HTTP attempt
enum AttemptError {
    Retryable(String),
    Fatal(Error),
}

impl OpenRouterClient {
    pub fn new(config: &LlmConfig, api_key: impl Into<String>, model: Option<&str>) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| llm_error(&format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(&config.default_model)
                .to_string(),
            max_attempts: config.max_attempts.max(1),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn attempt(&self, request: &ChatRequest) -> Result<ChatResponse, AttemptError> {
        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", APP_REFERER)
            .header("X-Title", APP_TITLE)
            .json(request)
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    warn!("OpenRouter rejected the API key: HTTP {}", status);
                    AttemptError::Fatal(credential_error(INVALID_API_KEY))
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    AttemptError::Retryable(format!("Rate limited: HTTP {} - {}", status, body))
                }
                s if s.is_server_error() => {
                    AttemptError::Retryable(format!("HTTP {} - {}", status, body))
                }
                _ => {
                    error!("OpenRouter request failed: HTTP {} - {}", status, body);
                    AttemptError::Fatal(llm_error(&format!("HTTP {}", status)))
                }
            });
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| AttemptError::Fatal(llm_error(&format!("Failed to parse response: {}", e))))
    }
}

#[async_trait]
impl ChatModel for OpenRouterClient {
    async fn complete(&self, messages: &[ChatMessage], tools: &[Value]) -> AppResult<ChatMessage> {
        let request = ChatRequest::new(&self.model, messages.to_vec(), tools.to_vec());

        let mut attempt = 1;
        let response = loop {
            match self.attempt(&request).await {
                Ok(response) => break response,
                Err(AttemptError::Fatal(err)) => return Err(err),
                Err(AttemptError::Retryable(cause)) if attempt < self.max_attempts => {
                    warn!(
                        "OpenRouter attempt {}/{} failed, retrying: {}",
                        attempt, self.max_attempts, cause
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(AttemptError::Retryable(cause)) => {
                    error!("OpenRouter request failed after {} attempts: {}", attempt, cause);
                    return Err(llm_error(&cause));
                }
            }
        };

        if let Some(usage) = response.usage {
            debug!(
                "OpenRouter usage: {} prompt + {} completion tokens",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| llm_error("Response contained no choices"))
    }
}
