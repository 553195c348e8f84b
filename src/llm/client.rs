//! Chat-completions client for OpenRouter, OpenAI and Anthropic.

use crate::config::{LlmConfig, LlmProvider};
use crate::otel::llm_span;
use crate::types::{EvalError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::Instrument;

/// Stop sequences sent to OpenRouter-hosted models.
const STOP_TOKENS: [&str; 2] = ["<|endoftext|>", "<|eot_id|>"];

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Chat message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message of a chat prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Anything that can answer a chat prompt.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, for logging.
    fn model(&self) -> &str;

    /// Send messages and return the assistant's text.
    ///
    /// # Arguments
    ///
    /// * `messages` - Full conversation, system message first if any
    /// * `attempt` - 1-based attempt number, for tracing
    ///
    /// # Errors
    ///
    /// Returns `EvalError::LlmError` on transport, status or payload failures
    async fn chat(&self, messages: &[ChatMessage], attempt: usize) -> Result<String>;
}

/// OpenAI-compatible response (OpenRouter and OpenAI).
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Anthropic API response.
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

/// HTTP chat client.
pub struct LlmClient {
    config: LlmConfig,
    http: Client,
}

impl LlmClient {
    /// Create new client.
    ///
    /// # Arguments
    ///
    /// * `config` - Provider, model, key and sampling settings
    ///
    /// # Errors
    ///
    /// Returns `EvalError::ConfigError` if the API key is empty, or
    /// `EvalError::HttpError` if the HTTP client cannot be built
    pub fn new(config: LlmConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(EvalError::config(format!(
                "{} is empty",
                config.provider.api_key_var()
            )));
        }

        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { config, http })
    }

    /// Create from environment variables (see `LlmConfig::from_env`).
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not found in environment
    pub fn from_env() -> Result<Self> {
        Self::new(LlmConfig::from_env()?)
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Call an OpenAI-compatible chat completions endpoint.
    async fn call_chat_completions(&self, messages: &[ChatMessage]) -> Result<String> {
        let provider = self.config.provider.as_str();

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });
        if self.config.provider == LlmProvider::OpenRouter {
            payload["stop"] = json!(STOP_TOKENS);
        }

        let response = self
            .http
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| EvalError::llm(format!("{} API error: {}", provider, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EvalError::llm(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(EvalError::llm(format!(
                "{} API error {}: {}",
                provider, status, body
            )));
        }

        let parsed: CompletionResponse = serde_json::from_str(&body).map_err(|e| {
            EvalError::llm(format!("Failed to parse {} response: {}", provider, e))
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| EvalError::llm(format!("No response from {}", provider)))?;

        Ok(choice.message.content.unwrap_or_default())
    }

    /// Call the Anthropic messages API.
    ///
    /// System messages are lifted into the top-level `system` field.
    async fn call_anthropic(&self, messages: &[ChatMessage]) -> Result<String> {
        let system = messages
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let conversation: Vec<&ChatMessage> = messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .collect();

        let response = self
            .http
            .post(self.config.endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&json!({
                "model": self.config.model,
                "max_tokens": self.config.max_tokens,
                "system": system,
                "messages": conversation,
                "temperature": self.config.temperature,
            }))
            .send()
            .await
            .map_err(|e| EvalError::llm(format!("Anthropic API error: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EvalError::llm(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(EvalError::llm(format!(
                "Anthropic API error {}: {}",
                status, body
            )));
        }

        let parsed: AnthropicResponse = serde_json::from_str(&body)
            .map_err(|e| EvalError::llm(format!("Failed to parse Anthropic response: {}", e)))?;

        Ok(parsed
            .content
            .first()
            .ok_or_else(|| EvalError::llm("No response from Anthropic"))?
            .text
            .clone())
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn chat(&self, messages: &[ChatMessage], attempt: usize) -> Result<String> {
        let span = llm_span(self.config.provider.as_str(), &self.config.model, attempt);

        async move {
            let text = match self.config.provider {
                LlmProvider::OpenRouter | LlmProvider::OpenAI => {
                    self.call_chat_completions(messages).await?
                }
                LlmProvider::Anthropic => self.call_anthropic(messages).await?,
            };
            tracing::debug!(response = %text, "model responded");
            Ok(text)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_value(ChatMessage::system("rules")).unwrap();
        assert_eq!(json, json!({"role": "system", "content": "rules"}));
    }

    #[test]
    fn test_completion_response_parsing() {
        let body = r#"{"id":"gen-1","choices":[{"index":0,"message":{"role":"assistant","content":"SELECT 1;"}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("SELECT 1;"));

        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let err = LlmClient::new(LlmConfig::new("gpt-4o", "  ")).err().unwrap();
        assert!(matches!(err, EvalError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_llm_error() {
        let mut config = LlmConfig::new("deepseek/deepseek-chat-v3-0324:free", "key");
        config.endpoint = Some("http://127.0.0.1:1/v1/chat/completions".to_string());
        let client = LlmClient::new(config).unwrap();

        let err = client
            .chat(&[ChatMessage::user("count customers")], 1)
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::LlmError(_)));
    }
}
