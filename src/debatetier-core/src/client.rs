//! Generation client seam.
//!
//! The runner only needs "send this prompt at this budget, get text back".
//! `OpenAiClient` does that against any OpenAI-compatible endpoint; tests
//! substitute a scripted client.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::budget::Budget;
use crate::error::DebateError;

/// One generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub budget: Budget,
    pub system: String,
    pub user: String,
}

#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Issue one completion and return the raw text.
    async fn complete(&self, request: GenerationRequest) -> Result<String, DebateError>;
}

/// Connection settings for an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// OpenAI-compatible API base URL.
    pub api_base: String,
    /// API key for authentication.
    pub api_key: String,
}

impl ClientConfig {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
        }
    }
}

/// [`GenerationClient`] backed by `async-openai`.
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
}

impl OpenAiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, DebateError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                DebateError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(&config.api_base);

        Ok(Self {
            client: Client::with_config(openai_config).with_http_client(http_client),
        })
    }
}

#[async_trait]
impl GenerationClient for OpenAiClient {
    async fn complete(&self, request: GenerationRequest) -> Result<String, DebateError> {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: request.system.into(),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: request.user.into(),
                name: None,
            }),
        ];

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&request.model)
            .max_completion_tokens(request.budget.max_tokens)
            .temperature(request.budget.temperature)
            .messages(messages)
            .build()?;

        debug!(
            model = %request.model,
            max_tokens = request.budget.max_tokens,
            temperature = request.budget.temperature,
            "sending completion request"
        );

        let response = self.client.chat().create(chat_request).await?;
        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}
