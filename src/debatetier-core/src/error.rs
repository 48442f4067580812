//! Error types for turn routing and analysis recovery.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DebateError {
    #[error("Result not valid structured data: {0}")]
    MalformedResponse(String),

    #[error("OpenAI API error: {0}")]
    OpenAIError(#[from] async_openai::error::OpenAIError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Model '{model}' returned an empty response")]
    EmptyResponse { model: String },
}
