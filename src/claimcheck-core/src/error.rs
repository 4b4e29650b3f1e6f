//! Error types for the fact-checking pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FactCheckError {
    #[error("OpenAI API error: {0}")]
    OpenAIError(#[from] async_openai::error::OpenAIError),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Collaborator error: {0}")]
    CollaboratorError(String),
}
