//! Error types for failure handling across the chat proxy.
//!
//! A single unified error hierarchy captures every failure mode on the
//! request path. Errors are categorized by their source (upstream model,
//! configuration, validation, streaming) so callers can map them to the
//! right HTTP status or user-visible message without string matching.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ChatError {
    #[error("LLM interaction failed: {0}")]
    LLMError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Parsing error: {0}")]
    ParsingError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Stream error: {0}")]
    StreamError(String),
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        ChatError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::LLMError(err.to_string())
    }
}
