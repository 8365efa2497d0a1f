//! Error types for the proxy server.

use confab_core::ChatError;
use thiserror::Error;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
    /// Request failed validation before any upstream call.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The upstream model call failed.
    #[error("Upstream model call failed: {0}")]
    Upstream(#[from] ChatError),

    /// Server configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (bind, accept).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status the error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) => 400,
            ServerError::Upstream(_)
            | ServerError::Config(_)
            | ServerError::Io(_)
            | ServerError::Internal(_) => 500,
        }
    }
}
