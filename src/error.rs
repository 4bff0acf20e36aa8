//! Error types for GeneProg

use thiserror::Error;

/// Result type alias using GeneProg's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for GeneProg
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The remote tool provider could not be reached or refused the session
    #[error("Tool provider unavailable: {0}")]
    ToolProviderUnavailable(String),

    /// The chat-completion service failed or returned an unusable response
    #[error("Model call failed: {0}")]
    ModelCall(String),

    /// Malformed JSON-RPC traffic from the tool provider
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Environment variable error
    #[error("Environment error: {0}")]
    Env(#[from] std::env::VarError),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unauthorized access
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Http(_)
                | Error::ToolProviderUnavailable(_)
                | Error::RateLimit(_)
                | Error::Timeout(_)
        )
    }

    /// Check if error is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::Unauthorized(_))
    }
}
