//! Generator error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while requesting or reading a plan stream
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Generator returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Generator reported: {0}")]
    Server(String),
}

impl GeneratorError {
    /// Check if a fresh attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            GeneratorError::Network(e) => e.is_connect() || e.is_timeout(),
            GeneratorError::Status { status, .. } => is_retryable_status(*status),
            GeneratorError::Timeout(_) => true,
            GeneratorError::Cancelled
            | GeneratorError::Io(_)
            | GeneratorError::InvalidRequest(_)
            | GeneratorError::Server(_) => false,
        }
    }
}

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}
