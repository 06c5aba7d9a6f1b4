//! Enrichment error types

use std::time::Duration;
use thiserror::Error;

/// Errors from a place lookup; all of them are skipped, never surfaced to the plan
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Lookup returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Invalid lookup response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}
