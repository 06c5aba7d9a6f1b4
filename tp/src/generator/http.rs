//! HTTP plan generator
//!
//! POSTs a [`PlanRequest`] and hands back the text/event-stream body as raw
//! bytes. Connection setup is retried with exponential backoff; once the
//! first byte of a successful response has been handed out, nothing is
//! retried.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ByteStream, GeneratorError, PlanGenerator, PlanRequest};
use crate::config::GeneratorConfig;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Generator backed by an HTTP endpoint
pub struct HttpPlanGenerator {
    url: String,
    api_key: Option<String>,
    http: Client,
    timeout: Duration,
    max_retries: u32,
    initial_backoff: Duration,
}

impl HttpPlanGenerator {
    /// Create a new generator from configuration
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, GeneratorError> {
        debug!(url = %config.url, timeout_ms = config.timeout_ms, "from_config: called");
        if config.url.trim().is_empty() {
            return Err(GeneratorError::InvalidRequest("generator.url is empty".to_string()));
        }

        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(GeneratorError::Network)?;

        Ok(Self {
            url: config.url.clone(),
            api_key: config.api_key(),
            http,
            timeout,
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Override the first retry delay; later delays double
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    fn map_reqwest(&self, error: reqwest::Error) -> GeneratorError {
        if error.is_timeout() {
            GeneratorError::Timeout(self.timeout)
        } else {
            GeneratorError::Network(error)
        }
    }

    async fn send_once(&self, request: &PlanRequest) -> Result<reqwest::Response, GeneratorError> {
        let mut builder = self
            .http
            .post(&self.url)
            .header("accept", "text/event-stream")
            .header("content-type", "application/json")
            .json(request);
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = builder.send().await.map_err(|e| self.map_reqwest(e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(GeneratorError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PlanGenerator for HttpPlanGenerator {
    async fn generate(&self, request: &PlanRequest) -> Result<ByteStream, GeneratorError> {
        debug!(url = %self.url, message = %request.message, "generate: called");
        request.validate()?;

        let mut attempt = 0;
        let response = loop {
            if attempt > 0 {
                let backoff = self.initial_backoff * 2u32.pow(attempt - 1);
                warn!(
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "generate: retrying after transient error"
                );
                tokio::time::sleep(backoff).await;
            }

            match self.send_once(request).await {
                Ok(response) => break response,
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    debug!(attempt, error = %e, "generate: retryable error");
                    attempt += 1;
                }
                Err(e) => {
                    debug!(attempt, error = %e, "generate: giving up");
                    return Err(e);
                }
            }
        };

        info!(status = response.status().as_u16(), attempt, "generate: stream opened");
        let timeout = self.timeout;
        let stream = response.bytes_stream().map(move |chunk| match chunk {
            Ok(bytes) => Ok(bytes.to_vec()),
            Err(e) if e.is_timeout() => Err(GeneratorError::Timeout(timeout)),
            Err(e) => Err(GeneratorError::Network(e)),
        });
        Ok(stream.boxed())
    }
}
