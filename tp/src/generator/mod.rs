//! Plan generators
//!
//! A generator turns a [`PlanRequest`] into a raw text/event-stream body.
//! Framing, extraction and reconciliation happen downstream in the session.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod error;
mod http;
mod replay;

pub use client::{ByteStream, PlanGenerator, PlanRequest};
pub use error::GeneratorError;
pub use http::HttpPlanGenerator;
pub use replay::{DEFAULT_CHUNK_SIZE, ReplayGenerator};

use crate::config::GeneratorConfig;

/// Create the HTTP generator described by config
pub fn create_generator(config: &GeneratorConfig) -> Result<Arc<dyn PlanGenerator>, GeneratorError> {
    debug!(url = %config.url, "create_generator: called");
    Ok(Arc::new(HttpPlanGenerator::from_config(config)?))
}
