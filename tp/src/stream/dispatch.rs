//! Frame classification
//!
//! Maps decoded frames onto the three event kinds the planner understands.
//! Anything else is ignored rather than treated as fatal.

use tracing::debug;

use super::frame::StreamFrame;
use crate::config::StreamConfig;

/// What a frame means to the planner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    /// Incremental raw JSON text to append to the plan buffer
    Delta(String),
    /// The complete JSON document for this turn
    Final(String),
    /// The generator reported a failure mid-stream
    ServerError(String),
    /// Unknown event type
    Ignored { event_type: String },
}

/// Routes frames by event name
#[derive(Debug, Clone)]
pub struct FrameDispatcher {
    token_event: String,
    final_event: String,
    error_event: String,
}

impl Default for FrameDispatcher {
    fn default() -> Self {
        Self::from_config(&StreamConfig::default())
    }
}

impl FrameDispatcher {
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            token_event: config.token_event.clone(),
            final_event: config.final_event.clone(),
            error_event: config.error_event.clone(),
        }
    }

    pub fn classify(&self, frame: StreamFrame) -> FrameKind {
        let StreamFrame { event_type, payload } = frame;
        if event_type == self.token_event {
            FrameKind::Delta(payload)
        } else if event_type == self.final_event {
            FrameKind::Final(payload)
        } else if event_type == self.error_event {
            FrameKind::ServerError(payload)
        } else {
            debug!(%event_type, payload_len = payload.len(), "classify: unknown event type");
            FrameKind::Ignored { event_type }
        }
    }
}
