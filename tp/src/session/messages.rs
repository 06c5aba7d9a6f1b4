//! Plan session messages
//!
//! Commands and responses for the actor pattern.

use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::generator::{GeneratorError, PlanRequest};
use crate::plan::{DropSlot, ItemPatch, LayoutMode, PlanDocument, PlanError, Point, Rect, ReorderEffect, SlotRef};

/// Errors from session operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("Channel error")]
    ChannelError,
}

/// Response from session operations
pub type SessionResponse<T> = Result<T, SessionError>;

/// Point-in-time copy of everything an observer renders
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub turn: u64,
    pub finalized: bool,
    /// The generator stream for this turn is still open
    pub streaming: bool,
    /// Post-finalize lookups are still running
    pub enriching: bool,
    pub reply_text: Option<String>,
    pub request: Option<PlanRequest>,
    pub layout: LayoutMode,
    /// Source slot of the active drag, if any
    pub dragging: Option<SlotRef>,
    pub document: PlanDocument,
}

/// Commands sent to the PlanSession actor
#[derive(Debug)]
pub enum SessionCommand {
    // Turn lifecycle
    StartTurn {
        request: PlanRequest,
        reply: oneshot::Sender<SessionResponse<u64>>,
    },
    CancelTurn {
        reply: oneshot::Sender<SessionResponse<bool>>,
    },

    // Posted by the stream reader task
    StreamChunk {
        turn: u64,
        text: String,
    },
    StreamClosed {
        turn: u64,
        error: Option<GeneratorError>,
    },

    // Pointer events
    PointerDown {
        source: SlotRef,
        pointer: Point,
        item_rect: Rect,
        reply: oneshot::Sender<ReorderEffect>,
    },
    PointerMove {
        pointer: Point,
        reply: oneshot::Sender<ReorderEffect>,
    },
    PointerUp {
        pointer: Point,
        reply: oneshot::Sender<ReorderEffect>,
    },
    CancelDrag {
        reply: oneshot::Sender<ReorderEffect>,
    },
    SetLayout {
        layout: LayoutMode,
        reply: oneshot::Sender<()>,
    },
    SetSlots {
        slots: Vec<DropSlot>,
        reply: oneshot::Sender<()>,
    },

    // Enrichment
    /// `turn: None` targets the current turn
    ApplyPatch {
        turn: Option<u64>,
        day: usize,
        index: usize,
        patch: ItemPatch,
        reply: Option<oneshot::Sender<SessionResponse<SlotRef>>>,
    },
    EnrichmentDone {
        turn: u64,
        hits: usize,
    },

    // Queries
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },

    Shutdown,
}
