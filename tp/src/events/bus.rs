//! Event Bus - pub/sub for plan session events
//!
//! The EventBus uses tokio broadcast channels to deliver events to all subscribers
//! with minimal latency. The session emits events, consumers (UI, CLI printers) subscribe.

use tokio::sync::broadcast;
use tracing::debug;

use super::types::PlanEvent;
use crate::plan::{FinalizeReport, MoveOutcome, MoveRejection, SlotRef};

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_024;

/// Central event bus for plan session activity
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlanEvent>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Create a new event bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    ///
    /// This is fire-and-forget: if there are no subscribers, the event is dropped.
    /// If the channel is full, slow subscribers lag and see `RecvError::Lagged`.
    pub fn emit(&self, event: PlanEvent) {
        debug!(event_type = event.event_type(), turn = event.turn(), "EventBus::emit");
        // Ignore send errors (no subscribers is OK)
        let _ = self.tx.send(event);
    }

    /// Subscribe to receive events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PlanEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Create an emitter handle bound to one planning turn
    pub fn emitter_for(&self, turn: u64) -> EventEmitter {
        debug!(turn, "EventBus::emitter_for: creating emitter");
        EventEmitter {
            tx: self.tx.clone(),
            turn,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Handle for emitting events tagged with a fixed turn number
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<PlanEvent>,
    turn: u64,
}

impl EventEmitter {
    /// Get the turn this emitter is bound to
    pub fn turn(&self) -> u64 {
        self.turn
    }

    /// Emit a raw event
    pub fn emit(&self, event: PlanEvent) {
        debug!(event_type = event.event_type(), "EventEmitter::emit");
        let _ = self.tx.send(event);
    }

    // === Convenience methods ===

    pub fn turn_started(&self, message: &str) {
        self.emit(PlanEvent::TurnStarted {
            turn: self.turn,
            message: message.to_string(),
        });
    }

    pub fn items_merged(&self, added: usize, total_items: usize) {
        self.emit(PlanEvent::ItemsMerged {
            turn: self.turn,
            added,
            total_items,
        });
    }

    pub fn finalized(&self, reply_text: &str, report: FinalizeReport) {
        self.emit(PlanEvent::Finalized {
            turn: self.turn,
            reply_text: reply_text.to_string(),
            report,
        });
    }

    pub fn finalize_failed(&self, error: &str) {
        self.emit(PlanEvent::FinalizeFailed {
            turn: self.turn,
            error: error.to_string(),
        });
    }

    pub fn turn_failed(&self, error: &str) {
        self.emit(PlanEvent::TurnFailed {
            turn: self.turn,
            error: error.to_string(),
        });
    }

    pub fn turn_cancelled(&self) {
        self.emit(PlanEvent::TurnCancelled { turn: self.turn });
    }

    pub fn turn_ended(&self, finalized: bool) {
        self.emit(PlanEvent::TurnEnded {
            turn: self.turn,
            finalized,
        });
    }

    pub fn drag_started(&self, source: SlotRef) {
        self.emit(PlanEvent::DragStarted { turn: self.turn, source });
    }

    pub fn item_moved(&self, outcome: MoveOutcome) {
        self.emit(PlanEvent::ItemMoved { turn: self.turn, outcome });
    }

    pub fn move_rejected(&self, reason: MoveRejection) {
        self.emit(PlanEvent::MoveRejected { turn: self.turn, reason });
    }

    pub fn item_patched(&self, slot: SlotRef) {
        self.emit(PlanEvent::ItemPatched { turn: self.turn, slot });
    }

    pub fn enrichment_finished(&self, hits: usize) {
        self.emit(PlanEvent::EnrichmentFinished { turn: self.turn, hits });
    }
}
