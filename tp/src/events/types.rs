//! Event types for plan session observers
//!
//! These events represent everything a UI needs to follow a planning turn:
//! - Turn lifecycle (start, finalize, failure, cancel, end)
//! - Progressive merges while the generator is still streaming
//! - Drag and drop outcomes and enrichment patches

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::plan::{FinalizeReport, MoveOutcome, MoveRejection, SlotRef};

/// Core event enum - the vocabulary of a plan session
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum PlanEvent {
    // === Turn Lifecycle ===
    /// A planning turn has started; the document was cleared
    TurnStarted { turn: u64, message: String },
    /// New items were merged from the partial stream buffer
    ItemsMerged { turn: u64, added: usize, total_items: usize },
    /// The final document replaced the progressive one
    Finalized {
        turn: u64,
        reply_text: String,
        report: FinalizeReport,
    },
    /// The final document was unusable; the progressive plan stays
    FinalizeFailed { turn: u64, error: String },
    /// Transport or server error; surfaced once per turn
    TurnFailed { turn: u64, error: String },
    /// The turn was cancelled by the caller
    TurnCancelled { turn: u64 },
    /// The stream for this turn is over
    TurnEnded { turn: u64, finalized: bool },

    // === Editing ===
    /// The user picked up an item
    DragStarted { turn: u64, source: SlotRef },
    /// A drop was applied
    ItemMoved { turn: u64, outcome: MoveOutcome },
    /// A drop was refused; nothing changed
    MoveRejected { turn: u64, reason: MoveRejection },
    /// Enrichment metadata landed on an item
    ItemPatched { turn: u64, slot: SlotRef },
    /// All post-finalize lookups for the turn have returned
    EnrichmentFinished { turn: u64, hits: usize },
}

impl PlanEvent {
    /// Get the turn this event belongs to
    pub fn turn(&self) -> u64 {
        match self {
            PlanEvent::TurnStarted { turn, .. }
            | PlanEvent::ItemsMerged { turn, .. }
            | PlanEvent::Finalized { turn, .. }
            | PlanEvent::FinalizeFailed { turn, .. }
            | PlanEvent::TurnFailed { turn, .. }
            | PlanEvent::TurnCancelled { turn }
            | PlanEvent::TurnEnded { turn, .. }
            | PlanEvent::DragStarted { turn, .. }
            | PlanEvent::ItemMoved { turn, .. }
            | PlanEvent::MoveRejected { turn, .. }
            | PlanEvent::ItemPatched { turn, .. }
            | PlanEvent::EnrichmentFinished { turn, .. } => *turn,
        }
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            PlanEvent::TurnStarted { .. } => "TurnStarted",
            PlanEvent::ItemsMerged { .. } => "ItemsMerged",
            PlanEvent::Finalized { .. } => "Finalized",
            PlanEvent::FinalizeFailed { .. } => "FinalizeFailed",
            PlanEvent::TurnFailed { .. } => "TurnFailed",
            PlanEvent::TurnCancelled { .. } => "TurnCancelled",
            PlanEvent::TurnEnded { .. } => "TurnEnded",
            PlanEvent::DragStarted { .. } => "DragStarted",
            PlanEvent::ItemMoved { .. } => "ItemMoved",
            PlanEvent::MoveRejected { .. } => "MoveRejected",
            PlanEvent::ItemPatched { .. } => "ItemPatched",
            PlanEvent::EnrichmentFinished { .. } => "EnrichmentFinished",
        }
    }

    /// True for the event that closes a turn
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanEvent::TurnEnded { .. })
    }
}

/// A timestamped event for line-oriented output
#[derive(Clone, Debug, Serialize)]
pub struct EventLogEntry {
    /// Timestamp of the event
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    /// The event
    pub event: PlanEvent,
}

impl EventLogEntry {
    /// Create a new log entry with current timestamp
    pub fn new(event: PlanEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_turn() {
        let event = PlanEvent::TurnCancelled { turn: 7 };
        assert_eq!(event.turn(), 7);

        let event = PlanEvent::ItemPatched {
            turn: 3,
            slot: SlotRef::new(0, 1),
        };
        assert_eq!(event.turn(), 3);
    }

    #[test]
    fn test_event_type() {
        let event = PlanEvent::ItemsMerged {
            turn: 1,
            added: 2,
            total_items: 2,
        };
        assert_eq!(event.event_type(), "ItemsMerged");
        assert!(!event.is_terminal());
        assert!(
            PlanEvent::TurnEnded {
                turn: 1,
                finalized: true
            }
            .is_terminal()
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = PlanEvent::MoveRejected {
            turn: 2,
            reason: MoveRejection::TargetDayFull,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"MoveRejected""#));
        assert!(json.contains(r#""reason":"target_day_full""#));
    }

    #[test]
    fn test_finalized_serialization_includes_report() {
        let event = PlanEvent::Finalized {
            turn: 1,
            reply_text: "Here you go".to_string(),
            report: FinalizeReport {
                turn: 1,
                days: 2,
                backfilled: 1,
                ..Default::default()
            },
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["report"]["backfilled"], 1);
        assert_eq!(value["reply_text"], "Here you go");
    }

    #[test]
    fn test_event_log_entry() {
        let entry = EventLogEntry::new(PlanEvent::TurnStarted {
            turn: 1,
            message: "3 days in San Diego".to_string(),
        });

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("ts"));
        assert!(json.contains("TurnStarted"));
    }
}
