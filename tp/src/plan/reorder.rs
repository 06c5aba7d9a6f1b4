//! Drag-based reorder/move engine
//!
//! ```text
//! Idle --pointer_down--> Dragging --pointer_up--> Idle
//!                           |  ^
//!                           +--+ pointer_move (re-score drop slots)
//!                           +-----cancel-----> Idle
//! ```
//!
//! The engine never touches the document while dragging. The drop is one
//! call into [`PlanReconciler::apply_move`], clamped against the document as
//! it is at drop time, so progressive merges that land mid-drag are honored.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::MoveRejection;
use super::reconciler::{MoveOutcome, PlanReconciler};
use super::types::{PlanItem, SlotRef};

/// Score added when the pointer is outside a slot's day column
pub const DEFAULT_COLUMN_PENALTY: f64 = 1_000.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }
}

/// A known drop position reported by the layout
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DropSlot {
    pub day: usize,
    /// Insert position within the day (`0..=len`)
    pub index: usize,
    /// Vertical position of the gap
    pub y: f64,
    pub column_left: f64,
    pub column_right: f64,
}

impl DropSlot {
    pub fn slot(&self) -> SlotRef {
        SlotRef::new(self.day, self.index)
    }

    fn score(&self, pointer: Point, column_penalty: f64) -> f64 {
        let vertical = (pointer.y - self.y).abs();
        let outside = pointer.x < self.column_left || pointer.x > self.column_right;
        if outside { vertical + column_penalty } else { vertical }
    }
}

/// How days are laid out; dragging is only available in the calendar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    #[default]
    Calendar,
    List,
}

/// State held between pointer-down and pointer-up
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub source: SlotRef,
    pub snapshot: PlanItem,
    pub pointer: Point,
    /// Rendered bounds of the item at pointer-down
    pub item_rect: Rect,
    /// Pointer position relative to the item's top-left corner
    pub grab_offset: Point,
    pub hovered: Option<DropSlot>,
}

impl DragSession {
    /// Where the dragged item should be drawn under the pointer
    pub fn ghost_rect(&self) -> Rect {
        Rect::new(
            self.pointer.x - self.grab_offset.x,
            self.pointer.y - self.grab_offset.y,
            self.item_rect.width,
            self.item_rect.height,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragState {
    Idle,
    Dragging(Box<DragSession>),
}

/// Why a pointer event did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorderNoop {
    NotCalendarLayout,
    DragAlreadyActive,
    NoActiveDrag,
    NoSuchItem,
}

/// Effect of one pointer event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum ReorderEffect {
    DragStarted { source: SlotRef },
    Hovered { target: Option<SlotRef> },
    Dropped { outcome: MoveOutcome },
    Rejected { reason: MoveRejection },
    Canceled,
    Noop { reason: ReorderNoop },
}

/// Pointer-driven reorder state machine
#[derive(Debug, Clone)]
pub struct ReorderEngine {
    state: DragState,
    layout: LayoutMode,
    slots: Vec<DropSlot>,
    column_penalty: f64,
}

impl Default for ReorderEngine {
    fn default() -> Self {
        Self::new(DEFAULT_COLUMN_PENALTY)
    }
}

impl ReorderEngine {
    pub fn new(column_penalty: f64) -> Self {
        Self {
            state: DragState::Idle,
            layout: LayoutMode::default(),
            slots: Vec::new(),
            column_penalty,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn session(&self) -> Option<&DragSession> {
        match &self.state {
            DragState::Dragging(session) => Some(session),
            DragState::Idle => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    pub fn layout(&self) -> LayoutMode {
        self.layout
    }

    /// Switching away from the calendar abandons any drag
    pub fn set_layout(&mut self, layout: LayoutMode) {
        debug!(?layout, "set_layout: called");
        self.layout = layout;
        if layout != LayoutMode::Calendar {
            self.state = DragState::Idle;
        }
    }

    /// Replace the known drop slots; order defines tie-breaking
    pub fn set_slots(&mut self, slots: Vec<DropSlot>) {
        debug!(slot_count = slots.len(), "set_slots: called");
        self.slots = slots;
        if let DragState::Dragging(session) = &mut self.state {
            session.hovered = nearest_slot(&self.slots, session.pointer, self.column_penalty);
        }
    }

    pub fn pointer_down(
        &mut self,
        source: SlotRef,
        pointer: Point,
        item_rect: Rect,
        reconciler: &PlanReconciler,
    ) -> ReorderEffect {
        debug!(%source, ?pointer, "pointer_down: called");
        if self.layout != LayoutMode::Calendar {
            return ReorderEffect::Noop {
                reason: ReorderNoop::NotCalendarLayout,
            };
        }
        if self.is_dragging() {
            return ReorderEffect::Noop {
                reason: ReorderNoop::DragAlreadyActive,
            };
        }
        let Some(item) = reconciler.document().item(source) else {
            return ReorderEffect::Noop {
                reason: ReorderNoop::NoSuchItem,
            };
        };

        self.state = DragState::Dragging(Box::new(DragSession {
            source,
            snapshot: item.clone(),
            pointer,
            item_rect,
            grab_offset: Point::new(pointer.x - item_rect.x, pointer.y - item_rect.y),
            hovered: None,
        }));
        ReorderEffect::DragStarted { source }
    }

    pub fn pointer_move(&mut self, pointer: Point) -> ReorderEffect {
        let DragState::Dragging(session) = &mut self.state else {
            return ReorderEffect::Noop {
                reason: ReorderNoop::NoActiveDrag,
            };
        };

        session.pointer = pointer;
        if let Some(best) = nearest_slot(&self.slots, pointer, self.column_penalty) {
            session.hovered = Some(best);
        }
        ReorderEffect::Hovered {
            target: session.hovered.map(|slot| slot.slot()),
        }
    }

    /// Finish the drag and apply the move against the current document
    pub fn pointer_up(&mut self, pointer: Point, reconciler: &mut PlanReconciler) -> ReorderEffect {
        let DragState::Dragging(mut session) = std::mem::replace(&mut self.state, DragState::Idle) else {
            return ReorderEffect::Noop {
                reason: ReorderNoop::NoActiveDrag,
            };
        };

        // Release only commits what the last move hovered
        session.pointer = pointer;
        let target = session.hovered.map(|slot| slot.slot()).unwrap_or(session.source);
        debug!(source = %session.source, %target, "pointer_up: dropping");

        match reconciler.apply_move(session.source, target, &session.snapshot) {
            Ok(outcome) => ReorderEffect::Dropped { outcome },
            Err(reason) => {
                debug!(%reason, "pointer_up: move rejected");
                ReorderEffect::Rejected { reason }
            }
        }
    }

    pub fn cancel(&mut self) -> ReorderEffect {
        match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Dragging(session) => {
                debug!(source = %session.source, "cancel: drag abandoned");
                ReorderEffect::Canceled
            }
            DragState::Idle => ReorderEffect::Noop {
                reason: ReorderNoop::NoActiveDrag,
            },
        }
    }
}

/// Lowest score wins; ties keep the earliest slot
fn nearest_slot(slots: &[DropSlot], pointer: Point, column_penalty: f64) -> Option<DropSlot> {
    let mut best: Option<(f64, DropSlot)> = None;
    for slot in slots {
        let score = slot.score(pointer, column_penalty);
        if best.is_none_or(|(best_score, _)| score < best_score) {
            best = Some((score, *slot));
        }
    }
    best.map(|(_, slot)| slot)
}
