//! Itinerary model and the logic that keeps it consistent
//!
//! - [`extract`] recovers closed days from a partial JSON buffer
//! - [`PlanReconciler`] owns the document: progressive merge, finalize, moves
//! - [`ReorderEngine`] turns pointer events into moves
//! - [`cost`] and [`title`] normalize costs and derive dedup keys

pub mod cost;
mod error;
mod extract;
mod reconciler;
mod reorder;
pub mod title;
mod types;

pub use error::{MoveRejection, PlanError};
pub use extract::extract;
pub use reconciler::{
    FinalizeReport, ItemPatch, MergeOutcome, MoveOutcome, PlanLimits, PlanReconciler, Underfill,
};
pub use reorder::{
    DEFAULT_COLUMN_PENALTY, DragSession, DragState, DropSlot, LayoutMode, Point, Rect, ReorderEffect, ReorderEngine,
    ReorderNoop,
};
pub use title::dedup_key;
pub use types::{DayBucket, ExtractedDay, FinalPlan, ItemMetadata, PlanDocument, PlanItem, SlotRef};
