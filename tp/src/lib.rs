//! TripPlan - progressive itinerary streaming and editing
//!
//! TripPlan turns a generator's push-event stream of JSON deltas into a
//! day-by-day itinerary that grows while the stream is still open, then
//! reconciles it against the final document and lets the user drag items
//! between days without losing anything to late-arriving data.
//!
//! # Core Concepts
//!
//! - **Progressive merge**: closed day buckets are extracted from the partial
//!   JSON buffer and merged append-only, deduplicated by normalized title
//! - **One writer**: every mutation goes through the [`session`] actor, so
//!   drags, merges and enrichment patches never interleave mid-update
//! - **Strict finalize**: the final document is clamped and backfilled to the
//!   per-day bounds; an unusable final keeps the progressive plan
//!
//! # Modules
//!
//! - [`stream`] - Push-event frame decoding and encoding
//! - [`plan`] - Item model, extraction, reconciliation and drag reorder
//! - [`generator`] - Plan generator trait, HTTP client and transcript replay
//! - [`enrich`] - Post-finalize place lookups
//! - [`session`] - Actor owning the live plan
//! - [`events`] - Event bus for observers
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod enrich;
pub mod events;
pub mod generator;
pub mod plan;
pub mod session;
pub mod stream;

// Re-export commonly used types
pub use config::{Config, EnrichmentConfig, GeneratorConfig, PlanConfig, PlanMode, ReorderConfig, StreamConfig};
pub use enrich::{EnrichError, Enricher, HttpEnricher};
pub use events::{EventBus, EventEmitter, EventLogEntry, PlanEvent};
pub use generator::{
    ByteStream, GeneratorError, HttpPlanGenerator, PlanGenerator, PlanRequest, ReplayGenerator, create_generator,
};
pub use plan::{
    DropSlot, FinalPlan, FinalizeReport, ItemMetadata, ItemPatch, LayoutMode, MoveOutcome, MoveRejection, PlanDocument,
    PlanError, PlanItem, PlanLimits, PlanReconciler, Point, Rect, ReorderEffect, ReorderEngine, SlotRef, dedup_key,
};
pub use session::{PlanSession, SessionError, SessionOptions, SessionSnapshot};
pub use stream::{FrameDecoder, FrameEncoder, StreamFrame};
