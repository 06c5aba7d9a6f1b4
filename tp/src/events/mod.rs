//! Event bus for live plan updates
//!
//! The session actor is the only emitter. Observers (a UI, the CLI printer)
//! subscribe and re-read the document snapshot when they need the full state.
//!
//! ```text
//!   PlanSession ──emit──> EventBus (tokio::sync::broadcast) ──> subscribers
//!     TurnStarted, ItemsMerged, Finalized, ItemMoved, ItemPatched, ...
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use tripplan::events::EventBus;
//!
//! let bus = EventBus::with_default_capacity();
//! let mut rx = bus.subscribe();
//! bus.emitter_for(1).turn_started("3 days in San Diego");
//! while let Ok(event) = rx.recv().await {
//!     println!("{}", event.event_type());
//! }
//! ```

mod bus;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter};
pub use types::{EventLogEntry, PlanEvent};
