//! Plan session with actor pattern
//!
//! PlanSession owns the live itinerary for one conversation and processes
//! stream chunks, pointer events and enrichment patches via channels.

mod manager;
mod messages;

pub use manager::{PlanSession, SessionOptions};
pub use messages::{SessionCommand, SessionError, SessionResponse, SessionSnapshot};
