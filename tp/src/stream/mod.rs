//! Push-event transport handling
//!
//! - [`frame`] decodes `event:`/`data:` text into frames
//! - [`dispatch`] classifies frames for the planner
//! - [`emit`] encodes frames on the producing side
//! - [`utf8`] reassembles text from network byte chunks

mod dispatch;
mod emit;
mod frame;
mod utf8;

pub use dispatch::{FrameDispatcher, FrameKind};
pub use emit::{FrameEncoder, encode_frame};
pub use frame::{DEFAULT_DONE_SENTINEL, DEFAULT_EVENT_TYPE, FrameDecoder, StreamFrame};
pub use utf8::Utf8Reassembler;
