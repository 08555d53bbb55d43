//! Core type definitions: message lifecycle records and stream units.

pub mod events;
pub mod message;

pub use events::{EventKind, MessageDelta, StreamEvent};
pub use message::{ChatSendRequest, MessageStatus, PendingMessage};
