//! # chat-relay
//!
//! A streaming chat-completion relay: accepts a chat request, opens a
//! server-sent-event (SSE) stream to an upstream conversational model
//! provider, incrementally parses the streamed payload into message deltas,
//! fans those deltas out to independent consumers, and persists the
//! accumulating message state so partial failures never lose conversational
//! context.
//!
//! ## Overview
//!
//! Each turn runs as one independent session:
//!
//! ```text
//! caller → request builder → event-stream client → raw events
//!            → dispatcher ─┬→ console listener      (diagnostics)
//!                          ├→ persistence listener  (parser + store)
//!                          └→ forwarding listener   (caller's channel)
//! ```
//!
//! Listeners are independent failure domains: one listener's error never
//! blocks delivery to the others, and a disconnected caller never aborts
//! persistence. The persisted message always reaches a terminal status
//! (COMPLETE or FAILED) with whatever partial answer was accumulated.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chat_relay::{ChatRelay, ChatSendRequest, MemoryStore};
//! use std::sync::Arc;
//!
//! # async fn example(resolver: Arc<dyn chat_relay::RoomConfigResolver>) -> chat_relay::Result<()> {
//! let relay = ChatRelay::new(resolver, Arc::new(MemoryStore::new()))?;
//!
//! let mut handle = relay
//!     .start_chat_stream(ChatSendRequest::new("room-1", "Hello, how are you?"))
//!     .await?;
//!
//! while let Some(fragment) = handle.next_fragment().await {
//!     print!("{}", fragment?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Room config resolution and credential normalization |
//! | [`request`] | Outbound conversation request payload |
//! | [`transport`] | Pooled HTTP client for SSE connections |
//! | [`stream`] | SSE framing, fan-out dispatch, parsing, listeners |
//! | [`storage`] | Message persistence contract |
//! | [`session`] | Session orchestration and the caller-facing handle |
//! | [`types`] | Message lifecycle records and stream units |

pub mod config;
pub mod error;
pub mod request;
pub mod session;
pub mod storage;
pub mod stream;
pub mod transport;
pub mod types;

pub use config::{ConfigKey, RoomConfigResolver, RoomEndpoint};
pub use error::Error;
pub use session::{CancelHandle, ChatRelay, ChatStreamHandle};
pub use storage::{MemoryStore, MessageStore};
pub use stream::{ListenerFailure, StreamListener};
pub use types::{
    ChatSendRequest, EventKind, MessageDelta, MessageStatus, PendingMessage, StreamEvent,
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A pinned, boxed stream of fallible items
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;
