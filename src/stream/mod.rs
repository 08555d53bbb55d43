//! Stream processing: SSE framing, fan-out dispatch, parsing, and the
//! built-in listeners.
//!
//! ```text
//! Raw Bytes → SseFrameDecoder → Dispatcher ─┬→ ConsoleListener
//!                                           ├→ PersistingListener (parser + store)
//!                                           └→ ForwardingListener (caller channel)
//! ```
//!
//! The dispatcher delivers every event to every listener in registration
//! order, one event at a time: all listeners see event N before any sees
//! event N+1, so consumers that reconstruct the whole transcript observe a
//! single global order.

pub mod console;
pub mod decode;
pub mod forward;
pub mod parse;
pub mod persist;

pub use console::ConsoleListener;
pub use decode::{EventStream, SseFrameDecoder};
pub use forward::ForwardingListener;
pub use parse::ResponseParser;
pub use persist::PersistingListener;

use crate::types::StreamEvent;
use crate::Result;
use async_trait::async_trait;
use tracing::warn;

/// One consumer of the raw event stream.
///
/// Listeners are independent failure domains: an error returned from
/// `on_event` is recorded and never prevents delivery of that event to the
/// remaining listeners, nor of future events to anyone.
#[async_trait]
pub trait StreamListener: Send {
    fn name(&self) -> &'static str;

    async fn on_event(&mut self, event: &StreamEvent) -> Result<()>;
}

/// A recorded per-listener failure, surfaced to the caller after the stream
/// ends.
#[derive(Debug)]
pub struct ListenerFailure {
    pub listener: &'static str,
    pub seq: u64,
    pub message: String,
}

/// Ordered fan-out of stream events to registered listeners.
///
/// Registration order is fan-out order, not priority: every listener
/// receives every event.
pub struct Dispatcher {
    listeners: Vec<Box<dyn StreamListener>>,
    failures: Vec<ListenerFailure>,
}

impl Dispatcher {
    pub fn new(listeners: Vec<Box<dyn StreamListener>>) -> Self {
        Self {
            listeners,
            failures: Vec::new(),
        }
    }

    /// Deliver one event to every listener in order, capturing failures.
    pub async fn dispatch(&mut self, event: &StreamEvent) {
        for listener in &mut self.listeners {
            if let Err(e) = listener.on_event(event).await {
                warn!(
                    listener = listener.name(),
                    seq = event.seq,
                    error = %e,
                    "stream listener failed; continuing delivery"
                );
                self.failures.push(ListenerFailure {
                    listener: listener.name(),
                    seq: event.seq,
                    message: e.to_string(),
                });
            }
        }
    }

    pub fn failures(&self) -> &[ListenerFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<ListenerFailure> {
        self.failures
    }
}
