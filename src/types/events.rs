//! Raw stream units and the parsed deltas derived from them.

use serde::{Deserialize, Serialize};

/// What kind of unit the transport handed us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A data frame carrying a JSON payload.
    Data,
    /// The provider's end-of-stream sentinel.
    Done,
    /// A connection-level failure surfaced in-band.
    Error,
}

/// One raw unit received from the upstream transport.
///
/// Immutable once created. The sequence number is assigned on receipt and is
/// strictly increasing within a session; consumers rely on it to order their
/// writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    pub seq: u64,
    pub kind: EventKind,
    /// Raw frame payload (without the SSE `data: ` prefix).
    pub payload: String,
}

impl StreamEvent {
    pub fn data(seq: u64, payload: impl Into<String>) -> Self {
        Self {
            seq,
            kind: EventKind::Data,
            payload: payload.into(),
        }
    }

    pub fn done(seq: u64) -> Self {
        Self {
            seq,
            kind: EventKind::Done,
            payload: String::new(),
        }
    }

    pub fn error(seq: u64, detail: impl Into<String>) -> Self {
        Self {
            seq,
            kind: EventKind::Error,
            payload: detail.into(),
        }
    }
}

/// Parsed unit derived from a [`StreamEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MessageDelta {
    /// An incremental text fragment, optionally carrying the
    /// upstream-assigned id of the answer message.
    Token {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },
    /// The stream finished normally.
    Done,
    /// Something went wrong. `fatal` distinguishes connection-level failures
    /// (terminal for the turn) from a single unparseable frame.
    Error { detail: String, fatal: bool },
}

impl MessageDelta {
    pub fn token(text: impl Into<String>) -> Self {
        MessageDelta::Token {
            text: text.into(),
            message_id: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MessageDelta::Done | MessageDelta::Error { fatal: true, .. }
        )
    }
}
