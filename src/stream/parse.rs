//! Incremental response parsing: one raw [`StreamEvent`] → one
//! [`MessageDelta`].
//!
//! The parser is stateless across calls. The upstream answer message id is
//! carried on the delta and captured once by the persistence listener; it is
//! never re-derived per event.

use crate::types::{EventKind, MessageDelta, StreamEvent};
use crate::Error;
use serde_json::Value;

#[derive(Debug, Default)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Decode one raw event into a structured delta.
    ///
    /// A malformed data payload yields a non-fatal error delta with the raw
    /// payload retained; the session decides whether to keep going (it
    /// does).
    pub fn parse(&self, event: &StreamEvent) -> MessageDelta {
        match event.kind {
            EventKind::Done => MessageDelta::Done,
            EventKind::Error => MessageDelta::Error {
                detail: event.payload.clone(),
                fatal: true,
            },
            EventKind::Data => match serde_json::from_str::<Value>(&event.payload) {
                Ok(json) => MessageDelta::Token {
                    text: extract_fragment(&json).unwrap_or_default(),
                    message_id: extract_message_id(&json),
                },
                Err(_) => MessageDelta::Error {
                    detail: Error::Parse {
                        raw: event.payload.clone(),
                    }
                    .to_string(),
                    fatal: false,
                },
            },
        }
    }
}

/// Incremental text fragment: top-level `content`/`delta`, or the first
/// element of `message.content.parts` for conversation-shaped payloads.
fn extract_fragment(json: &Value) -> Option<String> {
    if let Some(s) = json.get("content").and_then(Value::as_str) {
        return Some(s.to_string());
    }
    if let Some(s) = json.get("delta").and_then(Value::as_str) {
        return Some(s.to_string());
    }
    json.pointer("/message/content/parts/0")
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

/// Upstream-assigned answer message id: top-level `id` or `message.id`.
fn extract_message_id(json: &Value) -> Option<String> {
    json.get("id")
        .and_then(Value::as_str)
        .or_else(|| json.pointer("/message/id").and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}
