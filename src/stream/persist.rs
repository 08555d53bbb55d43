//! Parsing + persistence listener: the one designated listener that applies
//! deltas to the pending message and writes it through the store.
//!
//! Writes for one message are issued synchronously within the dispatch call,
//! so a later delta's write is never visible before an earlier one even when
//! the underlying store is eventually consistent.

use super::{ResponseParser, StreamListener};
use crate::storage::MessageStore;
use crate::types::{MessageDelta, MessageStatus, PendingMessage, StreamEvent};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

pub struct PersistingListener {
    parser: ResponseParser,
    store: Arc<dyn MessageStore>,
    message: PendingMessage,
}

impl PersistingListener {
    pub fn new(store: Arc<dyn MessageStore>, message: PendingMessage) -> Self {
        Self {
            parser: ResponseParser::new(),
            store,
            message,
        }
    }
}

#[async_trait]
impl StreamListener for PersistingListener {
    fn name(&self) -> &'static str {
        "persist"
    }

    async fn on_event(&mut self, event: &StreamEvent) -> Result<()> {
        // FAILED is terminal: nothing may mutate the record afterwards.
        if self.message.status == MessageStatus::Failed {
            return Ok(());
        }

        match self.parser.parse(event) {
            MessageDelta::Token { text, message_id } => {
                self.message.answer_text.push_str(&text);
                // Captured once; immutable for the rest of the turn.
                if self.message.answer_message_id.is_none() {
                    self.message.answer_message_id = message_id;
                }
                self.message.status = MessageStatus::Streaming;
            }
            MessageDelta::Done => {
                if self.message.answer_message_id.is_none() {
                    warn!(
                        message_id = %self.message.id,
                        "stream completed without an upstream answer id"
                    );
                }
                self.message.status = MessageStatus::Complete;
            }
            MessageDelta::Error { detail, fatal } => {
                // Partial answers are never discarded.
                self.message.error_detail = Some(detail);
                if fatal {
                    self.message.status = MessageStatus::Failed;
                }
            }
        }

        self.store.update(&self.message).await
    }
}
