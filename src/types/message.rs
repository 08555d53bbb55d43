//! Message lifecycle records tracked through one conversational turn.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller-facing request to start one streaming chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSendRequest {
    /// Room the turn belongs to; drives config resolution.
    pub room_id: String,
    /// Question text.
    pub content: String,
    /// Overrides the room's default model when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Id of the previous answer in this conversation, when chaining.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<String>,
    /// Upstream conversation id; absent for a brand-new conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl ChatSendRequest {
    pub fn new(room_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            content: content.into(),
            model: None,
            parent_message_id: None,
            conversation_id: None,
        }
    }
}

/// Lifecycle of a [`PendingMessage`].
///
/// `Failed` is terminal: once a message fails, no later delta may mutate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Streaming,
    Complete,
    Failed,
}

/// One conversational turn's question/answer record.
///
/// Created by the relay before any network call, owned exclusively by the
/// session until a terminal status is reached, and mutated only through the
/// persistence listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingMessage {
    /// Our own id for this turn.
    pub id: String,
    /// Room the turn belongs to.
    pub room_id: String,
    /// Parent message id sent upstream. Never empty on the wire; a synthetic
    /// id is generated for the first turn of a conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<String>,
    /// Upstream conversation id; empty string means "new conversation".
    pub conversation_id: String,
    /// Model identifier sent upstream.
    pub model: String,
    /// Question text.
    pub content: String,
    /// Serialized outbound request payload, stored for audit/replay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_payload: Option<String>,
    /// Accumulated answer text, appended one token fragment at a time.
    pub answer_text: String,
    /// Upstream-assigned id of the answer, captured from the first event
    /// that carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_message_id: Option<String>,
    /// Detail of the last recorded error, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub status: MessageStatus,
}

impl PendingMessage {
    /// Build the question record for one send request, with the model
    /// already resolved by the caller.
    pub fn question(request: &ChatSendRequest, model: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            room_id: request.room_id.clone(),
            parent_message_id: request.parent_message_id.clone(),
            conversation_id: request.conversation_id.clone().unwrap_or_default(),
            model: model.into(),
            content: request.content.clone(),
            original_payload: None,
            answer_text: String::new(),
            answer_message_id: None,
            error_detail: None,
            status: MessageStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, MessageStatus::Complete | MessageStatus::Failed)
    }
}
