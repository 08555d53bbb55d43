//! Outbound conversation request payload.
//!
//! Mirrors the upstream conversation wire format: a single user message with
//! text parts, a `"next"` action, and parent/conversation id chaining. The
//! upstream rejects empty parent ids, so the very first turn of a
//! conversation gets a synthetic one.

use crate::types::PendingMessage;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRequest {
    pub action: String,
    pub messages: Vec<OutboundMessage>,
    pub model: String,
    pub parent_message_id: String,
    /// Empty string signals "new conversation" to the provider.
    pub conversation_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub id: String,
    pub author: Author,
    pub content: OutboundContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundContent {
    pub content_type: String,
    pub parts: Vec<String>,
}

/// Assemble the provider request for one pending question.
///
/// No side effects; fails only when the model identifier is missing.
pub fn build_conversation_request(message: &PendingMessage) -> Result<ConversationRequest> {
    if message.model.is_empty() {
        return Err(Error::config("pending message has no model identifier"));
    }

    let parent_message_id = message
        .parent_message_id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    Ok(ConversationRequest {
        action: "next".to_string(),
        messages: vec![OutboundMessage {
            id: message.id.clone(),
            author: Author {
                role: "user".to_string(),
            },
            content: OutboundContent {
                content_type: "text".to_string(),
                parts: vec![message.content.clone()],
            },
        }],
        model: message.model.clone(),
        parent_message_id,
        conversation_id: message.conversation_id.clone(),
    })
}
