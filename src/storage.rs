//! Message persistence contract.
//!
//! Durability is the store's responsibility; the relay only guarantees that
//! updates for one message are issued in event-sequence order. Stores must
//! support partial updates (the answer text grows append-only while the
//! stream is live) and survive process restart.

use crate::types::PendingMessage;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Record a new pending message before any network call is made.
    async fn create(&self, message: &PendingMessage) -> Result<()>;

    /// Persist the message's current state. Called once per applied delta.
    async fn update(&self, message: &PendingMessage) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<PendingMessage>>;

    fn name(&self) -> &'static str;
}

/// In-memory store. Useful for tests and single-process deployments that do
/// not need restart durability.
#[derive(Default)]
pub struct MemoryStore {
    messages: Arc<RwLock<HashMap<String, PendingMessage>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create(&self, message: &PendingMessage) -> Result<()> {
        let mut messages = self.messages.write().unwrap();
        if messages.contains_key(&message.id) {
            return Err(Error::storage(format!(
                "message '{}' already exists",
                message.id
            )));
        }
        messages.insert(message.id.clone(), message.clone());
        Ok(())
    }

    async fn update(&self, message: &PendingMessage) -> Result<()> {
        let mut messages = self.messages.write().unwrap();
        if !messages.contains_key(&message.id) {
            return Err(Error::storage(format!(
                "message '{}' does not exist",
                message.id
            )));
        }
        messages.insert(message.id.clone(), message.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<PendingMessage>> {
        Ok(self.messages.read().unwrap().get(id).cloned())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
