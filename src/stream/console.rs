//! Diagnostic listener: traces every raw event.

use super::StreamListener;
use crate::types::{EventKind, StreamEvent};
use crate::Result;
use async_trait::async_trait;
use tracing::debug;

#[derive(Debug, Default)]
pub struct ConsoleListener;

impl ConsoleListener {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StreamListener for ConsoleListener {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn on_event(&mut self, event: &StreamEvent) -> Result<()> {
        match event.kind {
            EventKind::Data => debug!(seq = event.seq, payload = %event.payload, "stream data"),
            EventKind::Done => debug!(seq = event.seq, "stream done"),
            EventKind::Error => debug!(seq = event.seq, detail = %event.payload, "stream error"),
        }
        Ok(())
    }
}
