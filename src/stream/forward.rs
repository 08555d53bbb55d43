//! Client forwarding listener: relays token fragments to the caller's live
//! output channel and terminates it on DONE/ERROR.

use super::{ResponseParser, StreamListener};
use crate::types::{MessageDelta, StreamEvent};
use crate::{Error, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

pub struct ForwardingListener {
    parser: ResponseParser,
    /// `None` once the channel has been terminated.
    tx: Option<mpsc::UnboundedSender<Result<String>>>,
}

impl ForwardingListener {
    pub fn new(tx: mpsc::UnboundedSender<Result<String>>) -> Self {
        Self {
            parser: ResponseParser::new(),
            tx: Some(tx),
        }
    }
}

#[async_trait]
impl StreamListener for ForwardingListener {
    fn name(&self) -> &'static str {
        "forward"
    }

    async fn on_event(&mut self, event: &StreamEvent) -> Result<()> {
        let Some(tx) = &self.tx else {
            return Ok(());
        };

        match self.parser.parse(event) {
            MessageDelta::Token { text, .. } => {
                if text.is_empty() {
                    return Ok(());
                }
                // A closed receiver means the caller disconnected. That must
                // never abort the persistence listener's work, so the send
                // failure is swallowed.
                if tx.send(Ok(text)).is_err() {
                    trace!(seq = event.seq, "caller channel closed; dropping fragment");
                }
            }
            MessageDelta::Done => {
                // Dropping the sender completes the caller's channel.
                self.tx = None;
            }
            MessageDelta::Error { detail, fatal } => {
                if fatal {
                    let _ = tx.send(Err(Error::StreamInterrupted(detail)));
                    self.tx = None;
                }
            }
        }

        Ok(())
    }
}
