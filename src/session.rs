//! Streaming chat session orchestration.
//!
//! One call to [`ChatRelay::start_chat_stream`] runs one independent
//! session: resolve the room's config, persist the question, open the SSE
//! connection, and pump every raw event through the listener fan-out until a
//! terminal event, cancellation, or the idle-read timeout. Sessions share
//! nothing but the pooled transport client.

use crate::config::{RoomConfigResolver, RoomEndpoint};
use crate::request::{build_conversation_request, ConversationRequest};
use crate::storage::MessageStore;
use crate::stream::{
    decode::is_terminal_event, ConsoleListener, Dispatcher, ForwardingListener, ListenerFailure,
    PersistingListener, SseFrameDecoder, StreamListener,
};
use crate::transport::EventStreamClient;
use crate::types::{ChatSendRequest, PendingMessage, StreamEvent};
use crate::{Error, Result};
use futures::{Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;
use tracing::{info, warn};

/// Cancels a running session, closing the upstream connection promptly.
///
/// Dropping the owning [`ChatStreamHandle`] has the same effect.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &*self.tx.borrow())
            .finish()
    }
}

fn cancel_pair() -> (CancelHandle, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx: Arc::new(tx) }, rx)
}

/// Live output channel of one streaming turn.
///
/// Yields token fragments as they arrive and always reaches a terminal
/// state: the stream ends after DONE, or after a single `Err` item on a
/// fatal session error.
pub struct ChatStreamHandle {
    message_id: String,
    rx: mpsc::UnboundedReceiver<Result<String>>,
    cancel: CancelHandle,
    failures_rx: Option<oneshot::Receiver<Vec<ListenerFailure>>>,
    failures: Vec<ListenerFailure>,
}

impl ChatStreamHandle {
    /// Id of the persisted question message for this turn.
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub async fn next_fragment(&mut self) -> Option<Result<String>> {
        self.rx.recv().await
    }

    /// Per-listener failures recorded during the session.
    ///
    /// Resolves once the stream has ended; failures never abort delivery to
    /// the remaining listeners, so this is the caller's view on what went
    /// wrong alongside the delivered fragments.
    pub async fn listener_failures(&mut self) -> &[ListenerFailure] {
        if let Some(rx) = self.failures_rx.take() {
            self.failures = rx.await.unwrap_or_default();
        }
        &self.failures
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl fmt::Debug for ChatStreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatStreamHandle")
            .field("message_id", &self.message_id)
            .finish_non_exhaustive()
    }
}

impl Stream for ChatStreamHandle {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Streaming chat-completion relay.
///
/// Owns the pooled transport client; safe to share across rooms and
/// concurrent turns.
pub struct ChatRelay {
    transport: Arc<EventStreamClient>,
    resolver: Arc<dyn RoomConfigResolver>,
    store: Arc<dyn MessageStore>,
}

impl ChatRelay {
    pub fn new(resolver: Arc<dyn RoomConfigResolver>, store: Arc<dyn MessageStore>) -> Result<Self> {
        Ok(Self {
            transport: Arc::new(EventStreamClient::new()?),
            resolver,
            store,
        })
    }

    /// Start one streaming turn.
    ///
    /// Configuration and persistence failures abort before any connection is
    /// opened and surface as `Err`. Everything after connection-open is
    /// delivered through the returned handle and the persisted message
    /// state.
    pub async fn start_chat_stream(&self, request: ChatSendRequest) -> Result<ChatStreamHandle> {
        let config = self.resolver.resolve(&request.room_id).await?;
        let endpoint = RoomEndpoint::from_config(&config)?;

        let model = request
            .model
            .clone()
            .or_else(|| endpoint.model.clone())
            .unwrap_or_default();

        let mut message = PendingMessage::question(&request, model);
        let conversation_request = build_conversation_request(&message)?;
        // Record exactly what goes on the wire, synthetic parent id included.
        message.parent_message_id = Some(conversation_request.parent_message_id.clone());
        message.original_payload = Some(serde_json::to_string(&conversation_request)?);

        self.store.create(&message).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (cancel, cancel_rx) = cancel_pair();
        let (failures_tx, failures_rx) = oneshot::channel();
        let message_id = message.id.clone();

        let listeners: Vec<Box<dyn StreamListener>> = vec![
            Box::new(ConsoleListener::new()),
            // Persistence before forwarding: a caller disconnect can never
            // outrun the durable write of the same event.
            Box::new(PersistingListener::new(self.store.clone(), message)),
            Box::new(ForwardingListener::new(tx)),
        ];

        let session = Session {
            transport: self.transport.clone(),
            endpoint,
            request: conversation_request,
            dispatcher: Dispatcher::new(listeners),
            cancel_rx,
            failures_tx,
            message_id: message_id.clone(),
        };
        tokio::spawn(session.run());

        Ok(ChatStreamHandle {
            message_id,
            rx,
            cancel,
            failures_rx: Some(failures_rx),
            failures: Vec::new(),
        })
    }
}

struct Session {
    transport: Arc<EventStreamClient>,
    endpoint: RoomEndpoint,
    request: ConversationRequest,
    dispatcher: Dispatcher,
    cancel_rx: watch::Receiver<bool>,
    failures_tx: oneshot::Sender<Vec<ListenerFailure>>,
    message_id: String,
}

impl Session {
    async fn run(mut self) {
        info!(message_id = %self.message_id, "opening chat stream");

        let mut events = match self.transport.open_stream(&self.endpoint, &self.request).await {
            Ok(bytes) => SseFrameDecoder::default().decode(bytes),
            Err(e) => {
                // Establishment failure: one terminal error event, no
                // partial state assumed.
                self.dispatcher
                    .dispatch(&StreamEvent::error(0, e.to_string()))
                    .await;
                self.finish();
                return;
            }
        };

        let idle = self.transport.idle_read_timeout();
        let mut next_seq = 0;

        loop {
            tokio::select! {
                // Fires on an explicit cancel and when the handle is
                // dropped; either way the caller is gone.
                _ = self.cancel_rx.changed() => {
                    self.dispatcher
                        .dispatch(&StreamEvent::error(
                            next_seq,
                            "stream interrupted: cancelled by caller",
                        ))
                        .await;
                    break;
                }
                next = timeout(idle, events.next()) => match next {
                    Ok(Some(event)) => {
                        next_seq = event.seq + 1;
                        let terminal = is_terminal_event(&event);
                        self.dispatcher.dispatch(&event).await;
                        if terminal {
                            break;
                        }
                    }
                    // The decoder always ends with a done or error event;
                    // a bare end means we already dispatched it.
                    Ok(None) => break,
                    Err(_) => {
                        self.dispatcher
                            .dispatch(&StreamEvent::error(
                                next_seq,
                                idle_timeout_detail(idle),
                            ))
                            .await;
                        break;
                    }
                }
            }
        }

        // Dropping `events` here closes the upstream connection.
        self.finish();
    }

    fn finish(self) {
        let Self {
            dispatcher,
            failures_tx,
            message_id,
            ..
        } = self;

        let failures = dispatcher.into_failures();
        if failures.is_empty() {
            info!(message_id = %message_id, "chat stream session finished");
        } else {
            warn!(
                message_id = %message_id,
                failed = failures.len(),
                "chat stream session finished with listener failures"
            );
        }
        // Receiver gone means the caller dropped the handle without asking.
        let _ = failures_tx.send(failures);
    }
}

fn idle_timeout_detail(idle: Duration) -> String {
    format!(
        "stream interrupted: no event received for {}s",
        idle.as_secs()
    )
}

// Handles that are dropped without an explicit cancel still tear the session
// down: the watch sender goes away with the handle, which wakes the select.
impl Drop for ChatStreamHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
