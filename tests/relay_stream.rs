//! End-to-end relay tests against a mock SSE upstream.

use async_trait::async_trait;
use chat_relay::{
    ChatRelay, ChatSendRequest, ConfigKey, Error, MemoryStore, MessageStatus, MessageStore,
    PendingMessage, Result, RoomConfigResolver,
};
use mockito::Matcher;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

struct MapResolver(HashMap<ConfigKey, String>);

#[async_trait]
impl RoomConfigResolver for MapResolver {
    async fn resolve(&self, _room_id: &str) -> Result<HashMap<ConfigKey, String>> {
        Ok(self.0.clone())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("chat_relay=debug")),
        )
        .with_test_writer()
        .try_init();
}

fn resolver_for(url: &str) -> Arc<MapResolver> {
    init_tracing();
    let mut map = HashMap::new();
    map.insert(ConfigKey::AccessToken, "tok-123".to_string());
    map.insert(ConfigKey::ProxyUrl, format!("{url}/conversation"));
    map.insert(ConfigKey::Model, "gpt-x".to_string());
    Arc::new(MapResolver(map))
}

async fn collect_fragments(
    handle: &mut chat_relay::ChatStreamHandle,
) -> (Vec<String>, Option<String>) {
    let mut fragments = Vec::new();
    let mut error = None;
    while let Some(item) = handle.next_fragment().await {
        match item {
            Ok(text) => fragments.push(text),
            Err(e) => error = Some(e.to_string()),
        }
    }
    (fragments, error)
}

#[tokio::test]
async fn streams_fragments_and_persists_complete_answer() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/conversation")
        .match_header("authorization", "Bearer tok-123")
        .match_header("accept", "text/event-stream")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "action": "next",
            "model": "gpt-x",
            "conversation_id": "",
        })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(
            "data: {\"id\":\"ans-1\",\"content\":\"He\"}\n\n\
             data: {\"content\":\"llo\"}\n\n\
             data: [DONE]\n\n",
        )
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let relay = ChatRelay::new(resolver_for(&server.url()), store.clone()).unwrap();

    let mut handle = relay
        .start_chat_stream(ChatSendRequest::new("room-1", "hi"))
        .await
        .unwrap();
    let message_id = handle.message_id().to_string();

    let (fragments, error) = collect_fragments(&mut handle).await;
    assert_eq!(fragments, vec!["He".to_string(), "llo".to_string()]);
    assert!(error.is_none());

    let stored = store.get(&message_id).await.unwrap().unwrap();
    assert_eq!(stored.answer_text, "Hello");
    assert_eq!(stored.status, MessageStatus::Complete);
    assert_eq!(stored.answer_message_id.as_deref(), Some("ans-1"));
    assert_eq!(stored.model, "gpt-x");
    assert!(!stored.parent_message_id.as_deref().unwrap_or("").is_empty());
    let payload = stored.original_payload.unwrap();
    assert!(payload.contains("\"action\":\"next\""));
    assert!(payload.contains("\"role\":\"user\""));

    mock.assert_async().await;
}

#[tokio::test]
async fn connection_drop_persists_partial_answer_as_failed() {
    let mut server = mockito::Server::new_async().await;
    // One token, then the body ends without a done marker: the connection
    // closes mid-stream.
    server
        .mock("POST", "/conversation")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body("data: {\"content\":\"Hi\"}\n\n")
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let relay = ChatRelay::new(resolver_for(&server.url()), store.clone()).unwrap();

    let mut handle = relay
        .start_chat_stream(ChatSendRequest::new("room-1", "hi"))
        .await
        .unwrap();
    let message_id = handle.message_id().to_string();

    let (fragments, error) = collect_fragments(&mut handle).await;
    assert_eq!(fragments, vec!["Hi".to_string()]);
    assert!(error.unwrap().contains("interrupted"));

    let stored = store.get(&message_id).await.unwrap().unwrap();
    assert_eq!(stored.status, MessageStatus::Failed);
    assert_eq!(stored.answer_text, "Hi");
    assert!(stored.error_detail.is_some());
}

#[tokio::test]
async fn connect_failure_fails_the_turn_without_partial_state() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/conversation")
        .with_status(502)
        .with_body("bad gateway")
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let relay = ChatRelay::new(resolver_for(&server.url()), store.clone()).unwrap();

    let mut handle = relay
        .start_chat_stream(ChatSendRequest::new("room-1", "hi"))
        .await
        .unwrap();
    let message_id = handle.message_id().to_string();

    let (fragments, error) = collect_fragments(&mut handle).await;
    assert!(fragments.is_empty());
    assert!(error.is_some());

    let stored = store.get(&message_id).await.unwrap().unwrap();
    assert_eq!(stored.status, MessageStatus::Failed);
    assert!(stored.answer_text.is_empty());
    assert!(stored.error_detail.unwrap().contains("502"));
}

#[tokio::test]
async fn malformed_frame_does_not_abort_the_stream() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/conversation")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(
            "data: {\"content\":\"He\"}\n\n\
             data: this is not json\n\n\
             data: {\"content\":\"llo\"}\n\n\
             data: [DONE]\n\n",
        )
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let relay = ChatRelay::new(resolver_for(&server.url()), store.clone()).unwrap();

    let mut handle = relay
        .start_chat_stream(ChatSendRequest::new("room-1", "hi"))
        .await
        .unwrap();
    let message_id = handle.message_id().to_string();

    let (fragments, error) = collect_fragments(&mut handle).await;
    assert_eq!(fragments, vec!["He".to_string(), "llo".to_string()]);
    assert!(error.is_none());

    let stored = store.get(&message_id).await.unwrap().unwrap();
    assert_eq!(stored.status, MessageStatus::Complete);
    assert_eq!(stored.answer_text, "Hello");
    // The bad frame is retained for diagnostics but never raised the status.
    assert!(stored.error_detail.unwrap().contains("this is not json"));
}

#[tokio::test]
async fn conversation_chaining_passes_parent_and_conversation_ids() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/conversation")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "parent_message_id": "prev-answer",
            "conversation_id": "conv-7",
        })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body("data: {\"content\":\"ok\"}\n\ndata: [DONE]\n\n")
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let relay = ChatRelay::new(resolver_for(&server.url()), store.clone()).unwrap();

    let mut request = ChatSendRequest::new("room-1", "and then?");
    request.parent_message_id = Some("prev-answer".to_string());
    request.conversation_id = Some("conv-7".to_string());

    let mut handle = relay.start_chat_stream(request).await.unwrap();
    let (fragments, error) = collect_fragments(&mut handle).await;
    assert_eq!(fragments, vec!["ok".to_string()]);
    assert!(error.is_none());

    mock.assert_async().await;
}

/// Store whose updates always fail; creates still succeed so a session can
/// start.
struct FlakyStore {
    inner: MemoryStore,
}

#[async_trait]
impl MessageStore for FlakyStore {
    async fn create(&self, message: &PendingMessage) -> Result<()> {
        self.inner.create(message).await
    }

    async fn update(&self, _message: &PendingMessage) -> Result<()> {
        Err(Error::Storage("simulated outage".to_string()))
    }

    async fn get(&self, id: &str) -> Result<Option<PendingMessage>> {
        self.inner.get(id).await
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

#[tokio::test]
async fn listener_failures_are_surfaced_after_the_stream_ends() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/conversation")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body("data: {\"content\":\"Hi\"}\n\ndata: [DONE]\n\n")
        .create_async()
        .await;

    let store = Arc::new(FlakyStore {
        inner: MemoryStore::new(),
    });
    let relay = ChatRelay::new(resolver_for(&server.url()), store).unwrap();

    let mut handle = relay
        .start_chat_stream(ChatSendRequest::new("room-1", "hi"))
        .await
        .unwrap();

    // Persistence fails on every event, yet the caller still gets the full
    // answer: listener failure domains stay isolated.
    let (fragments, error) = collect_fragments(&mut handle).await;
    assert_eq!(fragments, vec!["Hi".to_string()]);
    assert!(error.is_none());

    let failures = handle.listener_failures().await;
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|f| f.listener == "persist"));
    assert!(failures[0].message.contains("simulated outage"));
    assert!(failures[0].seq < failures[1].seq);
}

#[tokio::test]
async fn cancel_mid_stream_fails_the_turn_and_keeps_partial_answer() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/conversation")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_chunked_body(|w: &mut dyn Write| {
            w.write_all(b"data: {\"content\":\"Hi\"}\n\n")?;
            w.flush()?;
            // Stall long enough for the caller to cancel first.
            std::thread::sleep(std::time::Duration::from_secs(2));
            let _ = w.write_all(b"data: [DONE]\n\n");
            Ok(())
        })
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let relay = ChatRelay::new(resolver_for(&server.url()), store.clone()).unwrap();

    let mut handle = relay
        .start_chat_stream(ChatSendRequest::new("room-1", "hi"))
        .await
        .unwrap();
    let message_id = handle.message_id().to_string();

    let first = handle.next_fragment().await.unwrap().unwrap();
    assert_eq!(first, "Hi");
    handle.cancel();

    let mut error = None;
    while let Some(item) = handle.next_fragment().await {
        if let Err(e) = item {
            error = Some(e.to_string());
        }
    }
    assert!(error.unwrap().contains("cancelled"));

    let stored = store.get(&message_id).await.unwrap().unwrap();
    assert_eq!(stored.status, MessageStatus::Failed);
    assert_eq!(stored.answer_text, "Hi");
    assert!(stored.error_detail.unwrap().contains("cancelled"));
}

#[tokio::test]
async fn silent_upstream_trips_the_idle_read_timeout() {
    std::env::set_var("CHAT_RELAY_IDLE_READ_TIMEOUT_SECS", "1");

    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/conversation")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_chunked_body(|w: &mut dyn Write| {
            w.write_all(b"data: {\"content\":\"Hi\"}\n\n")?;
            w.flush()?;
            // Go silent for longer than the idle-read timeout.
            std::thread::sleep(std::time::Duration::from_secs(3));
            let _ = w.write_all(b"data: [DONE]\n\n");
            Ok(())
        })
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let relay = ChatRelay::new(resolver_for(&server.url()), store.clone()).unwrap();
    std::env::remove_var("CHAT_RELAY_IDLE_READ_TIMEOUT_SECS");

    let mut handle = relay
        .start_chat_stream(ChatSendRequest::new("room-1", "hi"))
        .await
        .unwrap();
    let message_id = handle.message_id().to_string();

    let (fragments, error) = collect_fragments(&mut handle).await;
    assert_eq!(fragments, vec!["Hi".to_string()]);
    assert!(error.unwrap().contains("no event received"));

    let stored = store.get(&message_id).await.unwrap().unwrap();
    assert_eq!(stored.status, MessageStatus::Failed);
    assert_eq!(stored.answer_text, "Hi");
}

#[tokio::test]
async fn concurrent_sessions_stay_independent() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/conversation")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body("data: {\"content\":\"answer\"}\n\ndata: [DONE]\n\n")
        .expect(2)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let relay = Arc::new(ChatRelay::new(resolver_for(&server.url()), store.clone()).unwrap());

    let a = {
        let relay = relay.clone();
        tokio::spawn(async move {
            let mut h = relay
                .start_chat_stream(ChatSendRequest::new("room-a", "q1"))
                .await
                .unwrap();
            let id = h.message_id().to_string();
            while h.next_fragment().await.is_some() {}
            id
        })
    };
    let b = {
        let relay = relay.clone();
        tokio::spawn(async move {
            let mut h = relay
                .start_chat_stream(ChatSendRequest::new("room-b", "q2"))
                .await
                .unwrap();
            let id = h.message_id().to_string();
            while h.next_fragment().await.is_some() {}
            id
        })
    };

    let (id_a, id_b) = (a.await.unwrap(), b.await.unwrap());
    assert_ne!(id_a, id_b);
    for id in [id_a, id_b] {
        let stored = store.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Complete);
        assert_eq!(stored.answer_text, "answer");
    }
}
