use crate::config::RoomEndpoint;
use crate::request::ConversationRequest;
use crate::{BoxStream, Error, Result};
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use std::env;
use std::time::Duration;

/// Pooled HTTP client for opening event-stream connections.
///
/// One instance is shared by all sessions of a relay; the underlying
/// `reqwest::Client` is safe for concurrent use and reuses connections
/// across unrelated sessions. Each call to [`open_stream`] is a fresh,
/// non-restartable request.
///
/// [`open_stream`]: EventStreamClient::open_stream
pub struct EventStreamClient {
    client: reqwest::Client,
    idle_read_timeout: Duration,
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
}

impl EventStreamClient {
    /// Build the pooled client with env-overridable knobs.
    pub fn new() -> Result<Self> {
        let connect_timeout = env_u64("CHAT_RELAY_CONNECT_TIMEOUT_SECS", 10);
        let idle_read_timeout = env_u64("CHAT_RELAY_IDLE_READ_TIMEOUT_SECS", 60);

        // No overall request timeout: an SSE response legitimately stays open
        // for minutes. Silence is bounded by the idle-read timeout instead.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout))
            .pool_max_idle_per_host(
                env_u64("CHAT_RELAY_POOL_MAX_IDLE_PER_HOST", 16) as usize
            )
            .pool_idle_timeout(Some(Duration::from_secs(env_u64(
                "CHAT_RELAY_POOL_IDLE_TIMEOUT_SECS",
                90,
            ))))
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            idle_read_timeout: Duration::from_secs(idle_read_timeout),
        })
    }

    /// Maximum time to wait between two stream reads before the session
    /// declares the upstream silent and tears the connection down.
    pub fn idle_read_timeout(&self) -> Duration {
        self.idle_read_timeout
    }

    /// Open one long-lived SSE connection and return its raw byte stream.
    ///
    /// Any failure before the first byte (DNS, TLS, timeout, non-success
    /// status) surfaces as [`Error::Connection`].
    pub async fn open_stream(
        &self,
        endpoint: &RoomEndpoint,
        request: &ConversationRequest,
    ) -> Result<BoxStream<'static, Bytes>> {
        let response = self
            .client
            .post(&endpoint.url)
            .header(AUTHORIZATION, &endpoint.access_token)
            .header(ACCEPT, "text/event-stream")
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| Error::connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::connection(format!(
                "upstream returned HTTP {status}: {body}"
            )));
        }

        let byte_stream = response
            .bytes_stream()
            .map_err(|e| Error::StreamInterrupted(e.to_string()));
        Ok(Box::pin(byte_stream))
    }
}
