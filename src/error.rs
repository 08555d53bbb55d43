use thiserror::Error;

/// Unified error type for the relay.
///
/// This aggregates transport, parsing and storage failures into the
/// categories callers actually branch on: whether the session can start at
/// all, whether it died mid-flight, and whether a single frame was bad.
#[derive(Debug, Error)]
pub enum Error {
    /// Room configuration could not be resolved (missing credential,
    /// endpoint or model). Fatal before any connection is opened.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The upstream connection could not be established (DNS/TLS/timeout or
    /// a non-success HTTP status before the first event).
    #[error("Connection error: {0}")]
    Connection(String),

    /// The connection was lost after at least one event was received.
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    /// A single stream frame could not be parsed. Non-fatal for the session;
    /// the raw payload is retained for diagnostics.
    #[error("Parse error: unparseable stream payload: {raw}")]
    Parse { raw: String },

    /// A registered stream listener failed on one event. Isolated per
    /// listener; never aborts delivery to the others.
    #[error("Listener '{listener}' failed at event {seq}: {message}")]
    Listener {
        listener: &'static str,
        seq: u64,
        message: String,
    },

    /// The message store rejected a create/update.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Error::Connection(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }
}
