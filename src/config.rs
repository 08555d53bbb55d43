//! Room configuration resolution.
//!
//! The relay treats room configuration as an opaque key→value resolver owned
//! by the host application: given a room id it returns at minimum the access
//! credential and the proxy endpoint to stream against.

use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use url::Url;

/// Named configuration keys the relay consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    /// Upstream access credential (with or without the `Bearer ` scheme).
    AccessToken,
    /// Full URL of the streaming conversation endpoint.
    ProxyUrl,
    /// Default model for the room; overridable per request.
    Model,
}

/// Opaque per-room configuration lookup, implemented by the host.
#[async_trait]
pub trait RoomConfigResolver: Send + Sync {
    async fn resolve(&self, room_id: &str) -> Result<HashMap<ConfigKey, String>>;
}

/// Resolved endpoint + credential for one session.
#[derive(Debug, Clone)]
pub struct RoomEndpoint {
    pub url: String,
    /// Always carries the `Bearer ` scheme prefix.
    pub access_token: String,
    pub model: Option<String>,
}

impl RoomEndpoint {
    /// Extract and validate the keys the stream client needs.
    pub fn from_config(config: &HashMap<ConfigKey, String>) -> Result<Self> {
        let token = config
            .get(&ConfigKey::AccessToken)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::config("room config is missing the access token"))?;
        let url = config
            .get(&ConfigKey::ProxyUrl)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::config("room config is missing the proxy endpoint URL"))?;

        Url::parse(url).map_err(|e| Error::config(format!("invalid proxy endpoint '{url}': {e}")))?;

        Ok(Self {
            url: url.clone(),
            access_token: normalize_bearer(token),
            model: config.get(&ConfigKey::Model).cloned(),
        })
    }
}

/// Prepend the `Bearer ` scheme exactly once. Idempotent.
pub fn normalize_bearer(token: &str) -> String {
    if token.starts_with("Bearer ") {
        token.to_string()
    } else {
        format!("Bearer {token}")
    }
}
