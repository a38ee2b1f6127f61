//! Relay configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `ORDER_RELAY_*` environment variables.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::{RelayError, RelayResult};

/// Default hub address used when neither client setting is present.
pub const DEFAULT_HUB_URL: &str = "http://127.0.0.1:3030";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub redis: RedisConfig,
    pub client: ClientConfig,
}

/// Hub listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Fan-out buffer per connection before a slow reader starts losing events.
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3030,
            channel_capacity: 256,
        }
    }
}

/// Cross-origin policy for the hub's HTTP and WebSocket routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub origin: String,
    pub methods: Vec<String>,
    pub credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:5173".to_string(),
            methods: ["GET", "POST", "PUT", "DELETE"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            credentials: true,
        }
    }
}

/// Optional Redis pub/sub bridge for multi-instance fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub channel: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            channel: "order-relay:events".to_string(),
        }
    }
}

/// Subscriber-side hub address settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub socket_url: Option<String>,
    pub api_url: Option<String>,
}

impl ClientConfig {
    /// Resolve the WebSocket URL of the hub.
    ///
    /// The dedicated socket URL wins, then the API base URL, then
    /// [`DEFAULT_HUB_URL`]. Empty settings count as unset.
    pub fn hub_ws_url(&self) -> String {
        let base = [self.socket_url.as_deref(), self.api_url.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or(DEFAULT_HUB_URL);
        to_ws_url(base)
    }
}

/// Map an HTTP base URL to the hub's WebSocket endpoint.
///
/// `http` becomes `ws`, `https` becomes `wss`, and `/ws` is appended when the
/// URL carries no path.
pub fn to_ws_url(base: &str) -> String {
    let (scheme, rest) = match base.split_once("://") {
        Some(("https", rest)) => ("wss", rest),
        Some(("http", rest)) => ("ws", rest),
        Some((scheme, rest)) => (scheme, rest),
        None => ("ws", base),
    };

    let has_path = rest
        .find('/')
        .map(|i| rest[i..].trim_end_matches('/') != "")
        .unwrap_or(false);

    if has_path {
        format!("{}://{}", scheme, rest)
    } else {
        format!("{}://{}/ws", scheme, rest.trim_end_matches('/'))
    }
}

impl RelayConfig {
    /// Load configuration from an optional file and the process environment.
    pub fn load(path: Option<&Path>) -> RelayResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML file.
    pub fn from_file(path: &Path) -> RelayResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RelayError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&text)?;
        debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Apply `ORDER_RELAY_*` overrides from a key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ORDER_RELAY_HOST") {
            self.server.host = v;
        }
        override_parsed(&lookup, "ORDER_RELAY_PORT", &mut self.server.port);
        override_parsed(
            &lookup,
            "ORDER_RELAY_CHANNEL_CAPACITY",
            &mut self.server.channel_capacity,
        );

        if let Some(v) = lookup("ORDER_RELAY_ORIGIN") {
            self.cors.origin = v;
        }
        if let Some(v) = lookup("ORDER_RELAY_METHODS") {
            self.cors.methods = v
                .split(',')
                .map(|m| m.trim().to_uppercase())
                .filter(|m| !m.is_empty())
                .collect();
        }
        override_parsed(&lookup, "ORDER_RELAY_CREDENTIALS", &mut self.cors.credentials);

        if let Some(v) = lookup("ORDER_RELAY_REDIS_URL") {
            self.redis.url = Some(v);
        }
        if let Some(v) = lookup("ORDER_RELAY_REDIS_CHANNEL") {
            self.redis.channel = v;
        }

        if let Some(v) = lookup("ORDER_RELAY_SOCKET_URL") {
            self.client.socket_url = Some(v);
        }
        if let Some(v) = lookup("ORDER_RELAY_API_URL") {
            self.client.api_url = Some(v);
        }
    }

    /// Reject values the hub cannot start with.
    pub fn validate(&self) -> RelayResult<()> {
        if self.server.channel_capacity == 0 {
            return Err(RelayError::config("channel_capacity must be greater than zero"));
        }
        if self.cors.origin.trim().is_empty() {
            return Err(RelayError::config("cors origin must not be empty"));
        }
        Ok(())
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(v) => *target = v,
            Err(e) => warn!("Invalid {key} value {raw:?}: {e}, keeping current value"),
        }
    }
}
