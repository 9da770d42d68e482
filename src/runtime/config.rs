//! Runtime configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

/// Relay endpoint used when none is configured.
pub const DEFAULT_RELAY_BASE_URL: &str = "https://ntl-functions-streaming.herokuapp.com";

/// Configuration for the host server and the relay channels it opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Environment variables for every invocation context.
    pub env: HashMap<String, String>,
    /// Whether to serve `/_health`.
    pub enable_health: bool,
    /// Maximum inbound request body size in bytes.
    pub max_body_size: usize,
    /// Base URL of the relay; streams go to `<base>/.stream/<request-id>`.
    pub relay_base_url: String,
    /// Queued bytes above which writes report backpressure.
    pub high_water_mark: usize,
    /// Invocation timeout in milliseconds, `0` disables it.
    pub request_timeout_ms: u64,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            env: HashMap::new(),
            enable_health: true,
            max_body_size: 10 * 1024 * 1024, // 10MB
            relay_base_url: DEFAULT_RELAY_BASE_URL.to_string(),
            high_water_mark: 16 * 1024,
            request_timeout_ms: 30_000,
        }
    }
}

impl StreamerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `STREAMRELAY_*` environment variables.
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(host) = lookup("STREAMRELAY_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("STREAMRELAY_PORT") {
            match port.parse() {
                Ok(port) => config.port = port,
                Err(e) => warn!("Ignoring STREAMRELAY_PORT={}: {}", port, e),
            }
        }
        if let Some(url) = lookup("STREAMRELAY_RELAY_URL") {
            config.relay_base_url = url;
        }
        if let Some(timeout) = lookup("STREAMRELAY_TIMEOUT_MS") {
            match timeout.parse() {
                Ok(ms) => config.request_timeout_ms = ms,
                Err(e) => warn!("Ignoring STREAMRELAY_TIMEOUT_MS={}: {}", timeout, e),
            }
        }

        config
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn relay_base_url(mut self, url: impl Into<String>) -> Self {
        self.relay_base_url = url.into();
        self
    }

    pub fn high_water_mark(mut self, bytes: usize) -> Self {
        self.high_water_mark = bytes;
        self
    }

    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout_ms = ms;
        self
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}
