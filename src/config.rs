//! Configuration for the order synchronization client.
//!
//! This module provides the [`Config`] struct describing where the orders
//! namespace lives, how long a handshake may take, and how the transport
//! reconnects.

use std::time::Duration;

use url::Url;

use crate::client::reconnect::ReconnectPolicy;
use crate::error::Error;

/// Default server used when nothing else is configured
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

/// Namespace dedicated to order traffic
pub const DEFAULT_NAMESPACE: &str = "/orders";

/// Engine.IO endpoint path
pub const DEFAULT_SOCKET_PATH: &str = "/socket.io/";

/// Configuration for the order synchronization client
///
/// # Example
///
/// ```rust
/// use restaurant_order_sync::Config;
/// use restaurant_order_sync::client::ReconnectPolicy;
///
/// let config = Config::new("https://api.example.com")
///     .with_handshake_timeout(std::time::Duration::from_secs(5))
///     .with_reconnect_policy(ReconnectPolicy::new().max_attempts(10));
///
/// assert_eq!(config.namespace(), "/orders");
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the API server (http, https, ws or wss)
    server_url: String,

    /// Socket.IO namespace for order events
    namespace: String,

    /// Engine.IO path on the server
    socket_path: String,

    /// Upper bound for the connect handshake
    handshake_timeout: Duration,

    /// Transport reconnection behavior
    reconnect: ReconnectPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_URL)
    }
}

impl Config {
    /// Create a new configuration for the given server
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            socket_path: DEFAULT_SOCKET_PATH.to_string(),
            handshake_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Build a configuration from environment variables
    ///
    /// - `ORDER_SYNC_URL`: server base URL (default `http://localhost:3000`)
    /// - `ORDER_SYNC_NAMESPACE`: namespace (default `/orders`)
    /// - `ORDER_SYNC_HANDSHAKE_TIMEOUT_MS`: handshake timeout in milliseconds
    ///
    /// Unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config =
            Self::new(std::env::var("ORDER_SYNC_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.into()));

        if let Ok(namespace) = std::env::var("ORDER_SYNC_NAMESPACE") {
            config = config.with_namespace(namespace);
        }

        if let Ok(raw) = std::env::var("ORDER_SYNC_HANDSHAKE_TIMEOUT_MS") {
            match raw.parse::<u64>() {
                Ok(ms) => config = config.with_handshake_timeout(Duration::from_millis(ms)),
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid ORDER_SYNC_HANDSHAKE_TIMEOUT_MS"),
            }
        }

        config
    }

    /// Set the namespace; a leading `/` is added when missing
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.namespace = if namespace.starts_with('/') {
            namespace
        } else {
            format!("/{}", namespace)
        };
        self
    }

    /// Set the Engine.IO path
    #[must_use]
    pub fn with_socket_path(mut self, path: impl Into<String>) -> Self {
        self.socket_path = path.into();
        self
    }

    /// Set the handshake timeout
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the reconnection policy
    #[must_use]
    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Get the server base URL
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Get the namespace
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get the Engine.IO path
    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    /// Get the handshake timeout
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Get the reconnection policy
    pub fn reconnect_policy(&self) -> &ReconnectPolicy {
        &self.reconnect
    }

    /// WebSocket URL of the Engine.IO endpoint
    ///
    /// `http` maps to `ws` and `https` to `wss`; `ws`/`wss` are kept as-is.
    pub fn socket_url(&self) -> Result<Url, Error> {
        let mut url = Url::parse(&self.server_url)?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(Error::Config(format!("unsupported URL scheme: {}", other)));
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| Error::Config(format!("cannot use scheme {} for {}", scheme, self.server_url)))?;
        url.set_path(&self.socket_path);
        url.query_pairs_mut()
            .clear()
            .append_pair("EIO", "4")
            .append_pair("transport", "websocket");
        Ok(url)
    }
}
