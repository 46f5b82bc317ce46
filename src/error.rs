//! Error types for the restaurant-order-sync crate.
//!
//! This module defines the errors that can occur while establishing and
//! operating the real-time order connection: transport failures, handshake
//! timeouts, rejected namespace connections, and malformed wire packets.
//!
//! [`Error`] is `Clone` because a single in-flight connection attempt is
//! shared by every concurrent caller of
//! [`ConnectionManager::connect`](crate::client::ConnectionManager::connect),
//! and each of them receives the same outcome.

use std::sync::Arc;
use std::time::Duration;

/// The main error type for this crate
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[source] Arc<tokio_tungstenite::tungstenite::Error>),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[source] Arc<serde_json::Error>),

    /// Server URL could not be parsed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Invalid configuration (unsupported scheme, bad values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// `connect` was called with an empty restaurant id
    #[error("Restaurant id must not be empty")]
    InvalidRestaurantId,

    /// The server did not acknowledge the handshake in time
    #[error("Handshake timed out after {}ms", .0.as_millis())]
    HandshakeTimeout(Duration),

    /// The transport failed to connect or the server rejected the handshake
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    /// The connection attempt was replaced by a newer `connect` or a `disconnect`
    #[error("Connection attempt superseded")]
    Superseded,

    /// Packet did not follow the Engine.IO / Socket.IO framing
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Connection closed before the operation completed
    #[error("Connection closed")]
    ConnectionClosed,
}

impl Error {
    /// Check if calling `connect` again may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::WebSocket(_)
                | Error::HandshakeTimeout(_)
                | Error::ConnectFailed(_)
                | Error::ConnectionClosed
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(Arc::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(Arc::new(err))
    }
}
