//! Transport abstraction between the connection manager and the wire.
//!
//! A [`Transport`] opens one logical connection and hands back a
//! [`TransportHandle`]: a sender for outbound commands and a receiver of
//! [`TransportEvent`]s. The transport owns handshakes, heartbeats and
//! reconnection; the manager only sees the resulting lifecycle events.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::client::reconnect::ReconnectPolicy;
use crate::types::messages::ClientCommand;

/// Parameters for opening a connection
#[derive(Debug, Clone)]
pub struct OpenRequest {
    /// Bearer token sent in the namespace handshake
    pub token: Option<String>,
    /// Reconnection behavior after a drop
    pub reconnect: ReconnectPolicy,
}

/// Frame sent from the manager to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Emit a command on the namespace
    Emit(ClientCommand),
    /// Close the connection and stop reconnecting
    Close,
}

/// Lifecycle and data events surfaced by a transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Namespace handshake acknowledged (initial connect or reconnect)
    Connected,
    /// Connection dropped
    Disconnected {
        /// Why the connection dropped
        reason: String,
    },
    /// A reconnection attempt is about to start
    ReconnectAttempt(u32),
    /// Connecting failed or the server refused the handshake
    ConnectError(String),
    /// Non-fatal error after the handshake
    Error(String),
    /// Server-pushed event
    Message {
        /// Event name
        event: String,
        /// First event argument
        payload: Value,
    },
    /// The transport gave up and will emit nothing further
    Closed,
}

/// Manager side of an open connection
#[derive(Debug)]
pub struct TransportHandle {
    outbound: mpsc::UnboundedSender<Outbound>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Transport side of an open connection
#[derive(Debug)]
pub struct TransportEnd {
    /// Frames queued by the manager
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
    /// Events for the manager
    pub events: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportHandle {
    /// Create a connected handle/end pair
    pub fn pair() -> (TransportHandle, TransportEnd) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            TransportHandle {
                outbound: outbound_tx,
                events: events_rx,
            },
            TransportEnd {
                outbound: outbound_rx,
                events: events_tx,
            },
        )
    }

    /// Split into the outbound sender and the event receiver
    pub fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedSender<Outbound>,
        mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        (self.outbound, self.events)
    }
}

impl TransportEnd {
    /// Forward an event to the manager; returns false once the manager is gone
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }
}

/// Opens connections to the orders namespace
pub trait Transport: Send + Sync + 'static {
    /// Start connecting in the background and return the manager's handle
    ///
    /// Must be called from within a Tokio runtime.
    fn open(&self, request: OpenRequest) -> TransportHandle;
}
