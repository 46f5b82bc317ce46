//! Connection layer for real-time order events.
//!
//! This module contains:
//!
//! - [`manager`] - Shared connection manager with subscription replay
//! - [`listeners`] - Listener registry and panic-isolated dispatch
//! - [`transport`] - Transport trait and channel plumbing
//! - [`socket_io`] - Socket.IO transport over WebSocket
//! - [`reconnect`] - Reconnection policy

pub mod listeners;
pub mod manager;
pub mod reconnect;
pub mod socket_io;
pub mod transport;

pub use listeners::{listener, Listener};
pub use manager::ConnectionManager;
pub use reconnect::ReconnectPolicy;
pub use socket_io::SocketIoTransport;
pub use transport::{OpenRequest, Outbound, Transport, TransportEnd, TransportEvent, TransportHandle};
