//! # restaurant-order-sync
//!
//! Real-time order synchronization for restaurant back-office applications.
//!
//! ## Features
//!
//! - **Shared Connection** - One authenticated connection per process, scoped to a restaurant
//! - **Subscription Replay** - Order subscriptions survive drops and are re-sent on reconnect
//! - **Tolerant Decoding** - Legacy and current payload shapes normalized to `(order, item_id)`
//! - **Leak-free Bindings** - Views register and deregister exactly their own listeners
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use restaurant_order_sync::client::ConnectionManager;
//! use restaurant_order_sync::sync::{OrderCallbacks, OrderSync, OrderSyncOptions, SharedSession};
//!
//! #[tokio::main]
//! async fn main() {
//!     let session = Arc::new(SharedSession::with_token("bearer-token"));
//!     let callbacks = OrderCallbacks::new()
//!         .on_created(|order, _| println!("new order {}", order.id()))
//!         .on_item_updated(|order, item| println!("{} item {:?} changed", order.id(), item))
//!         .on_error(|message| eprintln!("order sync error: {}", message));
//!
//!     let mut list_view = OrderSync::new(ConnectionManager::global().clone(), session, callbacks);
//!     list_view.bind(OrderSyncOptions::new("restaurant-1")).await;
//!
//!     // Dropping the binding removes its listeners; the connection stays up.
//!     drop(list_view);
//! }
//! ```
//!
//! ## Architecture
//!
//! This crate is organized into several modules:
//!
//! - [`client`] - Connection manager, transport and reconnection policy
//! - [`sync`] - Per-view bindings and the session token source
//! - [`types`] - Event kinds, order snapshots, wire packets
//! - [`config`] - Server, namespace and timing configuration
//! - [`error`] - Error types for the crate
//!
//! ## Wire Protocol
//!
//! The production transport speaks Socket.IO (Engine.IO v4) over WebSocket
//! on the `/orders` namespace. The bearer token travels in the namespace
//! CONNECT payload, not in a cookie.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod sync;
pub mod types;

// Re-export main types at crate root for convenience
pub use client::ConnectionManager;
pub use config::Config;
pub use error::Error;
pub use sync::{OrderCallbacks, OrderSync, OrderSyncOptions};

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;
