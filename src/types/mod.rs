//! Wire and event types for the orders namespace.
//!
//! - [`order`] - Opaque order snapshots
//! - [`event`] - Event kinds and the events handed to listeners
//! - [`messages`] - Outbound commands and inbound payload normalization
//! - [`packet`] - Engine.IO / Socket.IO packet codec

pub mod event;
pub mod messages;
pub mod order;
pub mod packet;

pub use event::{EventKind, OrderEvent, OrderEventKind, SyncEvent};
pub use messages::ClientCommand;
pub use order::OrderSnapshot;
