//! View-level bindings over the shared connection.
//!
//! - [`binding`] - [`OrderSync`], one per view, with listener teardown
//! - [`session`] - Access token source

pub mod binding;
pub mod session;

pub use binding::{OrderCallbacks, OrderSync, OrderSyncOptions};
pub use session::{SessionStore, SharedSession};
