//! Per-view binding over the shared connection manager.
//!
//! An [`OrderSync`] belongs to one view (an order list or an order detail
//! screen). Binding it connects the shared manager for a restaurant,
//! optionally subscribes one order, and routes the six order events to the
//! view's callbacks. Unbinding (or dropping) removes exactly the listeners
//! this binding registered; the connection itself stays up for other views.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use restaurant_order_sync::client::ConnectionManager;
//! use restaurant_order_sync::sync::{OrderCallbacks, OrderSync, OrderSyncOptions, SharedSession};
//!
//! # async fn example() {
//! let session = Arc::new(SharedSession::with_token("bearer-token"));
//! let callbacks = OrderCallbacks::new()
//!     .on_created(|order, _| println!("new order {}", order.id()))
//!     .on_status_updated(|order, _| println!("{} -> {:?}", order.id(), order.get("status")));
//!
//! let mut sync = OrderSync::new(ConnectionManager::global().clone(), session, callbacks);
//! sync.bind(OrderSyncOptions::new("restaurant-1").with_order("order-42")).await;
//! println!("connected: {}", sync.is_connected());
//! # }
//! ```

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::client::listeners::{listener, Listener};
use crate::client::manager::ConnectionManager;
use crate::error::Error;
use crate::sync::session::SessionStore;
use crate::types::event::{EventKind, OrderEventKind, SyncEvent};
use crate::types::order::OrderSnapshot;

/// Callback for an order event: `(order, item_id)`
pub type OrderCallback = Arc<dyn Fn(&OrderSnapshot, Option<&str>) + Send + Sync>;

/// Callback for connection errors
pub type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// View callbacks, all optional
#[derive(Clone, Default)]
pub struct OrderCallbacks {
    created: Option<OrderCallback>,
    updated: Option<OrderCallback>,
    status_updated: Option<OrderCallback>,
    item_updated: Option<OrderCallback>,
    modified: Option<OrderCallback>,
    details_updated: Option<OrderCallback>,
    error: Option<ErrorCallback>,
}

impl std::fmt::Debug for OrderCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderCallbacks")
            .field("created", &self.created.is_some())
            .field("updated", &self.updated.is_some())
            .field("status_updated", &self.status_updated.is_some())
            .field("item_updated", &self.item_updated.is_some())
            .field("modified", &self.modified.is_some())
            .field("details_updated", &self.details_updated.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

impl OrderCallbacks {
    /// No callbacks
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when an order is created
    #[must_use]
    pub fn on_created<F>(mut self, f: F) -> Self
    where
        F: Fn(&OrderSnapshot, Option<&str>) + Send + Sync + 'static,
    {
        self.created = Some(Arc::new(f));
        self
    }

    /// Called on a full order update
    #[must_use]
    pub fn on_updated<F>(mut self, f: F) -> Self
    where
        F: Fn(&OrderSnapshot, Option<&str>) + Send + Sync + 'static,
    {
        self.updated = Some(Arc::new(f));
        self
    }

    /// Called when only the status changed
    #[must_use]
    pub fn on_status_updated<F>(mut self, f: F) -> Self
    where
        F: Fn(&OrderSnapshot, Option<&str>) + Send + Sync + 'static,
    {
        self.status_updated = Some(Arc::new(f));
        self
    }

    /// Called when a single item changed; the item id is passed along
    #[must_use]
    pub fn on_item_updated<F>(mut self, f: F) -> Self
    where
        F: Fn(&OrderSnapshot, Option<&str>) + Send + Sync + 'static,
    {
        self.item_updated = Some(Arc::new(f));
        self
    }

    /// Called on a generic modification
    #[must_use]
    pub fn on_modified<F>(mut self, f: F) -> Self
    where
        F: Fn(&OrderSnapshot, Option<&str>) + Send + Sync + 'static,
    {
        self.modified = Some(Arc::new(f));
        self
    }

    /// Called when order details changed
    #[must_use]
    pub fn on_details_updated<F>(mut self, f: F) -> Self
    where
        F: Fn(&OrderSnapshot, Option<&str>) + Send + Sync + 'static,
    {
        self.details_updated = Some(Arc::new(f));
        self
    }

    /// Called with the message of every connection error
    #[must_use]
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(f));
        self
    }

    fn for_kind(&self, kind: OrderEventKind) -> Option<&OrderCallback> {
        match kind {
            OrderEventKind::Created => self.created.as_ref(),
            OrderEventKind::Updated => self.updated.as_ref(),
            OrderEventKind::StatusUpdated => self.status_updated.as_ref(),
            OrderEventKind::ItemUpdated => self.item_updated.as_ref(),
            OrderEventKind::Modified => self.modified.as_ref(),
            OrderEventKind::DetailsUpdated => self.details_updated.as_ref(),
        }
    }
}

/// What a binding is bound to; activation re-runs only when this changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSyncOptions {
    /// Restaurant to connect for (no connection without it)
    pub restaurant_id: Option<String>,
    /// Order to subscribe in addition to the restaurant
    pub order_id: Option<String>,
    /// Whether to connect at all
    pub enabled: bool,
}

impl Default for OrderSyncOptions {
    fn default() -> Self {
        Self {
            restaurant_id: None,
            order_id: None,
            enabled: true,
        }
    }
}

impl OrderSyncOptions {
    /// Bind to a restaurant
    pub fn new(restaurant_id: impl Into<String>) -> Self {
        Self {
            restaurant_id: Some(restaurant_id.into()),
            ..Self::default()
        }
    }

    /// Also subscribe to one order
    #[must_use]
    pub fn with_order(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    /// Enable or disable connecting
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[derive(Debug, Default)]
struct Status {
    is_connected: bool,
    connection_error: Option<String>,
}

/// Binding of one view to the shared order connection
pub struct OrderSync {
    manager: ConnectionManager,
    session: Arc<dyn SessionStore>,
    callbacks: Arc<RwLock<OrderCallbacks>>,
    status: Arc<Mutex<Status>>,
    options: Option<OrderSyncOptions>,
    registered: Vec<(EventKind, Listener)>,
}

impl std::fmt::Debug for OrderSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderSync")
            .field("options", &self.options)
            .field("status", &*self.status.lock())
            .field("listeners", &self.registered.len())
            .finish()
    }
}

impl OrderSync {
    /// Create an unbound binding
    pub fn new(
        manager: ConnectionManager,
        session: Arc<dyn SessionStore>,
        callbacks: OrderCallbacks,
    ) -> Self {
        Self {
            manager,
            session,
            callbacks: Arc::new(RwLock::new(callbacks)),
            status: Arc::new(Mutex::new(Status::default())),
            options: None,
            registered: Vec::new(),
        }
    }

    /// Bind to a restaurant/order pair
    ///
    /// Does nothing when `options` equal the current binding. Otherwise the
    /// previous listeners are removed and the binding is activated again.
    /// Connection failures are reported through [`connection_error`](Self::connection_error)
    /// and the `on_error` callback rather than returned.
    pub async fn bind(&mut self, options: OrderSyncOptions) {
        if self.options.as_ref() == Some(&options) {
            return;
        }
        let order_changed = self.options.as_ref().map(|o| &o.order_id) != Some(&options.order_id);

        self.unbind();
        self.options = Some(options.clone());
        self.activate(&options, order_changed).await;
    }

    async fn activate(&mut self, options: &OrderSyncOptions, order_changed: bool) {
        let token = self.session.access_token();
        let (restaurant_id, token) = match (options.restaurant_id.as_deref(), token) {
            (Some(restaurant_id), Some(token)) if options.enabled && !restaurant_id.is_empty() => {
                (restaurant_id, token)
            }
            _ => {
                tracing::debug!(
                    enabled = options.enabled,
                    restaurant_id = ?options.restaurant_id,
                    "order sync inactive"
                );
                self.status.lock().is_connected = false;
                return;
            }
        };

        self.register(options.order_id.clone());

        let already_connected = self.manager.connected()
            && self.manager.current_restaurant_id().as_deref() == Some(restaurant_id);
        if already_connected {
            let mut status = self.status.lock();
            status.is_connected = true;
            status.connection_error = None;
        }

        if order_changed && already_connected {
            if let Some(order_id) = &options.order_id {
                self.manager.subscribe_to_order(order_id);
            }
        }

        if already_connected {
            return;
        }

        match self.manager.connect(restaurant_id, Some(&token)).await {
            Ok(()) => {
                let mut status = self.status.lock();
                status.is_connected = self.manager.connected();
                status.connection_error = None;
            }
            Err(Error::Superseded) => {
                tracing::debug!(restaurant_id, "connection attempt superseded");
            }
            Err(e) => {
                tracing::warn!(restaurant_id, error = %e, "order sync failed to connect");
                {
                    let mut status = self.status.lock();
                    status.is_connected = false;
                    status.connection_error = Some(e.to_string());
                }
                // Handshake failures already reached on_error through the Error event
                if !matches!(e, Error::ConnectFailed(_) | Error::HandshakeTimeout(_)) {
                    let on_error = self.callbacks.read().error.clone();
                    if let Some(on_error) = on_error {
                        on_error(&e.to_string());
                    }
                }
            }
        }
    }

    fn register(&mut self, order_id: Option<String>) {
        for kind in OrderEventKind::ALL {
            let callbacks = self.callbacks.clone();
            self.add(
                kind.into(),
                listener(move |event| {
                    if let SyncEvent::Order(event) = event {
                        let callback = callbacks.read().for_kind(event.kind).cloned();
                        if let Some(callback) = callback {
                            callback(&event.order, event.item_id.as_deref());
                        }
                    }
                }),
            );
        }

        let status = self.status.clone();
        let manager = self.manager.clone();
        self.add(
            EventKind::Connected,
            listener(move |_| {
                {
                    let mut status = status.lock();
                    status.is_connected = true;
                    status.connection_error = None;
                }
                if let Some(order_id) = &order_id {
                    manager.subscribe_to_order(order_id);
                }
            }),
        );

        let status = self.status.clone();
        self.add(
            EventKind::Disconnected,
            listener(move |_| status.lock().is_connected = false),
        );

        let status = self.status.clone();
        let callbacks = self.callbacks.clone();
        self.add(
            EventKind::Error,
            listener(move |event| {
                if let SyncEvent::Error { message } = event {
                    status.lock().connection_error = Some(message.clone());
                    let on_error = callbacks.read().error.clone();
                    if let Some(on_error) = on_error {
                        on_error(message.as_str());
                    }
                }
            }),
        );
    }

    fn add(&mut self, kind: EventKind, listener: Listener) {
        self.manager.on(kind, listener.clone());
        self.registered.push((kind, listener));
    }

    /// Remove this binding's listeners; the shared connection stays up
    pub fn unbind(&mut self) {
        for (kind, listener) in self.registered.drain(..) {
            self.manager.off(kind, &listener);
        }
        self.options = None;
    }

    /// Replace the callbacks without re-activating the binding
    pub fn set_callbacks(&self, callbacks: OrderCallbacks) {
        *self.callbacks.write() = callbacks;
    }

    /// Force a full teardown of the shared connection
    pub fn disconnect(&self) {
        self.manager.disconnect();
        self.status.lock().is_connected = false;
    }

    /// Whether the shared connection is up for this binding
    pub fn is_connected(&self) -> bool {
        self.status.lock().is_connected
    }

    /// Last connection error, cleared on the next successful connect
    pub fn connection_error(&self) -> Option<String> {
        self.status.lock().connection_error.clone()
    }

    /// Options of the current binding
    pub fn options(&self) -> Option<&OrderSyncOptions> {
        self.options.as_ref()
    }

    /// The shared manager
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }
}

impl Drop for OrderSync {
    fn drop(&mut self) {
        self.unbind();
    }
}
