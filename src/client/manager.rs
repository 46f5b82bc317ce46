//! Connection manager shared by every order view.
//!
//! [`ConnectionManager`] owns at most one live transport connection, scoped
//! to one restaurant. It collapses concurrent `connect` calls into a single
//! handshake, remembers which orders were subscribed so they can be replayed
//! after every (re)connect, and fans server-pushed order events out to
//! registered listeners.
//!
//! # Example
//!
//! ```rust,no_run
//! use restaurant_order_sync::client::{listener, ConnectionManager};
//! use restaurant_order_sync::types::{EventKind, OrderEventKind, SyncEvent};
//!
//! # async fn example() -> restaurant_order_sync::Result<()> {
//! let manager = ConnectionManager::global();
//!
//! let on_created = listener(|event| {
//!     if let SyncEvent::Order(order) = event {
//!         println!("new order {}", order.order.id());
//!     }
//! });
//! manager.on(OrderEventKind::Created.into(), on_created.clone());
//!
//! manager.connect("restaurant-1", Some("bearer-token")).await?;
//! manager.subscribe_to_order("order-42");
//!
//! // later
//! manager.off(EventKind::Order(OrderEventKind::Created), &on_created);
//! # Ok(())
//! # }
//! ```
//!
//! # Superseded connections
//!
//! Every transport handle gets a generation number. Events from a handle
//! whose generation is no longer current are discarded, so nothing from a
//! previous restaurant reaches listeners once the connection was replaced.
//! Replacing or closing a connection waits for an event of that connection
//! that is already being dispatched, so `connect` for another restaurant
//! returns only after the old connection's listeners have finished.

use std::sync::{Arc, OnceLock};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, ReentrantMutex};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::client::listeners::{dispatch, Listener, ListenerRegistry};
use crate::client::socket_io::SocketIoTransport;
use crate::client::transport::{OpenRequest, Outbound, Transport, TransportEvent};
use crate::config::Config;
use crate::error::Error;
use crate::types::event::{EventKind, OrderEventKind, SyncEvent};
use crate::types::messages::{decode_order_event, ClientCommand};

type ConnectFuture = Shared<BoxFuture<'static, Result<(), Error>>>;

/// Reason reported to listeners after an explicit [`ConnectionManager::disconnect`]
pub const CLIENT_DISCONNECT_REASON: &str = "io client disconnect";

/// In-flight connection attempt shared by concurrent callers
struct PendingConnect {
    restaurant_id: String,
    generation: u64,
    future: ConnectFuture,
}

/// Live transport handle
struct Connection {
    outbound: mpsc::UnboundedSender<Outbound>,
}

struct State {
    connection: Option<Connection>,
    generation: u64,
    is_connected: bool,
    current_restaurant_id: Option<String>,
    reconnect_attempts: u32,
    pending: Option<PendingConnect>,
    handshake: Option<oneshot::Sender<Result<(), Error>>>,
    /// Insertion ordered, no duplicates
    subscribed_order_ids: Vec<String>,
}

impl State {
    fn new() -> Self {
        Self {
            connection: None,
            generation: 0,
            is_connected: false,
            current_restaurant_id: None,
            reconnect_attempts: 0,
            pending: None,
            handshake: None,
            subscribed_order_ids: Vec::new(),
        }
    }

    /// Queue a command on the live handle
    fn send(&self, command: ClientCommand) {
        let Some(connection) = &self.connection else {
            return;
        };
        let event = command.event_name();
        if connection.outbound.send(Outbound::Emit(command)).is_err() {
            tracing::warn!(event, "transport closed, command dropped");
        }
    }

    /// Take the handshake sender and settle the attempt of `generation`
    fn settle_handshake(&mut self, generation: u64) -> Option<oneshot::Sender<Result<(), Error>>> {
        if self.pending.as_ref().is_some_and(|p| p.generation == generation) {
            self.pending = None;
        }
        self.handshake.take()
    }

    /// Close the live handle and fail any in-flight handshake
    fn teardown(&mut self) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.outbound.send(Outbound::Close);
        }
        self.generation += 1;
        self.is_connected = false;
        self.pending = None;
        if let Some(handshake) = self.handshake.take() {
            let _ = handshake.send(Err(Error::Superseded));
        }
    }
}

struct Inner {
    config: Config,
    transport: Arc<dyn Transport>,
    state: Mutex<State>,
    listeners: Mutex<ListenerRegistry>,
    /// Held while a transport event is applied and dispatched, and while a
    /// connection is torn down. Reentrant so listeners may call back in.
    dispatch_gate: ReentrantMutex<()>,
}

/// Shared real-time connection to the orders namespace
///
/// Cloning is cheap and every clone refers to the same connection.
///
/// # Thread Safety
///
/// All state lives behind `parking_lot` mutexes that are never held while
/// listeners run, so listeners may call back into the manager. Only the
/// reentrant dispatch gate spans a dispatch.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ConnectionManager")
            .field("connected", &state.is_connected)
            .field("restaurant_id", &state.current_restaurant_id)
            .field("reconnect_attempts", &state.reconnect_attempts)
            .field("subscription_count", &state.subscribed_order_ids.len())
            .finish()
    }
}

impl ConnectionManager {
    /// Create a manager using the given transport
    pub fn new<T: Transport>(config: Config, transport: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                transport: Arc::new(transport),
                state: Mutex::new(State::new()),
                listeners: Mutex::new(ListenerRegistry::new()),
                dispatch_gate: ReentrantMutex::new(()),
            }),
        }
    }

    /// Process-wide manager backed by the Socket.IO transport
    ///
    /// Built on first use from [`Config::from_env`].
    pub fn global() -> &'static ConnectionManager {
        static GLOBAL: OnceLock<ConnectionManager> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let config = Config::from_env();
            let transport = SocketIoTransport::new(config.clone());
            ConnectionManager::new(config, transport)
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Connect to the orders namespace for a restaurant
    ///
    /// Returns immediately when already connected to the same restaurant.
    /// Concurrent calls for the same restaurant share one handshake. A call
    /// for a different restaurant unsubscribes from the previous one and
    /// replaces its transport.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRestaurantId`] for an empty id
    /// - [`Error::HandshakeTimeout`] when the server does not acknowledge in time
    /// - [`Error::ConnectFailed`] when the transport cannot connect or is refused
    /// - [`Error::Superseded`] when another `connect`/`disconnect` replaced this attempt
    pub async fn connect(&self, restaurant_id: &str, token: Option<&str>) -> Result<(), Error> {
        if restaurant_id.trim().is_empty() {
            return Err(Error::InvalidRestaurantId);
        }

        let future = {
            let _gate = self.inner.dispatch_gate.lock();
            let mut state = self.inner.state.lock();
            if state.is_connected && state.current_restaurant_id.as_deref() == Some(restaurant_id) {
                tracing::debug!(restaurant_id, "already connected");
                return Ok(());
            }
            let in_flight = state
                .pending
                .as_ref()
                .filter(|pending| pending.restaurant_id == restaurant_id)
                .map(|pending| pending.future.clone());
            match in_flight {
                Some(future) => {
                    tracing::debug!(restaurant_id, "joining in-flight connection attempt");
                    future
                }
                None => self.start_connect(&mut state, restaurant_id, token),
            }
        };

        future.await
    }

    fn start_connect(&self, state: &mut State, restaurant_id: &str, token: Option<&str>) -> ConnectFuture {
        if state.connection.is_some() {
            if let Some(previous) = state.current_restaurant_id.clone() {
                if state.is_connected && previous != restaurant_id {
                    state.send(ClientCommand::UnsubscribeRestaurant(previous.clone()));
                }
                tracing::info!(previous = %previous, restaurant_id, "replacing connection");
            }
        }
        state.teardown();
        state.reconnect_attempts = 0;
        state.current_restaurant_id = Some(restaurant_id.to_string());

        let generation = state.generation;
        let (handshake_tx, handshake_rx) = oneshot::channel();
        state.handshake = Some(handshake_tx);

        let handle = self.inner.transport.open(OpenRequest {
            token: token.map(str::to_owned),
            reconnect: self.inner.config.reconnect_policy().clone(),
        });
        let (outbound, events) = handle.into_parts();
        state.connection = Some(Connection { outbound });
        tokio::spawn(pump(self.inner.clone(), generation, events));
        tracing::info!(restaurant_id, generation, "connecting");

        let timeout = self.inner.config.handshake_timeout();
        let inner = self.inner.clone();
        let future = async move {
            let outcome = match tokio::time::timeout(timeout, handshake_rx).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(_)) => Err(Error::ConnectionClosed),
                Err(_) => Err(Error::HandshakeTimeout(timeout)),
            };
            inner.finish_connect(generation, &outcome);
            outcome
        }
        .boxed()
        .shared();

        state.pending = Some(PendingConnect {
            restaurant_id: restaurant_id.to_string(),
            generation,
            future: future.clone(),
        });
        future
    }

    /// Track an order; sends `subscribe:order` now if connected
    ///
    /// The id is kept while disconnected and replayed on every (re)connect.
    pub fn subscribe_to_order(&self, order_id: &str) {
        if order_id.is_empty() {
            tracing::warn!("ignoring subscription to empty order id");
            return;
        }
        let mut state = self.inner.state.lock();
        if !state.subscribed_order_ids.iter().any(|id| id == order_id) {
            state.subscribed_order_ids.push(order_id.to_string());
        }
        if state.is_connected {
            state.send(ClientCommand::SubscribeOrder(order_id.to_string()));
            tracing::debug!(order_id, "subscribed to order");
        } else {
            tracing::debug!(order_id, "order subscription queued until connected");
        }
    }

    /// Stop tracking an order; sends `unsubscribe:order` if connected
    pub fn unsubscribe_from_order(&self, order_id: &str) {
        let mut state = self.inner.state.lock();
        if state.is_connected {
            state.send(ClientCommand::UnsubscribeOrder(order_id.to_string()));
        }
        state.subscribed_order_ids.retain(|id| id != order_id);
    }

    /// Leave a restaurant room; sends `unsubscribe:restaurant` if connected
    ///
    /// The current restaurant id is kept until the next `connect`.
    pub fn unsubscribe_from_restaurant(&self, restaurant_id: &str) {
        let state = self.inner.state.lock();
        if state.is_connected {
            state.send(ClientCommand::UnsubscribeRestaurant(restaurant_id.to_string()));
        }
    }

    /// Tear down the connection and forget all subscriptions
    ///
    /// Safe to call when not connected. Listeners stay registered.
    pub fn disconnect(&self) {
        let _gate = self.inner.dispatch_gate.lock();
        let was_connected = {
            let mut state = self.inner.state.lock();
            let was_connected = state.is_connected;
            if state.connection.is_some() {
                tracing::info!(restaurant_id = ?state.current_restaurant_id, "disconnecting");
            }
            state.teardown();
            state.reconnect_attempts = 0;
            state.current_restaurant_id = None;
            state.subscribed_order_ids.clear();
            was_connected
        };

        if was_connected {
            self.inner.emit(&SyncEvent::Disconnected {
                reason: CLIENT_DISCONNECT_REASON.to_string(),
            });
        }
    }

    /// Register a listener; the same `Arc` must be passed to [`off`](Self::off)
    pub fn on(&self, kind: EventKind, listener: Listener) {
        self.inner.listeners.lock().add(kind, listener);
    }

    /// Remove a listener by reference; unknown listeners are ignored
    pub fn off(&self, kind: EventKind, listener: &Listener) {
        self.inner.listeners.lock().remove(kind, listener);
    }

    /// Whether the namespace handshake has completed on the live connection
    pub fn connected(&self) -> bool {
        self.inner.state.lock().is_connected
    }

    /// Restaurant of the current (or in-flight) connection
    pub fn current_restaurant_id(&self) -> Option<String> {
        self.inner.state.lock().current_restaurant_id.clone()
    }

    /// Subscribed order ids in insertion order
    pub fn subscribed_order_ids(&self) -> Vec<String> {
        self.inner.state.lock().subscribed_order_ids.clone()
    }

    /// Reconnection attempts since the last successful connection
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.state.lock().reconnect_attempts
    }

    /// Listeners registered for `kind`
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.listeners.lock().count(kind)
    }

    /// Listeners registered across all kinds
    pub fn total_listener_count(&self) -> usize {
        self.inner.listeners.lock().total()
    }
}

impl Inner {
    fn emit(&self, event: &SyncEvent) {
        let listeners = self.listeners.lock().snapshot(event.kind());
        dispatch(&listeners, event);
    }

    fn finish_connect(&self, generation: u64, outcome: &Result<(), Error>) {
        let _gate = self.dispatch_gate.lock();
        let mut timed_out = None;
        {
            let mut state = self.state.lock();
            if state.pending.as_ref().is_some_and(|p| p.generation == generation) {
                state.pending = None;
            }
            if let Err(err @ Error::HandshakeTimeout(_)) = outcome {
                if state.generation == generation {
                    tracing::warn!(generation, "handshake timed out, closing transport");
                    state.teardown();
                    state.current_restaurant_id = None;
                    timed_out = Some(err.to_string());
                }
            }
        }

        if let Some(message) = timed_out {
            self.emit(&SyncEvent::Error { message });
        }
    }

    /// Apply one transport event; returns false once the pump should stop
    fn handle_transport_event(&self, generation: u64, event: TransportEvent) -> bool {
        let _gate = self.dispatch_gate.lock();
        let mut handshake = None;
        let mut keep_running = true;

        let outgoing = {
            let mut state = self.state.lock();
            if state.generation != generation || state.connection.is_none() {
                tracing::debug!(generation, "dropping event from superseded connection");
                return false;
            }

            match event {
                TransportEvent::Connected => {
                    state.is_connected = true;
                    state.reconnect_attempts = 0;
                    if let Some(restaurant_id) = state.current_restaurant_id.clone() {
                        state.send(ClientCommand::SubscribeRestaurant(restaurant_id));
                    }
                    for order_id in state.subscribed_order_ids.clone() {
                        state.send(ClientCommand::SubscribeOrder(order_id));
                    }
                    tracing::info!(
                        restaurant_id = ?state.current_restaurant_id,
                        replayed = state.subscribed_order_ids.len(),
                        "connected to orders namespace"
                    );
                    handshake = state.settle_handshake(generation).map(|tx| (tx, Ok(())));
                    Some(SyncEvent::Connected)
                }
                TransportEvent::Disconnected { reason } => {
                    state.is_connected = false;
                    tracing::warn!(reason = %reason, "disconnected from orders namespace");
                    Some(SyncEvent::Disconnected { reason })
                }
                TransportEvent::ReconnectAttempt(attempt) => {
                    state.reconnect_attempts = attempt;
                    tracing::debug!(attempt, "transport reconnecting");
                    None
                }
                TransportEvent::ConnectError(message) => {
                    tracing::warn!(error = %message, "connection error");
                    handshake = state
                        .settle_handshake(generation)
                        .map(|tx| (tx, Err(Error::ConnectFailed(message.clone()))));
                    Some(SyncEvent::Error { message })
                }
                TransportEvent::Error(message) => {
                    tracing::warn!(error = %message, "transport error");
                    Some(SyncEvent::Error { message })
                }
                TransportEvent::Closed => {
                    tracing::info!(generation, "transport closed");
                    state.is_connected = false;
                    state.connection = None;
                    handshake = state
                        .settle_handshake(generation)
                        .map(|tx| (tx, Err(Error::ConnectionClosed)));
                    keep_running = false;
                    None
                }
                TransportEvent::Message { event, payload } => {
                    drop(state);
                    inbound_event(&event, &payload)
                }
            }
        };

        if let Some(event) = outgoing {
            self.emit(&event);
        }
        if let Some((tx, outcome)) = handshake {
            let _ = tx.send(outcome);
        }
        keep_running
    }
}

/// Map a server-pushed event onto a listener event
fn inbound_event(event: &str, payload: &Value) -> Option<SyncEvent> {
    match OrderEventKind::from_wire(event) {
        Some(kind) => match decode_order_event(kind, payload) {
            Some(order) => Some(SyncEvent::Order(order)),
            None => {
                tracing::warn!(event, payload = %payload, "dropping order event with unrecognized payload shape");
                None
            }
        },
        None if event == "error" => Some(SyncEvent::Error {
            message: match payload {
                Value::String(message) => message.clone(),
                Value::Object(map) => map
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .unwrap_or_else(|| payload.to_string()),
                other => other.to_string(),
            },
        }),
        None => {
            tracing::debug!(event, "ignoring unknown event");
            None
        }
    }
}

/// Forward transport events of one generation until it is superseded or closed
async fn pump(inner: Arc<Inner>, generation: u64, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
    while let Some(event) = events.recv().await {
        if !inner.handle_transport_event(generation, event) {
            break;
        }
    }
    tracing::debug!(generation, "transport event pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inbound_event_mapping() {
        let created = inbound_event("order:created", &json!({"data": {"id": "o1"}})).unwrap();
        assert_eq!(created.kind(), EventKind::Order(OrderEventKind::Created));

        let error = inbound_event("error", &json!({"message": "forbidden"})).unwrap();
        assert_eq!(
            error,
            SyncEvent::Error {
                message: "forbidden".to_string()
            }
        );

        assert!(inbound_event("order:created", &json!({"data": {}})).is_none());
        assert!(inbound_event("kitchen:ticket", &json!({"id": "t1"})).is_none());
    }
}
