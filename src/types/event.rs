//! Event kinds and the events delivered to listeners.

use std::fmt;

use super::order::OrderSnapshot;

/// Order lifecycle events pushed by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderEventKind {
    /// A new order was placed
    Created,
    /// Full order update
    Updated,
    /// Only the status changed
    StatusUpdated,
    /// A single line item changed (carries an item id)
    ItemUpdated,
    /// Generic modification
    Modified,
    /// Only order details (customer, address, notes) changed
    DetailsUpdated,
}

impl OrderEventKind {
    /// All order event kinds
    pub const ALL: [OrderEventKind; 6] = [
        OrderEventKind::Created,
        OrderEventKind::Updated,
        OrderEventKind::StatusUpdated,
        OrderEventKind::ItemUpdated,
        OrderEventKind::Modified,
        OrderEventKind::DetailsUpdated,
    ];

    /// Event name on the wire
    pub fn wire_name(self) -> &'static str {
        match self {
            OrderEventKind::Created => "order:created",
            OrderEventKind::Updated => "order:updated",
            OrderEventKind::StatusUpdated => "order:status-updated",
            OrderEventKind::ItemUpdated => "order:item-updated",
            OrderEventKind::Modified => "order:modified",
            OrderEventKind::DetailsUpdated => "order:details-updated",
        }
    }

    /// Look up a kind by its wire name
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.wire_name() == name)
    }
}

/// Every event a listener can register for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Order lifecycle event
    Order(OrderEventKind),
    /// Transport (re)connected and subscriptions were sent
    Connected,
    /// Transport dropped
    Disconnected,
    /// Handshake failure or transport error
    Error,
}

impl EventKind {
    /// All event kinds, order events first
    pub const ALL: [EventKind; 9] = [
        EventKind::Order(OrderEventKind::Created),
        EventKind::Order(OrderEventKind::Updated),
        EventKind::Order(OrderEventKind::StatusUpdated),
        EventKind::Order(OrderEventKind::ItemUpdated),
        EventKind::Order(OrderEventKind::Modified),
        EventKind::Order(OrderEventKind::DetailsUpdated),
        EventKind::Connected,
        EventKind::Disconnected,
        EventKind::Error,
    ];
}

impl From<OrderEventKind> for EventKind {
    fn from(kind: OrderEventKind) -> Self {
        EventKind::Order(kind)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Order(kind) => f.write_str(kind.wire_name()),
            EventKind::Connected => f.write_str("connected"),
            EventKind::Disconnected => f.write_str("disconnected"),
            EventKind::Error => f.write_str("error"),
        }
    }
}

/// Normalized order event: `(order, item_id?)`
#[derive(Debug, Clone, PartialEq)]
pub struct OrderEvent {
    /// Which lifecycle event this is
    pub kind: OrderEventKind,
    /// Latest order snapshot
    pub order: OrderSnapshot,
    /// Item identifier (item updates only)
    pub item_id: Option<String>,
}

/// Event delivered to registered listeners
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Order lifecycle event
    Order(OrderEvent),
    /// Connected to the orders namespace
    Connected,
    /// Connection dropped
    Disconnected {
        /// Reason reported by the transport
        reason: String,
    },
    /// Connection-level error
    Error {
        /// Human readable description
        message: String,
    },
}

impl SyncEvent {
    /// The registry key for this event
    pub fn kind(&self) -> EventKind {
        match self {
            SyncEvent::Order(event) => EventKind::Order(event.kind),
            SyncEvent::Connected => EventKind::Connected,
            SyncEvent::Disconnected { .. } => EventKind::Disconnected,
            SyncEvent::Error { .. } => EventKind::Error,
        }
    }
}
