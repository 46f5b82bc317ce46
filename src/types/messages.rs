//! Outbound commands and inbound payload normalization.
//!
//! The server has changed its payload layout over time, so an inbound order
//! message may be any of:
//!
//! - a bare order object: `{ "id": ..., ... }`
//! - an envelope: `{ "data": { "id": ..., ... } }`
//! - for item updates: `{ "order": {...}, "itemId": ... }` or
//!   `{ "data": { "order": {...}, "itemId": ... } }`
//!
//! The richer shape is tried first. A payload matching none of them yields
//! `None` and is dropped by the caller.

use serde_json::Value;

use super::event::{OrderEvent, OrderEventKind};
use super::order::OrderSnapshot;

/// Command sent to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Join the room of a restaurant
    SubscribeRestaurant(String),
    /// Leave the room of a restaurant
    UnsubscribeRestaurant(String),
    /// Receive updates for a single order
    SubscribeOrder(String),
    /// Stop receiving updates for a single order
    UnsubscribeOrder(String),
}

impl ClientCommand {
    /// Event name on the wire
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientCommand::SubscribeRestaurant(_) => "subscribe:restaurant",
            ClientCommand::UnsubscribeRestaurant(_) => "unsubscribe:restaurant",
            ClientCommand::SubscribeOrder(_) => "subscribe:order",
            ClientCommand::UnsubscribeOrder(_) => "unsubscribe:order",
        }
    }

    /// Event argument (the bare id string)
    pub fn payload(&self) -> Value {
        match self {
            ClientCommand::SubscribeRestaurant(id)
            | ClientCommand::UnsubscribeRestaurant(id)
            | ClientCommand::SubscribeOrder(id)
            | ClientCommand::UnsubscribeOrder(id) => Value::String(id.clone()),
        }
    }
}

/// Extract an order from `{data: order}` or a bare order
pub fn normalize_order(payload: &Value) -> Option<OrderSnapshot> {
    payload
        .get("data")
        .and_then(OrderSnapshot::from_value)
        .or_else(|| OrderSnapshot::from_value(payload))
}

/// Extract `(order, item_id)` from an item update payload
///
/// Accepted in order of preference: `{data: {order, itemId}}`,
/// `{order, itemId}`, `{data: order}`, bare order.
pub fn normalize_item_update(payload: &Value) -> Option<(OrderSnapshot, Option<String>)> {
    if let Some(found) = payload.get("data").and_then(order_with_item) {
        return Some(found);
    }
    if let Some(found) = order_with_item(payload) {
        return Some(found);
    }
    normalize_order(payload).map(|order| (order, None))
}

/// Normalize an inbound payload for the given event kind
pub fn decode_order_event(kind: OrderEventKind, payload: &Value) -> Option<OrderEvent> {
    let (order, item_id) = match kind {
        OrderEventKind::ItemUpdated => normalize_item_update(payload)?,
        _ => (normalize_order(payload)?, None),
    };
    Some(OrderEvent {
        kind,
        order,
        item_id,
    })
}

fn order_with_item(value: &Value) -> Option<(OrderSnapshot, Option<String>)> {
    let order = OrderSnapshot::from_value(value.get("order")?)?;
    let item_id = match value.get("itemId") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    Some((order, item_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_wire_format() {
        let cmd = ClientCommand::SubscribeOrder("ord-9".to_string());
        assert_eq!(cmd.event_name(), "subscribe:order");
        assert_eq!(cmd.payload(), json!("ord-9"));
        assert_eq!(
            ClientCommand::UnsubscribeRestaurant("r".into()).event_name(),
            "unsubscribe:restaurant"
        );
    }

    #[test]
    fn test_normalize_order_prefers_envelope() {
        let order = normalize_order(&json!({"data": {"id": "inner"}, "id": "outer"})).unwrap();
        assert_eq!(order.id(), "inner");

        let order = normalize_order(&json!({"id": "bare", "data": "notes"})).unwrap();
        assert_eq!(order.id(), "bare");
    }

    #[test]
    fn test_normalize_order_drops_unknown_shapes() {
        assert!(normalize_order(&json!({"data": {"status": "NEW"}})).is_none());
        assert!(normalize_order(&json!("ord-1")).is_none());
        assert!(normalize_order(&Value::Null).is_none());
    }

    #[test]
    fn test_item_update_shapes() {
        let (order, item) = normalize_item_update(&json!({"order": {"id": "o1"}, "itemId": "i1"})).unwrap();
        assert_eq!((order.id(), item.as_deref()), ("o1", Some("i1")));

        let (order, item) =
            normalize_item_update(&json!({"data": {"order": {"id": "o2"}, "itemId": 7}})).unwrap();
        assert_eq!((order.id(), item.as_deref()), ("o2", Some("7")));

        let (order, item) = normalize_item_update(&json!({"id": "o3", "items": []})).unwrap();
        assert_eq!((order.id(), item), ("o3", None));

        let (order, item) = normalize_item_update(&json!({"data": {"id": "o4"}})).unwrap();
        assert_eq!((order.id(), item), ("o4", None));

        assert!(normalize_item_update(&json!({"data": {"itemId": "i5"}})).is_none());
    }

    #[test]
    fn test_decode_order_event_sets_item_only_for_item_updates() {
        let payload = json!({"order": {"id": "o1"}, "itemId": "i1"});
        let event = decode_order_event(OrderEventKind::ItemUpdated, &payload).unwrap();
        assert_eq!(event.item_id.as_deref(), Some("i1"));

        // For other kinds the `{order, itemId}` shape is not recognized
        assert!(decode_order_event(OrderEventKind::Updated, &payload).is_none());
    }
}
