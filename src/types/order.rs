//! Opaque order snapshots pushed by the server.

use serde_json::Value;

/// Latest server-side state of one order
///
/// The client never interprets or merges snapshots: the JSON object is kept
/// verbatim and handed to listeners as received. The only field read is
/// `id`, which may arrive as a string or a number.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSnapshot {
    id: String,
    raw: Value,
}

impl OrderSnapshot {
    /// Wrap a JSON value if it is an object carrying a usable `id`
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = order_id_of(value)?;
        Some(Self {
            id,
            raw: value.clone(),
        })
    }

    /// Order ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Field of the snapshot, if present
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.raw.get(field)
    }

    /// The snapshot exactly as received
    pub fn as_value(&self) -> &Value {
        &self.raw
    }

    /// Consume the snapshot, returning the raw JSON
    pub fn into_value(self) -> Value {
        self.raw
    }
}

/// Extract a non-empty id from a JSON object
pub(crate) fn order_id_of(value: &Value) -> Option<String> {
    match value.as_object()?.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
