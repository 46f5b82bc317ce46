//! Engine.IO v4 / Socket.IO v5 text packet codec.
//!
//! Every WebSocket text frame is one Engine.IO packet: a single type digit
//! followed by its payload. Engine.IO `message` packets carry a Socket.IO
//! packet:
//!
//! ```text
//! <type>[<attachments>-][<namespace>,][<ack id>][<json>]
//! 42/orders,["order:created",{"id":"1"}]
//! ```
//!
//! Binary attachments are not used by the orders namespace; binary packets
//! are decoded for their header only.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Payload of the Engine.IO `open` packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    /// Engine.IO session ID
    pub sid: String,
    /// Interval between server pings (ms)
    pub ping_interval: u64,
    /// How long to wait for a ping past the interval (ms)
    pub ping_timeout: u64,
    /// Largest accepted payload in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

/// Engine.IO packet
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    /// Session opened (type 0)
    Open(OpenInfo),
    /// Session closed (type 1)
    Close,
    /// Heartbeat from the server (type 2)
    Ping,
    /// Heartbeat reply (type 3)
    Pong,
    /// Socket.IO payload (type 4)
    Message(SocketPacket),
    /// Transport upgrade (type 5)
    Upgrade,
    /// No-op (type 6)
    Noop,
}

impl EnginePacket {
    /// Decode a text frame
    pub fn decode(text: &str) -> Result<Self, Error> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| Error::Protocol("empty engine.io packet".into()))?;
        let body = chars.as_str();

        match kind {
            '0' => Ok(EnginePacket::Open(serde_json::from_str(body)?)),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping),
            '3' => Ok(EnginePacket::Pong),
            '4' => Ok(EnginePacket::Message(SocketPacket::decode(body)?)),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(Error::Protocol(format!("unknown engine.io packet type {:?}", other))),
        }
    }

    /// Encode as a text frame
    pub fn encode(&self) -> String {
        match self {
            // OpenInfo only contains plain fields; serialization cannot fail
            EnginePacket::Open(info) => {
                format!("0{}", serde_json::to_string(info).unwrap_or_default())
            }
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping => "2".to_string(),
            EnginePacket::Pong => "3".to_string(),
            EnginePacket::Message(packet) => format!("4{}", packet.encode()),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

/// Socket.IO packet type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketPacketKind {
    /// Namespace connect request / acknowledgment
    Connect,
    /// Namespace disconnect
    Disconnect,
    /// Named event with arguments
    Event,
    /// Event acknowledgment
    Ack,
    /// Namespace connection refused
    ConnectError,
    /// Event with binary attachments
    BinaryEvent,
    /// Acknowledgment with binary attachments
    BinaryAck,
}

impl SocketPacketKind {
    fn from_digit(c: char) -> Option<Self> {
        Some(match c {
            '0' => SocketPacketKind::Connect,
            '1' => SocketPacketKind::Disconnect,
            '2' => SocketPacketKind::Event,
            '3' => SocketPacketKind::Ack,
            '4' => SocketPacketKind::ConnectError,
            '5' => SocketPacketKind::BinaryEvent,
            '6' => SocketPacketKind::BinaryAck,
            _ => return None,
        })
    }

    fn digit(self) -> char {
        match self {
            SocketPacketKind::Connect => '0',
            SocketPacketKind::Disconnect => '1',
            SocketPacketKind::Event => '2',
            SocketPacketKind::Ack => '3',
            SocketPacketKind::ConnectError => '4',
            SocketPacketKind::BinaryEvent => '5',
            SocketPacketKind::BinaryAck => '6',
        }
    }

    fn is_binary(self) -> bool {
        matches!(self, SocketPacketKind::BinaryEvent | SocketPacketKind::BinaryAck)
    }
}

/// Socket.IO packet
#[derive(Debug, Clone, PartialEq)]
pub struct SocketPacket {
    /// Packet type
    pub kind: SocketPacketKind,
    /// Namespace (`/` when omitted on the wire)
    pub namespace: String,
    /// Acknowledgment ID
    pub ack_id: Option<u64>,
    /// JSON payload
    pub data: Option<Value>,
}

impl SocketPacket {
    /// CONNECT for a namespace with an optional auth payload
    pub fn connect(namespace: &str, auth: Option<Value>) -> Self {
        Self {
            kind: SocketPacketKind::Connect,
            namespace: namespace.to_string(),
            ack_id: None,
            data: auth,
        }
    }

    /// DISCONNECT from a namespace
    pub fn disconnect(namespace: &str) -> Self {
        Self {
            kind: SocketPacketKind::Disconnect,
            namespace: namespace.to_string(),
            ack_id: None,
            data: None,
        }
    }

    /// EVENT with a single argument
    pub fn event(namespace: &str, name: &str, arg: Value) -> Self {
        Self {
            kind: SocketPacketKind::Event,
            namespace: namespace.to_string(),
            ack_id: None,
            data: Some(Value::Array(vec![Value::String(name.to_string()), arg])),
        }
    }

    /// Event name and first argument (`Null` when absent)
    pub fn as_event(&self) -> Option<(&str, &Value)> {
        if !matches!(self.kind, SocketPacketKind::Event | SocketPacketKind::BinaryEvent) {
            return None;
        }
        let args = self.data.as_ref()?.as_array()?;
        let name = args.first()?.as_str()?;
        Some((name, args.get(1).unwrap_or(&Value::Null)))
    }

    /// Human readable reason of a CONNECT_ERROR packet
    pub fn error_message(&self) -> String {
        match &self.data {
            Some(Value::Object(map)) => match map.get("message") {
                Some(Value::String(message)) => message.clone(),
                _ => Value::Object(map.clone()).to_string(),
            },
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
            None => "connection refused".to_string(),
        }
    }

    /// Decode the Socket.IO part of an Engine.IO message
    pub fn decode(text: &str) -> Result<Self, Error> {
        let mut rest = text;
        let kind = rest
            .chars()
            .next()
            .and_then(SocketPacketKind::from_digit)
            .ok_or_else(|| Error::Protocol(format!("invalid socket.io packet: {:?}", text)))?;
        rest = &rest[1..];

        if kind.is_binary() {
            let dash = rest
                .find('-')
                .ok_or_else(|| Error::Protocol("binary packet without attachment count".into()))?;
            rest = &rest[dash + 1..];
        }

        let namespace = if rest.starts_with('/') {
            let end = rest.find(',').unwrap_or(rest.len());
            let namespace = rest[..end].to_string();
            rest = rest.get(end + 1..).unwrap_or("");
            namespace
        } else {
            "/".to_string()
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let ack_id = if digits > 0 {
            let id = rest[..digits]
                .parse()
                .map_err(|_| Error::Protocol("ack id out of range".into()))?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str(rest)?)
        };

        Ok(Self {
            kind,
            namespace,
            ack_id,
            data,
        })
    }

    /// Encode without the Engine.IO prefix
    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.kind.digit());
        if self.kind.is_binary() {
            out.push_str("0-");
        }
        if self.namespace != "/" {
            out.push_str(&self.namespace);
            out.push(',');
        }
        if let Some(id) = self.ack_id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = &self.data {
            out.push_str(&data.to_string());
        }
        out
    }
}
