//! Socket.IO transport over `tokio-tungstenite`.
//!
//! Speaks Engine.IO v4 over a plain WebSocket (no long-polling upgrade):
//!
//! 1. Open `ws(s)://host/socket.io/?EIO=4&transport=websocket`
//! 2. Wait for the Engine.IO `open` packet (session id, heartbeat timings)
//! 3. Send `CONNECT` to the orders namespace with `{"token": ...}` as auth
//! 4. Wait for the namespace `CONNECT` acknowledgment or `CONNECT_ERROR`
//!
//! Once connected the session answers server pings, forwards namespace
//! events, and treats a missing ping within `pingInterval + pingTimeout`
//! as a dropped connection. Drops are retried according to the
//! [`ReconnectPolicy`](crate::client::ReconnectPolicy); a refused handshake
//! or a server-side namespace disconnect is final.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::client::transport::{
    OpenRequest, Outbound, Transport, TransportEnd, TransportEvent, TransportHandle,
};
use crate::config::Config;
use crate::error::Error;
use crate::types::packet::{EnginePacket, OpenInfo, SocketPacket, SocketPacketKind};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Reason reported when the server closes the namespace
pub const SERVER_DISCONNECT_REASON: &str = "io server disconnect";

/// Production transport connecting to a Socket.IO server
#[derive(Debug, Clone)]
pub struct SocketIoTransport {
    config: Config,
}

impl SocketIoTransport {
    /// Create a transport for the configured server and namespace
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl Transport for SocketIoTransport {
    fn open(&self, request: OpenRequest) -> TransportHandle {
        let (handle, end) = TransportHandle::pair();
        tokio::spawn(run(self.config.clone(), request, end));
        handle
    }
}

/// How a connected session ended
#[derive(Debug)]
enum SessionEnd {
    /// The manager closed the handle
    Shutdown,
    /// Server sent a namespace DISCONNECT
    ServerDisconnect,
    /// Server sent CONNECT_ERROR on an established session
    Rejected(String),
    /// Network-level drop; eligible for reconnection
    Dropped(String),
}

/// One Engine.IO session joined to the orders namespace
struct Session {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
    namespace: String,
    heartbeat: Duration,
}

impl Session {
    /// Connect the WebSocket and complete the namespace handshake
    async fn establish(config: &Config, token: Option<&str>) -> Result<Self, Error> {
        let url = config.socket_url()?;
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();
        let namespace = config.namespace().to_string();

        let open = loop {
            match next_packet(&mut read).await? {
                EnginePacket::Open(info) => break info,
                other => tracing::debug!(packet = ?other, "ignoring packet before open"),
            }
        };
        tracing::debug!(sid = %open.sid, ping_interval = open.ping_interval, "engine.io session opened");

        let auth = token.map(|token| json!({ "token": token }));
        let connect = EnginePacket::Message(SocketPacket::connect(&namespace, auth));
        write.send(Message::Text(connect.encode())).await?;

        loop {
            match next_packet(&mut read).await? {
                EnginePacket::Message(packet) if packet.namespace == namespace => match packet.kind {
                    SocketPacketKind::Connect => break,
                    SocketPacketKind::ConnectError => {
                        return Err(Error::ConnectFailed(packet.error_message()));
                    }
                    _ => tracing::debug!(kind = ?packet.kind, "ignoring packet before namespace ack"),
                },
                EnginePacket::Ping => write.send(Message::Text(EnginePacket::Pong.encode())).await?,
                EnginePacket::Close => return Err(Error::ConnectionClosed),
                other => tracing::debug!(packet = ?other, "ignoring packet before namespace ack"),
            }
        }

        Ok(Self {
            write,
            read,
            namespace,
            heartbeat: heartbeat(&open),
        })
    }

    async fn send(&mut self, packet: EnginePacket) -> Result<(), Error> {
        self.write.send(Message::Text(packet.encode())).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let disconnect = EnginePacket::Message(SocketPacket::disconnect(&self.namespace));
        if let Err(e) = self.send(disconnect).await {
            tracing::debug!(error = %e, "failed to send namespace disconnect");
        }
        let _ = self.write.close().await;
    }

    /// Pump frames in both directions until the session ends
    async fn run(mut self, end: &mut TransportEnd) -> SessionEnd {
        let idle = tokio::time::sleep(self.heartbeat);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                frame = self.read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        idle.as_mut().reset(Instant::now() + self.heartbeat);
                        match EnginePacket::decode(&text) {
                            Ok(packet) => {
                                if let Some(done) = self.on_packet(packet, end).await {
                                    return done;
                                }
                            }
                            Err(e) => tracing::warn!(error = %e, "dropping malformed packet"),
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if self.write.send(Message::Pong(data)).await.is_err() {
                            return SessionEnd::Dropped("transport error".into());
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return SessionEnd::Dropped("transport close".into());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        end.emit(TransportEvent::Error(e.to_string()));
                        return SessionEnd::Dropped("transport error".into());
                    }
                },
                command = end.outbound.recv() => match command {
                    Some(Outbound::Emit(command)) => {
                        let packet = SocketPacket::event(&self.namespace, command.event_name(), command.payload());
                        if let Err(e) = self.send(EnginePacket::Message(packet)).await {
                            end.emit(TransportEvent::Error(e.to_string()));
                            return SessionEnd::Dropped("transport error".into());
                        }
                    }
                    Some(Outbound::Close) | None => {
                        self.close().await;
                        return SessionEnd::Shutdown;
                    }
                },
                () = &mut idle => return SessionEnd::Dropped("ping timeout".into()),
            }
        }
    }

    async fn on_packet(&mut self, packet: EnginePacket, end: &TransportEnd) -> Option<SessionEnd> {
        match packet {
            EnginePacket::Ping => {
                if self.send(EnginePacket::Pong).await.is_err() {
                    return Some(SessionEnd::Dropped("transport error".into()));
                }
                None
            }
            EnginePacket::Close => Some(SessionEnd::Dropped("transport close".into())),
            EnginePacket::Message(packet) if packet.namespace == self.namespace => match packet.kind {
                SocketPacketKind::Event | SocketPacketKind::BinaryEvent => {
                    match packet.as_event() {
                        Some((event, payload)) => {
                            end.emit(TransportEvent::Message {
                                event: event.to_string(),
                                payload: payload.clone(),
                            });
                        }
                        None => tracing::warn!(data = ?packet.data, "dropping event without a name"),
                    }
                    None
                }
                SocketPacketKind::Disconnect => Some(SessionEnd::ServerDisconnect),
                SocketPacketKind::ConnectError => Some(SessionEnd::Rejected(packet.error_message())),
                _ => None,
            },
            other => {
                tracing::debug!(packet = ?other, "ignoring packet");
                None
            }
        }
    }
}

/// Upper bound on the idle window; keeps deadline arithmetic in range
const MAX_HEARTBEAT: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest silence tolerated before the server counts as gone
fn heartbeat(open: &OpenInfo) -> Duration {
    Duration::from_millis(open.ping_interval.saturating_add(open.ping_timeout)).min(MAX_HEARTBEAT)
}

/// Next Engine.IO packet, skipping non-text frames
async fn next_packet(read: &mut SplitStream<WsStream>) -> Result<EnginePacket, Error> {
    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => return EnginePacket::decode(&text),
            Some(Ok(Message::Close(_))) | None => return Err(Error::ConnectionClosed),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

/// Resolves once the manager closes the handle; drops commands meanwhile
async fn closed(outbound: &mut mpsc::UnboundedReceiver<Outbound>) {
    while let Some(frame) = outbound.recv().await {
        match frame {
            Outbound::Close => return,
            Outbound::Emit(command) => {
                tracing::debug!(event = command.event_name(), "not connected, command dropped");
            }
        }
    }
}

/// Connect, run sessions and reconnect until closed or out of attempts
async fn run(config: Config, request: OpenRequest, mut end: TransportEnd) {
    let policy = request.reconnect;
    let handshake_timeout = config.handshake_timeout();
    let mut attempts: u32 = 0;

    loop {
        let established = tokio::select! {
            result = tokio::time::timeout(
                handshake_timeout,
                Session::establish(&config, request.token.as_deref()),
            ) => result.unwrap_or(Err(Error::HandshakeTimeout(handshake_timeout))),
            () = closed(&mut end.outbound) => return,
        };

        match established {
            Ok(session) => {
                attempts = 0;
                if !end.emit(TransportEvent::Connected) {
                    return;
                }
                match session.run(&mut end).await {
                    SessionEnd::Shutdown => return,
                    SessionEnd::ServerDisconnect => {
                        end.emit(TransportEvent::Disconnected {
                            reason: SERVER_DISCONNECT_REASON.to_string(),
                        });
                        end.emit(TransportEvent::Closed);
                        return;
                    }
                    SessionEnd::Rejected(message) => {
                        end.emit(TransportEvent::Disconnected {
                            reason: SERVER_DISCONNECT_REASON.to_string(),
                        });
                        end.emit(TransportEvent::ConnectError(message));
                        end.emit(TransportEvent::Closed);
                        return;
                    }
                    SessionEnd::Dropped(reason) => {
                        end.emit(TransportEvent::Disconnected { reason });
                    }
                }
            }
            Err(Error::ConnectFailed(message)) => {
                tracing::warn!(error = %message, "namespace handshake refused");
                end.emit(TransportEvent::ConnectError(message));
                end.emit(TransportEvent::Closed);
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, attempts, "connection attempt failed");
                end.emit(TransportEvent::ConnectError(e.to_string()));
            }
        }

        if !policy.allows_attempt(attempts) {
            tracing::warn!(attempts, "reconnection attempts exhausted");
            end.emit(TransportEvent::Closed);
            return;
        }
        let delay = policy.jittered_delay(attempts, &mut rand::thread_rng());
        attempts += 1;
        end.emit(TransportEvent::ReconnectAttempt(attempts));
        tracing::debug!(attempt = attempts, delay_ms = delay.as_millis() as u64, "reconnecting");

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = closed(&mut end.outbound) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(ping_interval: u64, ping_timeout: u64) -> OpenInfo {
        OpenInfo {
            sid: "s1".to_string(),
            ping_interval,
            ping_timeout,
            max_payload: None,
        }
    }

    #[test]
    fn test_heartbeat_window() {
        assert_eq!(heartbeat(&open(25_000, 20_000)), Duration::from_millis(45_000));
    }

    #[test]
    fn test_heartbeat_saturates_on_huge_server_timings() {
        assert_eq!(heartbeat(&open(u64::MAX, 20_000)), MAX_HEARTBEAT);
        assert_eq!(heartbeat(&open(u64::MAX, u64::MAX)), MAX_HEARTBEAT);
        // Still usable as a deadline offset
        assert!(Instant::now().checked_add(heartbeat(&open(u64::MAX, u64::MAX))).is_some());
    }
}
