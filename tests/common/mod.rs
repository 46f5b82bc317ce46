//! Shared helpers for integration tests: an in-memory transport and polling utilities.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use restaurant_order_sync::client::{
    OpenRequest, Outbound, Transport, TransportEnd, TransportEvent, TransportHandle,
};
use restaurant_order_sync::types::ClientCommand;
use restaurant_order_sync::{Config, ConnectionManager};

/// One connection opened through [`MockTransport`]
struct MockConnection {
    token: Option<String>,
    end: TransportEnd,
    log: Vec<Outbound>,
}

#[derive(Default)]
struct MockState {
    connections: Vec<MockConnection>,
    auto_connect: bool,
}

/// Transport whose connections are driven by the test
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Connections wait for the test to emit `Connected`
    pub fn new() -> Self {
        Self::default()
    }

    /// Connections report `Connected` as soon as they are opened
    pub fn auto_connect() -> Self {
        let transport = Self::default();
        transport.set_auto_connect(true);
        transport
    }

    pub fn set_auto_connect(&self, enabled: bool) {
        self.state.lock().auto_connect = enabled;
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().connections.len()
    }

    pub fn token(&self, index: usize) -> Option<String> {
        self.state.lock().connections[index].token.clone()
    }

    /// Push an event from connection `index` to the manager
    pub fn emit(&self, index: usize, event: TransportEvent) -> bool {
        self.state.lock().connections[index].end.emit(event)
    }

    /// Push a server event with a JSON payload
    pub fn push(&self, index: usize, event: &str, payload: serde_json::Value) -> bool {
        self.emit(
            index,
            TransportEvent::Message {
                event: event.to_string(),
                payload,
            },
        )
    }

    /// Every frame the manager sent on connection `index` so far
    pub fn sent(&self, index: usize) -> Vec<Outbound> {
        let mut state = self.state.lock();
        let connection = &mut state.connections[index];
        while let Ok(frame) = connection.end.outbound.try_recv() {
            connection.log.push(frame);
        }
        connection.log.clone()
    }

    /// Commands (without `Close`) sent on connection `index`
    pub fn commands(&self, index: usize) -> Vec<ClientCommand> {
        self.sent(index)
            .into_iter()
            .filter_map(|frame| match frame {
                Outbound::Emit(command) => Some(command),
                Outbound::Close => None,
            })
            .collect()
    }
}

impl Transport for MockTransport {
    fn open(&self, request: OpenRequest) -> TransportHandle {
        let (handle, end) = TransportHandle::pair();
        let mut state = self.state.lock();
        if state.auto_connect {
            end.emit(TransportEvent::Connected);
        }
        state.connections.push(MockConnection {
            token: request.token,
            end,
            log: Vec::new(),
        });
        handle
    }
}

/// Manager over a mock transport with a short handshake timeout
pub fn manager(transport: &MockTransport) -> ConnectionManager {
    let config = Config::default().with_handshake_timeout(Duration::from_millis(300));
    ConnectionManager::new(config, transport.clone())
}

/// Poll `condition` until it holds or two seconds pass
pub async fn eventually<F: Fn() -> bool>(condition: F) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met within 2s");
}

pub fn sub_restaurant(id: &str) -> ClientCommand {
    ClientCommand::SubscribeRestaurant(id.to_string())
}

pub fn sub_order(id: &str) -> ClientCommand {
    ClientCommand::SubscribeOrder(id.to_string())
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
