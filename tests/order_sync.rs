//! Integration tests for per-view bindings over a shared connection manager.

mod common;

use std::sync::Arc;

use parking_lot::Mutex;
use restaurant_order_sync::client::TransportEvent;
use restaurant_order_sync::sync::{OrderCallbacks, OrderSync, OrderSyncOptions, SharedSession};
use restaurant_order_sync::types::{EventKind, OrderSnapshot};
use restaurant_order_sync::ConnectionManager;
use serde_json::json;

use common::{eventually, manager, sub_order, sub_restaurant, MockTransport};

type Seen = Arc<Mutex<Vec<(String, Option<String>)>>>;

fn signed_in() -> Arc<SharedSession> {
    Arc::new(SharedSession::with_token("token"))
}

fn binding(manager: &ConnectionManager, callbacks: OrderCallbacks) -> OrderSync {
    OrderSync::new(manager.clone(), signed_in(), callbacks)
}

fn collector() -> (Seen, impl Fn(&OrderSnapshot, Option<&str>) + Send + Sync + 'static) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback = move |order: &OrderSnapshot, item: Option<&str>| {
        sink.lock()
            .push((order.id().to_string(), item.map(str::to_owned)));
    };
    (seen, callback)
}

#[tokio::test]
async fn test_bind_connects_and_subscribes_order() {
    common::init_tracing();
    let transport = MockTransport::auto_connect();
    let manager = manager(&transport);
    let mut sync = binding(&manager, OrderCallbacks::new());

    sync.bind(OrderSyncOptions::new("r-1").with_order("o-1")).await;

    assert!(sync.is_connected());
    assert_eq!(sync.connection_error(), None);
    assert_eq!(transport.token(0).as_deref(), Some("token"));
    assert_eq!(
        transport.commands(0),
        vec![sub_restaurant("r-1"), sub_order("o-1")]
    );
    assert_eq!(manager.subscribed_order_ids(), vec!["o-1"]);
}

#[tokio::test]
async fn test_callbacks_receive_normalized_events() {
    let transport = MockTransport::auto_connect();
    let manager = manager(&transport);
    let (created, on_created) = collector();
    let (items, on_item) = collector();
    let mut sync = binding(
        &manager,
        OrderCallbacks::new()
            .on_created(on_created)
            .on_item_updated(on_item),
    );
    sync.bind(OrderSyncOptions::new("r-1")).await;

    transport.push(0, "order:created", json!({"data": {"id": "o-1"}}));
    transport.push(0, "order:item-updated", json!({"order": {"id": "o-1"}, "itemId": 12}));
    transport.push(0, "order:modified", json!({"id": "o-1"}));

    eventually(|| items.lock().len() == 1).await;
    assert_eq!(*created.lock(), vec![("o-1".to_string(), None)]);
    assert_eq!(
        *items.lock(),
        vec![("o-1".to_string(), Some("12".to_string()))]
    );
}

#[tokio::test]
async fn test_rebinding_same_options_does_nothing() {
    let transport = MockTransport::auto_connect();
    let manager = manager(&transport);
    let mut sync = binding(&manager, OrderCallbacks::new());

    sync.bind(OrderSyncOptions::new("r-1").with_order("o-1")).await;
    let listeners = manager.total_listener_count();
    sync.bind(OrderSyncOptions::new("r-1").with_order("o-1")).await;

    assert_eq!(listeners, 9);
    assert_eq!(manager.total_listener_count(), listeners);
    assert_eq!(transport.open_count(), 1);
    assert_eq!(transport.commands(0).len(), 2);
}

#[tokio::test]
async fn test_repeated_mounts_leave_no_dangling_listeners() {
    let transport = MockTransport::auto_connect();
    let manager = manager(&transport);

    for n in 0..5 {
        let mut sync = binding(&manager, OrderCallbacks::new());
        sync.bind(OrderSyncOptions::new("r-1").with_order(format!("o-{}", n))).await;
        assert!(sync.is_connected());
        assert_eq!(manager.total_listener_count(), 9);
        drop(sync);
        assert_eq!(manager.total_listener_count(), 0);
    }

    for kind in EventKind::ALL {
        assert_eq!(manager.listener_count(kind), 0);
    }
    // The shared connection outlives every view
    assert!(manager.connected());
    assert_eq!(transport.open_count(), 1);
}

#[tokio::test]
async fn test_second_view_reuses_connection_and_subscribes_its_order() {
    let transport = MockTransport::auto_connect();
    let manager = manager(&transport);
    let mut list = binding(&manager, OrderCallbacks::new());
    let mut detail = binding(&manager, OrderCallbacks::new());

    list.bind(OrderSyncOptions::new("r-1")).await;
    detail.bind(OrderSyncOptions::new("r-1").with_order("o-7")).await;

    assert!(detail.is_connected());
    assert_eq!(transport.open_count(), 1);
    assert_eq!(
        transport.commands(0),
        vec![sub_restaurant("r-1"), sub_order("o-7")]
    );
    assert_eq!(manager.total_listener_count(), 18);

    list.unbind();
    assert_eq!(manager.total_listener_count(), 9);
}

#[tokio::test]
async fn test_changing_order_while_connected_subscribes_new_order() {
    let transport = MockTransport::auto_connect();
    let manager = manager(&transport);
    let mut sync = binding(&manager, OrderCallbacks::new());

    sync.bind(OrderSyncOptions::new("r-1").with_order("o-1")).await;
    sync.bind(OrderSyncOptions::new("r-1").with_order("o-2")).await;

    assert_eq!(transport.open_count(), 1);
    assert_eq!(
        transport.commands(0),
        vec![sub_restaurant("r-1"), sub_order("o-1"), sub_order("o-2")]
    );
    assert_eq!(manager.total_listener_count(), 9);
}

#[tokio::test]
async fn test_inactive_bindings_never_connect() {
    let transport = MockTransport::auto_connect();
    let manager = manager(&transport);

    let mut disabled = binding(&manager, OrderCallbacks::new());
    disabled.bind(OrderSyncOptions::new("r-1").enabled(false)).await;

    let mut no_restaurant = binding(&manager, OrderCallbacks::new());
    no_restaurant.bind(OrderSyncOptions::default()).await;

    let mut signed_out = OrderSync::new(
        manager.clone(),
        Arc::new(SharedSession::new()),
        OrderCallbacks::new(),
    );
    signed_out.bind(OrderSyncOptions::new("r-1")).await;

    assert_eq!(transport.open_count(), 0);
    assert!(!disabled.is_connected());
    assert!(!no_restaurant.is_connected());
    assert!(!signed_out.is_connected());
    assert_eq!(manager.total_listener_count(), 0);
}

#[tokio::test]
async fn test_swapping_callbacks_keeps_binding() {
    let transport = MockTransport::auto_connect();
    let manager = manager(&transport);
    let (first, on_first) = collector();
    let (second, on_second) = collector();
    let mut sync = binding(&manager, OrderCallbacks::new().on_updated(on_first));
    sync.bind(OrderSyncOptions::new("r-1")).await;

    sync.set_callbacks(OrderCallbacks::new().on_updated(on_second));
    transport.push(0, "order:updated", json!({"id": "o-1"}));

    eventually(|| second.lock().len() == 1).await;
    assert!(first.lock().is_empty());
    assert_eq!(transport.open_count(), 1);
    assert_eq!(manager.total_listener_count(), 9);
}

#[tokio::test]
async fn test_connection_error_reported_once() {
    let transport = MockTransport::new();
    let manager = manager(&transport);
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    let mut sync = binding(
        &manager,
        OrderCallbacks::new().on_error(move |message| sink.lock().push(message.to_string())),
    );

    let ((), ()) = tokio::join!(sync.bind(OrderSyncOptions::new("r-1")), async {
        eventually(|| transport.open_count() == 1).await;
        transport.emit(0, TransportEvent::ConnectError("Authentication error".into()));
    });

    assert!(!sync.is_connected());
    assert!(sync
        .connection_error()
        .is_some_and(|message| message.contains("Authentication error")));
    assert_eq!(*errors.lock(), vec!["Authentication error".to_string()]);
}

#[tokio::test]
async fn test_status_follows_transport_drops() {
    let transport = MockTransport::auto_connect();
    let manager = manager(&transport);
    let mut sync = binding(&manager, OrderCallbacks::new());
    sync.bind(OrderSyncOptions::new("r-1").with_order("o-1")).await;

    transport.emit(0, TransportEvent::Disconnected { reason: "transport close".into() });
    eventually(|| !sync.is_connected()).await;

    transport.emit(0, TransportEvent::Connected);
    eventually(|| sync.is_connected()).await;

    // Replayed by the manager and re-sent by the binding's connected listener
    assert_eq!(
        transport.commands(0),
        vec![
            sub_restaurant("r-1"),
            sub_order("o-1"),
            sub_restaurant("r-1"),
            sub_order("o-1"),
            sub_order("o-1"),
        ]
    );
}

#[tokio::test]
async fn test_disconnect_action_tears_down_shared_connection() {
    let transport = MockTransport::auto_connect();
    let manager = manager(&transport);
    let mut sync = binding(&manager, OrderCallbacks::new());
    sync.bind(OrderSyncOptions::new("r-1").with_order("o-1")).await;

    sync.disconnect();

    assert!(!sync.is_connected());
    assert!(!manager.connected());
    assert!(manager.subscribed_order_ids().is_empty());
    // Listeners stay until the view goes away
    assert_eq!(manager.total_listener_count(), 9);
    drop(sync);
    assert_eq!(manager.total_listener_count(), 0);
}
