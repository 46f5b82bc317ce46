//! Live order feed - prints order events for one restaurant
//!
//! Usage:
//!   ORDER_SYNC_TOKEN=xxx ORDER_SYNC_RESTAURANT=restaurant-1 cargo run --example live_orders
//!
//! Optional:
//!   ORDER_SYNC_URL=https://api.example.com  # Server (default: http://localhost:3000)
//!   ORDER_SYNC_ORDER=order-42               # Also follow a single order

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use restaurant_order_sync::client::ConnectionManager;
use restaurant_order_sync::sync::{OrderCallbacks, OrderSync, OrderSyncOptions, SharedSession};
use restaurant_order_sync::types::OrderSnapshot;

fn describe(tag: &str, order: &OrderSnapshot, item_id: Option<&str>) {
    let status = order
        .get("status")
        .and_then(|s| s.as_str())
        .unwrap_or("-");
    match item_id {
        Some(item_id) => println!("[{}] {} | status: {} | item: {}", tag, order.id(), status, item_id),
        None => println!("[{}] {} | status: {}", tag, order.id(), status),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("restaurant_order_sync=info".parse()?),
        )
        .init();

    let token = std::env::var("ORDER_SYNC_TOKEN").map_err(|_| "Set ORDER_SYNC_TOKEN environment variable")?;
    let restaurant_id = std::env::var("ORDER_SYNC_RESTAURANT")
        .map_err(|_| "Set ORDER_SYNC_RESTAURANT environment variable")?;
    let order_id = std::env::var("ORDER_SYNC_ORDER").ok();

    println!("=== Live Order Feed ===\n");

    let manager = ConnectionManager::global().clone();
    println!("Server: {}", manager.config().server_url());
    println!("Namespace: {}\n", manager.config().namespace());

    let count = Arc::new(AtomicU64::new(0));
    let counter = count.clone();
    let callbacks = OrderCallbacks::new()
        .on_created(move |order, item| {
            counter.fetch_add(1, Ordering::Relaxed);
            describe("CREATED", order, item);
        })
        .on_updated(|order, item| describe("UPDATED", order, item))
        .on_status_updated(|order, item| describe("STATUS", order, item))
        .on_item_updated(|order, item| describe("ITEM", order, item))
        .on_modified(|order, item| describe("MODIFIED", order, item))
        .on_details_updated(|order, item| describe("DETAILS", order, item))
        .on_error(|message| println!("[ERROR] {}", message));

    let session = Arc::new(SharedSession::with_token(token));
    let mut sync = OrderSync::new(manager.clone(), session, callbacks);

    let mut options = OrderSyncOptions::new(restaurant_id.clone());
    if let Some(order_id) = order_id {
        options = options.with_order(order_id);
    }
    sync.bind(options).await;

    if let Some(error) = sync.connection_error() {
        println!("Could not connect: {}", error);
        return Ok(());
    }
    println!("Connected to restaurant {}", restaurant_id);
    println!("(Press Ctrl+C to stop)\n");

    tokio::signal::ctrl_c().await?;

    println!(
        "\n{} new orders seen, {} reconnect attempts pending",
        count.load(Ordering::Relaxed),
        manager.reconnect_attempts()
    );
    drop(sync);
    manager.disconnect();
    println!("Disconnected");
    Ok(())
}
