//! Order Coordinator Demo Binary
//!
//! Runs one bracket trade end to end against the in-process simulated
//! router: a limit entry with an attached stop-loss and an attached
//! take-profit, the two exits joined in one OCA group. Router status updates
//! are scripted and fed through the coordinator the same way a live host
//! would forward them.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin order-coordinator
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use order_coordinator::{
    Coordinator, CoordinatorConfig, ManagedOrder, OcaGroupId, OrderEvent, RouterOrderStatus,
    SimulatedRouter, Symbol,
};
use rust_decimal::Decimal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Starting order coordinator demo");

    let router = Arc::new(SimulatedRouter::new("sim"));
    let coordinator = Coordinator::new(CoordinatorConfig {
        timer_interval: Duration::from_millis(100),
    });
    let timer = coordinator.spawn_timer();

    let bracket = build_bracket(&router);
    let entry_id = bracket[0].id().clone();
    coordinator.submit(bracket).await;

    // Entry is accepted; exits stay local until the entry fills.
    let entry = coordinator
        .order_snapshot(&entry_id)
        .await
        .ok_or_else(|| anyhow::anyhow!("entry order not registered"))?;
    let entry_router_id = entry
        .router_order_id
        .ok_or_else(|| anyhow::anyhow!("entry order was not submitted"))?;
    tracing::info!(state = %entry.state, "entry order placed");

    // Venue confirms, then fills the entry. The fill releases both exits.
    router.set_status(entry_router_id, RouterOrderStatus::Submitted);
    coordinator
        .on_order_event(
            OrderEvent::status(entry_router_id, RouterOrderStatus::Submitted),
            router.id(),
        )
        .await;
    router.set_status(entry_router_id, RouterOrderStatus::Filled);
    coordinator
        .on_order_event(
            OrderEvent::fill(entry_router_id, 100, Decimal::new(14998, 2)),
            router.id(),
        )
        .await;

    log_orders(&coordinator, "after entry fill").await;

    // The take-profit fills; the OCA group cancels the stop-loss.
    let take_profit_router_id = router
        .placed()
        .iter()
        .find(|p| p.tag == "take-profit")
        .map(|p| p.router_order_id)
        .ok_or_else(|| anyhow::anyhow!("take-profit was not released"))?;
    router.set_status(take_profit_router_id, RouterOrderStatus::Filled);
    coordinator
        .on_order_event(
            OrderEvent::fill(take_profit_router_id, -100, Decimal::new(15500, 2)),
            router.id(),
        )
        .await;

    // Forward the venue's confirmation for every cancel the OCA settlement
    // issued.
    for canceled_id in router.canceled() {
        coordinator
            .on_order_event(
                OrderEvent::status(canceled_id, RouterOrderStatus::Canceled),
                router.id(),
            )
            .await;
    }

    log_orders(&coordinator, "after take-profit fill").await;

    for message in coordinator.error_messages() {
        tracing::warn!(%message, "recorded error");
    }

    timer.abort();
    tracing::info!(
        passes = coordinator.passes_run(),
        events = coordinator.events_processed(),
        "demo complete"
    );
    Ok(())
}

/// Initialize the tracing subscriber with environment filter.
///
/// Uses a static directive string that is a compile-time constant guaranteed
/// to parse.
#[allow(clippy::expect_used)]
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "order_coordinator=info"
                    .parse()
                    .expect("static directive 'order_coordinator=info' is valid"),
            ),
        )
        .init();
}

/// Build the three legs of a long bracket: limit entry, stop-loss and
/// take-profit attached to it, exits in one OCA group.
fn build_bracket(router: &Arc<SimulatedRouter>) -> Vec<ManagedOrder> {
    let symbol = Symbol::new("SPY");
    let oca = OcaGroupId::generate();

    let entry = ManagedOrder::limit(router.clone(), symbol.clone(), 100, Decimal::new(15000, 2))
        .with_tag("entry");
    let mut stop_loss =
        ManagedOrder::stop_market(router.clone(), symbol.clone(), -100, Decimal::new(14500, 2))
            .with_tag("stop-loss");
    stop_loss.attach_to(entry.id().clone());
    stop_loss.join_oca_group(oca.clone());
    let mut take_profit =
        ManagedOrder::limit(router.clone(), symbol, -100, Decimal::new(15500, 2))
            .with_tag("take-profit");
    take_profit.attach_to(entry.id().clone());
    take_profit.join_oca_group(oca);

    vec![entry, stop_loss, take_profit]
}

/// Log the state of every registered order.
async fn log_orders(coordinator: &Coordinator, label: &str) {
    for order in coordinator.orders().await {
        tracing::info!(
            tag = %order.tag,
            state = %order.state,
            router_order_id = ?order.router_order_id,
            "{label}"
        );
    }
}
