//! Run-Loop Coalescing Integration Tests
//!
//! Verifies the signal protocol: one pass at a time, signals arriving during
//! an active pass never block the caller, and any number of them collapse
//! into exactly one follow-up pass.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Semaphore;

use order_coordinator::{
    Coordinator, CoordinatorConfig, ExecutionRouter, ManagedOrder, ManagedOrderState, OrderEvent,
    RouterError, RouterId, RouterOrderId, RouterOrderSnapshot, RouterOrderStatus, SimulatedRouter,
    Symbol,
};

/// Router whose market placement blocks until the test releases it, holding
/// the pass that performs the submission open.
struct GatedRouter {
    gate: Semaphore,
    entered: AtomicBool,
}

impl GatedRouter {
    fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            entered: AtomicBool::new(false),
        }
    }

    async fn wait_until_entered(&self) {
        while !self.entered.load(Ordering::Acquire) {
            tokio::task::yield_now().await;
        }
    }

    fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl ExecutionRouter for GatedRouter {
    fn router_id(&self) -> RouterId {
        RouterId::new("gated")
    }

    async fn place_market_order(
        &self,
        _symbol: &Symbol,
        _quantity: i64,
        _tag: &str,
    ) -> Result<RouterOrderId, RouterError> {
        self.entered.store(true, Ordering::Release);
        let _permit = self.gate.acquire().await;
        Ok(RouterOrderId::new(1))
    }

    async fn place_market_on_open_order(
        &self,
        _symbol: &Symbol,
        _quantity: i64,
        _tag: &str,
    ) -> Result<RouterOrderId, RouterError> {
        Ok(RouterOrderId::new(1))
    }

    async fn place_market_on_close_order(
        &self,
        _symbol: &Symbol,
        _quantity: i64,
        _tag: &str,
    ) -> Result<RouterOrderId, RouterError> {
        Ok(RouterOrderId::new(1))
    }

    async fn place_limit_order(
        &self,
        _symbol: &Symbol,
        _quantity: i64,
        _limit_price: Decimal,
        _tag: &str,
    ) -> Result<RouterOrderId, RouterError> {
        Ok(RouterOrderId::new(1))
    }

    async fn place_stop_market_order(
        &self,
        _symbol: &Symbol,
        _quantity: i64,
        _stop_price: Decimal,
        _tag: &str,
    ) -> Result<RouterOrderId, RouterError> {
        Ok(RouterOrderId::new(1))
    }

    async fn place_stop_limit_order(
        &self,
        _symbol: &Symbol,
        _quantity: i64,
        _stop_price: Decimal,
        _limit_price: Decimal,
        _tag: &str,
    ) -> Result<RouterOrderId, RouterError> {
        Ok(RouterOrderId::new(1))
    }

    async fn cancel_order(&self, _router_order_id: RouterOrderId) -> Result<(), RouterError> {
        Ok(())
    }

    async fn order_snapshot(&self, _router_order_id: RouterOrderId) -> Option<RouterOrderSnapshot> {
        None
    }
}

fn coordinator() -> Coordinator {
    Coordinator::new(CoordinatorConfig {
        timer_interval: Duration::from_secs(3600),
    })
}

#[tokio::test]
async fn signals_during_an_active_pass_coalesce_into_one_follow_up() {
    let coordinator = coordinator();
    let router = Arc::new(GatedRouter::new());

    // Start a pass that blocks inside the router placement.
    let order = ManagedOrder::market(router.clone(), Symbol::new("SPY"), 10);
    let submitting = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.submit(vec![order]).await }
    });
    router.wait_until_entered().await;
    assert_eq!(coordinator.passes_run(), 1);

    // Fifty events arrive mid-pass. None block; each raises the pending
    // signal counter.
    for i in 0..50 {
        coordinator
            .on_order_event(
                OrderEvent::status(RouterOrderId::new(100 + i), RouterOrderStatus::Submitted),
                router.router_id(),
            )
            .await;
    }
    assert_eq!(coordinator.events_processed(), 0);

    // Release the blocked placement: the pass holder observes the pending
    // signals and runs exactly one follow-up pass draining all fifty.
    router.release();
    submitting.await.unwrap();

    assert_eq!(coordinator.passes_run(), 2);
    assert_eq!(coordinator.events_processed(), 50);
}

#[tokio::test]
async fn each_idle_signal_runs_its_own_pass() {
    let coordinator = coordinator();
    let router = Arc::new(SimulatedRouter::new("sim"));

    for i in 0..5 {
        coordinator
            .on_order_event(
                OrderEvent::status(RouterOrderId::new(i), RouterOrderStatus::Submitted),
                router.id(),
            )
            .await;
    }

    assert_eq!(coordinator.passes_run(), 5);
    assert_eq!(coordinator.events_processed(), 5);
}

#[tokio::test]
async fn repeated_cancel_issues_one_live_cancel() {
    let coordinator = coordinator();
    let router = Arc::new(SimulatedRouter::new("sim"));

    let order = ManagedOrder::market(router.clone(), Symbol::new("SPY"), 10);
    let id = order.id().clone();
    coordinator.submit(vec![order]).await;

    coordinator.cancel(id.clone()).await;
    coordinator.cancel(id.clone()).await;
    coordinator.cancel(id.clone()).await;

    // The first cancel goes live; afterwards the router-side status is
    // already Canceled, so later requests are no-ops.
    assert_eq!(router.canceled().len(), 1);
    let snapshot = coordinator.order_snapshot(&id).await.unwrap();
    assert_eq!(snapshot.state, ManagedOrderState::Submitted);
    assert!(coordinator.error_messages().is_empty());
}
