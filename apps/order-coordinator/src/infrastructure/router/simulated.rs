//! In-process simulated execution router.
//!
//! Accepts every placement with a monotonically increasing router order id
//! and records what it was asked to do. Tests and the demo binary drive
//! status changes explicitly with [`SimulatedRouter::set_status`] and feed
//! the corresponding events to the coordinator themselves; the router never
//! emits events on its own.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;

use crate::application::ports::{ExecutionRouter, RouterError};
use crate::domain::managed_order::events::RouterOrderSnapshot;
use crate::domain::managed_order::{OrderType, RouterOrderStatus};
use crate::domain::shared::{RouterId, RouterOrderId, Symbol};

/// Record of one accepted placement.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    /// Assigned router order id.
    pub router_order_id: RouterOrderId,
    /// Instrument.
    pub symbol: Symbol,
    /// Signed quantity.
    pub quantity: i64,
    /// Requested order type.
    pub order_type: OrderType,
    /// Limit price, for limit and stop-limit placements.
    pub limit_price: Option<Decimal>,
    /// Stop price, for stop placements.
    pub stop_price: Option<Decimal>,
    /// Free-form tag.
    pub tag: String,
}

/// Simulated router adapter.
pub struct SimulatedRouter {
    id: RouterId,
    next_id: AtomicI64,
    placed: Mutex<Vec<PlacedOrder>>,
    canceled: Mutex<Vec<RouterOrderId>>,
    snapshots: Mutex<HashMap<RouterOrderId, RouterOrderStatus>>,
    fail_next_place: Mutex<Option<String>>,
    fail_cancel: Mutex<Option<String>>,
}

impl SimulatedRouter {
    /// Create a router with the given id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: RouterId::new(id),
            next_id: AtomicI64::new(1),
            placed: Mutex::new(Vec::new()),
            canceled: Mutex::new(Vec::new()),
            snapshots: Mutex::new(HashMap::new()),
            fail_next_place: Mutex::new(None),
            fail_cancel: Mutex::new(None),
        }
    }

    /// This router's id.
    #[must_use]
    pub fn id(&self) -> RouterId {
        self.id.clone()
    }

    /// Make the next placement fail with a rejection.
    pub fn fail_next_place(&self, message: impl Into<String>) {
        if let Ok(mut slot) = self.fail_next_place.lock() {
            *slot = Some(message.into());
        }
    }

    /// Make every cancel request fail until cleared with `None`.
    pub fn fail_cancel(&self, message: Option<String>) {
        if let Ok(mut slot) = self.fail_cancel.lock() {
            *slot = message;
        }
    }

    /// Overwrite the router-side status for an order, as a venue update
    /// would.
    pub fn set_status(&self, router_order_id: RouterOrderId, status: RouterOrderStatus) {
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.insert(router_order_id, status);
        }
    }

    /// All placements accepted so far, in order.
    #[must_use]
    pub fn placed(&self) -> Vec<PlacedOrder> {
        self.placed.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// All cancel requests received so far, in order.
    #[must_use]
    pub fn canceled(&self) -> Vec<RouterOrderId> {
        self.canceled.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn accept(
        &self,
        symbol: &Symbol,
        quantity: i64,
        order_type: OrderType,
        limit_price: Option<Decimal>,
        stop_price: Option<Decimal>,
        tag: &str,
    ) -> Result<RouterOrderId, RouterError> {
        if let Ok(mut slot) = self.fail_next_place.lock() {
            if let Some(message) = slot.take() {
                return Err(RouterError::Rejected { message });
            }
        }
        let router_order_id = RouterOrderId::new(self.next_id.fetch_add(1, Ordering::AcqRel));
        debug!(%router_order_id, %symbol, quantity, ?order_type, "placement accepted");
        if let Ok(mut placed) = self.placed.lock() {
            placed.push(PlacedOrder {
                router_order_id,
                symbol: symbol.clone(),
                quantity,
                order_type,
                limit_price,
                stop_price,
                tag: tag.to_string(),
            });
        }
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.insert(router_order_id, RouterOrderStatus::Submitted);
        }
        Ok(router_order_id)
    }
}

#[async_trait]
impl ExecutionRouter for SimulatedRouter {
    fn router_id(&self) -> RouterId {
        self.id.clone()
    }

    async fn place_market_order(
        &self,
        symbol: &Symbol,
        quantity: i64,
        tag: &str,
    ) -> Result<RouterOrderId, RouterError> {
        self.accept(symbol, quantity, OrderType::Market, None, None, tag)
    }

    async fn place_market_on_open_order(
        &self,
        symbol: &Symbol,
        quantity: i64,
        tag: &str,
    ) -> Result<RouterOrderId, RouterError> {
        self.accept(symbol, quantity, OrderType::MarketOnOpen, None, None, tag)
    }

    async fn place_market_on_close_order(
        &self,
        symbol: &Symbol,
        quantity: i64,
        tag: &str,
    ) -> Result<RouterOrderId, RouterError> {
        self.accept(symbol, quantity, OrderType::MarketOnClose, None, None, tag)
    }

    async fn place_limit_order(
        &self,
        symbol: &Symbol,
        quantity: i64,
        limit_price: Decimal,
        tag: &str,
    ) -> Result<RouterOrderId, RouterError> {
        self.accept(
            symbol,
            quantity,
            OrderType::Limit,
            Some(limit_price),
            None,
            tag,
        )
    }

    async fn place_stop_market_order(
        &self,
        symbol: &Symbol,
        quantity: i64,
        stop_price: Decimal,
        tag: &str,
    ) -> Result<RouterOrderId, RouterError> {
        self.accept(
            symbol,
            quantity,
            OrderType::StopMarket,
            None,
            Some(stop_price),
            tag,
        )
    }

    async fn place_stop_limit_order(
        &self,
        symbol: &Symbol,
        quantity: i64,
        stop_price: Decimal,
        limit_price: Decimal,
        tag: &str,
    ) -> Result<RouterOrderId, RouterError> {
        self.accept(
            symbol,
            quantity,
            OrderType::StopLimit,
            Some(limit_price),
            Some(stop_price),
            tag,
        )
    }

    async fn cancel_order(&self, router_order_id: RouterOrderId) -> Result<(), RouterError> {
        if let Ok(slot) = self.fail_cancel.lock() {
            if let Some(message) = slot.clone() {
                return Err(RouterError::Unknown { message });
            }
        }
        let known = self
            .snapshots
            .lock()
            .map(|s| s.contains_key(&router_order_id))
            .unwrap_or(false);
        if !known {
            return Err(RouterError::OrderNotFound { router_order_id });
        }
        if let Ok(mut canceled) = self.canceled.lock() {
            canceled.push(router_order_id);
        }
        self.set_status(router_order_id, RouterOrderStatus::Canceled);
        Ok(())
    }

    async fn order_snapshot(&self, router_order_id: RouterOrderId) -> Option<RouterOrderSnapshot> {
        self.snapshots
            .lock()
            .ok()
            .and_then(|s| s.get(&router_order_id).copied())
            .map(|status| RouterOrderSnapshot {
                router_order_id,
                status,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn assigns_increasing_ids_and_records_placements() {
        let router = SimulatedRouter::new("sim");
        let a = router
            .place_market_order(&Symbol::new("SPY"), 10, "entry")
            .await
            .unwrap();
        let b = router
            .place_limit_order(&Symbol::new("QQQ"), -5, Decimal::new(40000, 2), "tp")
            .await
            .unwrap();

        assert_eq!(a.value(), 1);
        assert_eq!(b.value(), 2);
        let placed = router.placed();
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[1].order_type, OrderType::Limit);
        assert_eq!(placed[1].limit_price, Some(Decimal::new(40000, 2)));
    }

    #[tokio::test]
    async fn fail_next_place_rejects_exactly_once() {
        let router = SimulatedRouter::new("sim");
        router.fail_next_place("no capacity");

        let first = router
            .place_market_order(&Symbol::new("SPY"), 1, "")
            .await;
        assert!(matches!(first, Err(RouterError::Rejected { .. })));

        let second = router
            .place_market_order(&Symbol::new("SPY"), 1, "")
            .await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn cancel_updates_snapshot_status() {
        let router = SimulatedRouter::new("sim");
        let id = router
            .place_market_order(&Symbol::new("SPY"), 1, "")
            .await
            .unwrap();

        router.cancel_order(id).await.unwrap();

        let snapshot = router.order_snapshot(id).await.unwrap();
        assert_eq!(snapshot.status, RouterOrderStatus::Canceled);
        assert_eq!(router.canceled(), vec![id]);
    }

    #[tokio::test]
    async fn cancel_of_unknown_order_errors() {
        let router = SimulatedRouter::new("sim");
        let result = router.cancel_order(RouterOrderId::new(77)).await;
        assert!(matches!(result, Err(RouterError::OrderNotFound { .. })));
    }
}
