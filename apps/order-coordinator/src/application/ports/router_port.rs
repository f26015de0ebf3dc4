//! Execution Router Port (Driven Port)
//!
//! Interface to an order-routing endpoint: the external facility that
//! transmits orders to a venue and reports status changes. A system may have
//! more than one router active; each managed order holds a reference to the
//! specific router it must submit through.
//!
//! Status notifications are not a callback surface on this port: the host
//! forwards each router status update into
//! [`Coordinator::on_order_event`](crate::application::services::Coordinator::on_order_event)
//! tagged with the originating [`RouterId`], and the coordinator consumes
//! them as messages inside its run-loop.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::managed_order::events::RouterOrderSnapshot;
use crate::domain::shared::{RouterId, RouterOrderId, Symbol};

/// Router port error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RouterError {
    /// Order rejected by the router or venue.
    #[error("order rejected: {message}")]
    Rejected {
        /// Rejection reason.
        message: String,
    },

    /// The router has no record of the referenced order.
    #[error("router order not found: {router_order_id}")]
    OrderNotFound {
        /// The missing router order id.
        router_order_id: RouterOrderId,
    },

    /// Connectivity failure between the router and its venue.
    #[error("router connection error: {message}")]
    Connection {
        /// Error details.
        message: String,
    },

    /// Unclassified router failure.
    #[error("router error: {message}")]
    Unknown {
        /// Error details.
        message: String,
    },
}

/// Port for order transmission and cancellation.
///
/// Place and cancel calls are treated as synchronous, bounded-latency
/// operations: the coordinator awaits them inline within a pass, and no
/// timeout is enforced here (that responsibility belongs to the router
/// implementation). Quantity is signed: positive buys, negative sells.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionRouter: Send + Sync {
    /// Stable identifier for this routing endpoint, used to resolve inbound
    /// events back to the owning managed order.
    fn router_id(&self) -> RouterId;

    /// Place a market order. Returns the router-assigned order id; a
    /// non-positive id means the submission was not accepted.
    async fn place_market_order(
        &self,
        symbol: &Symbol,
        quantity: i64,
        tag: &str,
    ) -> Result<RouterOrderId, RouterError>;

    /// Place a market-on-open order.
    async fn place_market_on_open_order(
        &self,
        symbol: &Symbol,
        quantity: i64,
        tag: &str,
    ) -> Result<RouterOrderId, RouterError>;

    /// Place a market-on-close order.
    async fn place_market_on_close_order(
        &self,
        symbol: &Symbol,
        quantity: i64,
        tag: &str,
    ) -> Result<RouterOrderId, RouterError>;

    /// Place a limit order.
    async fn place_limit_order(
        &self,
        symbol: &Symbol,
        quantity: i64,
        limit_price: Decimal,
        tag: &str,
    ) -> Result<RouterOrderId, RouterError>;

    /// Place a stop-market order.
    async fn place_stop_market_order(
        &self,
        symbol: &Symbol,
        quantity: i64,
        stop_price: Decimal,
        tag: &str,
    ) -> Result<RouterOrderId, RouterError>;

    /// Place a stop-limit order.
    async fn place_stop_limit_order(
        &self,
        symbol: &Symbol,
        quantity: i64,
        stop_price: Decimal,
        limit_price: Decimal,
        tag: &str,
    ) -> Result<RouterOrderId, RouterError>;

    /// Request cancellation of a live order. May fail; the caller decides
    /// the fallback policy.
    async fn cancel_order(&self, router_order_id: RouterOrderId) -> Result<(), RouterError>;

    /// Current router-side record for an order, if the router still knows
    /// it. Used to refresh the cached authoritative status before deciding
    /// whether a cancel is currently allowed.
    async fn order_snapshot(&self, router_order_id: RouterOrderId) -> Option<RouterOrderSnapshot>;
}
