//! Managed Order Aggregate
//!
//! One coordinated order leg. The aggregate owns its two state axes
//! (confirmed lifecycle state and in-flight request state), its dependency
//! declarations, and delegates actual transmission to its execution router.
//!
//! Mutation discipline: the owning application constructs the order, then
//! hands it to the coordinator, which mutates it exclusively from inside a
//! run-loop pass.

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::application::ports::ExecutionRouter;
use crate::domain::managed_order::errors::OrderError;
use crate::domain::managed_order::events::OrderEvent;
use crate::domain::managed_order::state::{ManagedOrderState, RequestState, RouterOrderStatus};
use crate::domain::shared::{ManagedOrderId, OcaGroupId, RouterId, RouterOrderId, Symbol};

/// The router order type a managed order submits as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Immediate execution at market.
    Market,
    /// Market order executed at the next open.
    MarketOnOpen,
    /// Market order executed at the close.
    MarketOnClose,
    /// Execution at `limit_price` or better.
    Limit,
    /// Market order armed when `stop_price` trades.
    StopMarket,
    /// Limit order armed when `stop_price` trades.
    StopLimit,
}

/// One coordinated order leg.
///
/// Quantity is signed: positive buys, negative sells (matching the router's
/// convention). Identity, symbol, quantity and prices are immutable after
/// construction.
pub struct ManagedOrder {
    id: ManagedOrderId,
    state: ManagedOrderState,
    request_state: RequestState,
    attached_to: Option<ManagedOrderId>,
    oca_groups: Vec<OcaGroupId>,
    router_order_id: Option<RouterOrderId>,
    router: Arc<dyn ExecutionRouter>,
    symbol: Symbol,
    quantity: i64,
    order_type: OrderType,
    limit_price: Option<Decimal>,
    stop_price: Option<Decimal>,
    tag: String,
    last_event: Option<OrderEvent>,
}

impl ManagedOrder {
    fn new(
        router: Arc<dyn ExecutionRouter>,
        symbol: Symbol,
        quantity: i64,
        order_type: OrderType,
        limit_price: Option<Decimal>,
        stop_price: Option<Decimal>,
    ) -> Self {
        Self {
            id: ManagedOrderId::generate(),
            state: ManagedOrderState::New,
            request_state: RequestState::None,
            attached_to: None,
            oca_groups: Vec::new(),
            router_order_id: None,
            router,
            symbol,
            quantity,
            order_type,
            limit_price,
            stop_price,
            tag: String::new(),
            last_event: None,
        }
    }

    /// Create a market order leg.
    #[must_use]
    pub fn market(router: Arc<dyn ExecutionRouter>, symbol: Symbol, quantity: i64) -> Self {
        Self::new(router, symbol, quantity, OrderType::Market, None, None)
    }

    /// Create a market-on-open order leg.
    #[must_use]
    pub fn market_on_open(router: Arc<dyn ExecutionRouter>, symbol: Symbol, quantity: i64) -> Self {
        Self::new(router, symbol, quantity, OrderType::MarketOnOpen, None, None)
    }

    /// Create a market-on-close order leg.
    #[must_use]
    pub fn market_on_close(
        router: Arc<dyn ExecutionRouter>,
        symbol: Symbol,
        quantity: i64,
    ) -> Self {
        Self::new(router, symbol, quantity, OrderType::MarketOnClose, None, None)
    }

    /// Create a limit order leg.
    #[must_use]
    pub fn limit(
        router: Arc<dyn ExecutionRouter>,
        symbol: Symbol,
        quantity: i64,
        limit_price: Decimal,
    ) -> Self {
        Self::new(
            router,
            symbol,
            quantity,
            OrderType::Limit,
            Some(limit_price),
            None,
        )
    }

    /// Create a stop-market order leg.
    #[must_use]
    pub fn stop_market(
        router: Arc<dyn ExecutionRouter>,
        symbol: Symbol,
        quantity: i64,
        stop_price: Decimal,
    ) -> Self {
        Self::new(
            router,
            symbol,
            quantity,
            OrderType::StopMarket,
            None,
            Some(stop_price),
        )
    }

    /// Create a stop-limit order leg.
    #[must_use]
    pub fn stop_limit(
        router: Arc<dyn ExecutionRouter>,
        symbol: Symbol,
        quantity: i64,
        stop_price: Decimal,
        limit_price: Decimal,
    ) -> Self {
        Self::new(
            router,
            symbol,
            quantity,
            OrderType::StopLimit,
            Some(limit_price),
            Some(stop_price),
        )
    }

    /// Tag the order with free-form data, passed through to the router.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    // ========================================================================
    // Dependency declarations
    // ========================================================================

    /// Declare this order as a child of `parent`: it will not submit until
    /// the parent fills, and it is canceled if the parent is canceled.
    ///
    /// A back-reference used purely for dependency lookup, not ownership.
    pub fn attach_to(&mut self, parent: ManagedOrderId) {
        self.attached_to = Some(parent);
    }

    /// Detach from any parent.
    pub fn detach(&mut self) {
        self.attached_to = None;
    }

    /// Join a one-cancels-all group.
    pub fn join_oca_group(&mut self, group: OcaGroupId) {
        if !self.oca_groups.contains(&group) {
            self.oca_groups.push(group);
        }
    }

    /// Leave a one-cancels-all group.
    pub fn leave_oca_group(&mut self, group: &OcaGroupId) {
        self.oca_groups.retain(|g| g != group);
    }

    // ========================================================================
    // Getters
    // ========================================================================

    /// The process-unique order id.
    #[must_use]
    pub const fn id(&self) -> &ManagedOrderId {
        &self.id
    }

    /// Confirmed lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ManagedOrderState {
        self.state
    }

    /// In-flight request state.
    #[must_use]
    pub const fn request_state(&self) -> RequestState {
        self.request_state
    }

    /// Parent order id, if this is an attached child.
    #[must_use]
    pub const fn attached_to(&self) -> Option<&ManagedOrderId> {
        self.attached_to.as_ref()
    }

    /// OCA groups this order participates in.
    #[must_use]
    pub fn oca_groups(&self) -> &[OcaGroupId] {
        &self.oca_groups
    }

    /// Router-assigned order id, set at most once on successful submission.
    #[must_use]
    pub const fn router_order_id(&self) -> Option<RouterOrderId> {
        self.router_order_id
    }

    /// The routing endpoint this order submits through.
    #[must_use]
    pub fn router_id(&self) -> RouterId {
        self.router.router_id()
    }

    /// Instrument symbol.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Signed quantity (positive buys, negative sells).
    #[must_use]
    pub const fn quantity(&self) -> i64 {
        self.quantity
    }

    /// Router order type.
    #[must_use]
    pub const fn order_type(&self) -> OrderType {
        self.order_type
    }

    /// Limit price, for limit and stop-limit orders.
    #[must_use]
    pub const fn limit_price(&self) -> Option<Decimal> {
        self.limit_price
    }

    /// Stop price, for stop orders.
    #[must_use]
    pub const fn stop_price(&self) -> Option<Decimal> {
        self.stop_price
    }

    /// Free-form tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Last router event cached for this order.
    #[must_use]
    pub const fn last_event(&self) -> Option<&OrderEvent> {
        self.last_event.as_ref()
    }

    /// Whether attached children of this order must be canceled: the order
    /// is canceled (or errored), or a cancel request is in flight.
    #[must_use]
    pub fn needs_cancel(&self) -> bool {
        self.state.is_canceled() || self.request_state == RequestState::Canceling
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Submit the order through its router.
    ///
    /// Valid only in `New`; refused without a state change otherwise. Parent
    /// gating is the coordinator's responsibility and must already have been
    /// checked. A positive returned router order id moves the order to
    /// `Submitted`; a non-positive id or a router failure moves it to
    /// `Error` (terminal, cancel-equivalent for dependents).
    ///
    /// # Errors
    ///
    /// Returns the refusal or failure; state has already been updated.
    pub async fn submit(&mut self) -> Result<RouterOrderId, OrderError> {
        if self.state != ManagedOrderState::New {
            return Err(OrderError::NotSubmittable {
                id: self.id.clone(),
                state: self.state,
            });
        }

        self.request_state = RequestState::Submitting;

        let placed = match self.order_type {
            OrderType::Market => {
                self.router
                    .place_market_order(&self.symbol, self.quantity, &self.tag)
                    .await
            }
            OrderType::MarketOnOpen => {
                self.router
                    .place_market_on_open_order(&self.symbol, self.quantity, &self.tag)
                    .await
            }
            OrderType::MarketOnClose => {
                self.router
                    .place_market_on_close_order(&self.symbol, self.quantity, &self.tag)
                    .await
            }
            OrderType::Limit => {
                self.router
                    .place_limit_order(
                        &self.symbol,
                        self.quantity,
                        self.limit_price.unwrap_or_default(),
                        &self.tag,
                    )
                    .await
            }
            OrderType::StopMarket => {
                self.router
                    .place_stop_market_order(
                        &self.symbol,
                        self.quantity,
                        self.stop_price.unwrap_or_default(),
                        &self.tag,
                    )
                    .await
            }
            OrderType::StopLimit => {
                self.router
                    .place_stop_limit_order(
                        &self.symbol,
                        self.quantity,
                        self.stop_price.unwrap_or_default(),
                        self.limit_price.unwrap_or_default(),
                        &self.tag,
                    )
                    .await
            }
        };

        match placed {
            Ok(router_order_id) if router_order_id.is_positive() => {
                self.router_order_id = Some(router_order_id);
                self.state = ManagedOrderState::Submitted;
                debug!(
                    order = %self.id,
                    %router_order_id,
                    symbol = %self.symbol,
                    "order submitted"
                );
                Ok(router_order_id)
            }
            Ok(router_order_id) => {
                self.state = ManagedOrderState::Error;
                self.request_state = RequestState::None;
                Err(OrderError::Rejected {
                    id: self.id.clone(),
                    router_order_id,
                })
            }
            Err(source) => {
                self.state = ManagedOrderState::Error;
                self.request_state = RequestState::None;
                Err(OrderError::SubmitFailed {
                    id: self.id.clone(),
                    source,
                })
            }
        }
    }

    /// Cancel the order. Idempotent: a no-op unless the local state still
    /// allows a cancel.
    ///
    /// With a live router order whose authoritative status is still
    /// cancelable, issues a live cancel and marks `Canceling`; confirmation
    /// arrives later as a router event. Without a router order id (never
    /// submitted), or when the router no longer knows the order, this
    /// degrades to a pure local transition to `Canceled`.
    ///
    /// # Errors
    ///
    /// [`OrderError::CancelFailed`] when the live cancel call failed; the
    /// order has then already been force-canceled locally so dependent
    /// cascades are not blocked.
    pub async fn cancel(&mut self) -> Result<(), OrderError> {
        if !self.state.allows_cancel() {
            return Ok(());
        }

        let Some(router_order_id) = self.router_order_id else {
            self.state = ManagedOrderState::Canceled;
            self.request_state = RequestState::None;
            return Ok(());
        };

        let snapshot = self.router.order_snapshot(router_order_id).await;
        let Some(snapshot) = snapshot else {
            // Router has no record of the order; nothing live to cancel.
            self.state = ManagedOrderState::Canceled;
            self.request_state = RequestState::None;
            return Ok(());
        };

        let event_allows = self
            .last_event
            .as_ref()
            .is_none_or(|e| e.status.allows_cancel());
        if !snapshot.status.allows_cancel() || !event_allows {
            // The router-side order is already filling or done; the
            // resolving event is on its way.
            return Ok(());
        }

        self.request_state = RequestState::Canceling;
        match self.router.cancel_order(router_order_id).await {
            Ok(()) => Ok(()),
            Err(source) => {
                warn!(
                    order = %self.id,
                    %router_order_id,
                    error = %source,
                    "live cancel failed, forcing local cancel"
                );
                self.state = ManagedOrderState::Canceled;
                self.request_state = RequestState::None;
                Err(OrderError::CancelFailed {
                    id: self.id.clone(),
                    source,
                })
            }
        }
    }

    /// Apply a router event to the order's state machine.
    ///
    /// The event is always cached as the latest router snapshot; state is
    /// only advanced while the order is open (terminal states never regress).
    pub fn process(&mut self, event: &OrderEvent) {
        let status = event.status;
        self.last_event = Some(event.clone());

        if !self.state.is_open() {
            return;
        }

        match status {
            RouterOrderStatus::Submitted => {
                if self.state == ManagedOrderState::Submitted {
                    self.state = ManagedOrderState::Working;
                }
                if matches!(
                    self.request_state,
                    RequestState::Submitting | RequestState::Amending
                ) {
                    self.request_state = RequestState::None;
                }
            }
            RouterOrderStatus::PartiallyFilled => {
                self.state = ManagedOrderState::PartiallyFilled;
                self.request_state = RequestState::None;
            }
            RouterOrderStatus::Filled => {
                self.state = ManagedOrderState::Filled;
                self.request_state = RequestState::None;
            }
            RouterOrderStatus::Canceled => {
                self.state = ManagedOrderState::Canceled;
                self.request_state = RequestState::None;
            }
            RouterOrderStatus::Invalid => {
                self.state = ManagedOrderState::Error;
            }
            RouterOrderStatus::None | RouterOrderStatus::New | RouterOrderStatus::PendingUpdate => {
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn force_state_for_test(&mut self, state: ManagedOrderState) {
        self.state = state;
    }

    #[cfg(test)]
    pub(crate) fn force_router_order_id_for_test(&mut self, id: RouterOrderId) {
        self.router_order_id = Some(id);
    }
}

impl fmt::Debug for ManagedOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedOrder")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("request_state", &self.request_state)
            .field("attached_to", &self.attached_to)
            .field("oca_groups", &self.oca_groups)
            .field("router_order_id", &self.router_order_id)
            .field("router", &self.router.router_id())
            .field("symbol", &self.symbol)
            .field("quantity", &self.quantity)
            .field("order_type", &self.order_type)
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}
