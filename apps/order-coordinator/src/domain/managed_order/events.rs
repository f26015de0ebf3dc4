//! Router event value objects.
//!
//! Router status notifications arrive as messages pushed into the
//! coordinator's inbound queue (tagged with the originating router); the
//! coordinator is the single consumer and applies them only within a pass.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::managed_order::state::RouterOrderStatus;
use crate::domain::shared::RouterOrderId;

/// A status update for a router-side order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    /// The router's order id this event refers to.
    pub router_order_id: RouterOrderId,
    /// Reported status.
    pub status: RouterOrderStatus,
    /// Quantity executed in this event (0 for pure status changes).
    pub fill_quantity: i64,
    /// Execution price for the filled quantity (0 for pure status changes).
    pub fill_price: Decimal,
    /// Free-form router message (e.g., a rejection reason).
    pub message: String,
    /// When the router reported the event.
    pub occurred_at: DateTime<Utc>,
}

impl OrderEvent {
    /// A pure status-change event with no executed quantity.
    #[must_use]
    pub fn status(router_order_id: RouterOrderId, status: RouterOrderStatus) -> Self {
        Self {
            router_order_id,
            status,
            fill_quantity: 0,
            fill_price: Decimal::ZERO,
            message: String::new(),
            occurred_at: Utc::now(),
        }
    }

    /// A complete-fill event.
    #[must_use]
    pub fn fill(router_order_id: RouterOrderId, quantity: i64, price: Decimal) -> Self {
        Self {
            fill_quantity: quantity,
            fill_price: price,
            ..Self::status(router_order_id, RouterOrderStatus::Filled)
        }
    }

    /// A partial-fill event.
    #[must_use]
    pub fn partial_fill(router_order_id: RouterOrderId, quantity: i64, price: Decimal) -> Self {
        Self {
            fill_quantity: quantity,
            fill_price: price,
            ..Self::status(router_order_id, RouterOrderStatus::PartiallyFilled)
        }
    }

    /// Attach a router message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// Snapshot of a router-side order record.
///
/// Obtained from the router's queryable order map; used to refresh the
/// coordinator's view of the authoritative status before deciding whether a
/// live cancel is currently allowed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RouterOrderSnapshot {
    /// The router's order id.
    pub router_order_id: RouterOrderId,
    /// The router's current status for the order.
    pub status: RouterOrderStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn status_event_carries_no_quantity() {
        let event = OrderEvent::status(RouterOrderId::new(7), RouterOrderStatus::Submitted);
        assert_eq!(event.fill_quantity, 0);
        assert_eq!(event.fill_price, Decimal::ZERO);
        assert_eq!(event.status, RouterOrderStatus::Submitted);
    }

    #[test]
    fn fill_event_carries_quantity_and_price() {
        let event = OrderEvent::fill(RouterOrderId::new(7), 10, Decimal::new(15025, 2));
        assert_eq!(event.status, RouterOrderStatus::Filled);
        assert_eq!(event.fill_quantity, 10);
        assert_eq!(event.fill_price, Decimal::new(15025, 2));
    }

    #[test]
    fn with_message_sets_message() {
        let event = OrderEvent::status(RouterOrderId::new(1), RouterOrderStatus::Invalid)
            .with_message("insufficient margin");
        assert_eq!(event.message, "insufficient margin");
    }
}
