//! Lifecycle state enums and their classification predicates.
//!
//! The predicates here are consulted pervasively by the coordinator's gating
//! and cascade logic and must be exact: a wrong `allows_cancel` answer either
//! leaks a live order or double-cancels one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Confirmed lifecycle state of a managed order.
///
/// Transitions only move forward along the state machine; `Filled`,
/// `Canceled` and `Error` are terminal and are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManagedOrderState {
    /// Created, not yet submitted to a router.
    New,
    /// Submission accepted by the router (positive router order id).
    Submitted,
    /// Acknowledged live at the router.
    Working,
    /// Partially executed, remainder still live.
    PartiallyFilled,
    /// Completely executed. Terminal.
    Filled,
    /// Canceled (live cancel confirmed, or local cancel). Terminal.
    Canceled,
    /// Submission rejected or order invalidated. Terminal; treated as
    /// cancel-equivalent for dependency purposes.
    Error,
}

impl ManagedOrderState {
    /// Whether the order is still open (may yet fill or cancel).
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(
            self,
            Self::New | Self::Submitted | Self::Working | Self::PartiallyFilled
        )
    }

    /// Whether the order has any executed quantity.
    #[must_use]
    pub const fn is_filled(self) -> bool {
        matches!(self, Self::Filled | Self::PartiallyFilled)
    }

    /// Whether the order ended without (full) execution.
    #[must_use]
    pub const fn is_canceled(self) -> bool {
        matches!(self, Self::Canceled | Self::Error)
    }

    /// Whether a cancel request is still meaningful.
    #[must_use]
    pub const fn allows_cancel(self) -> bool {
        matches!(self, Self::New | Self::Submitted | Self::Working)
    }

    /// Whether this is a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Filled | Self::Canceled | Self::Error)
    }
}

impl fmt::Display for ManagedOrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "NEW"),
            Self::Submitted => write!(f, "SUBMITTED"),
            Self::Working => write!(f, "WORKING"),
            Self::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            Self::Filled => write!(f, "FILLED"),
            Self::Canceled => write!(f, "CANCELED"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// In-flight action not yet confirmed by the router.
///
/// Independent axis from [`ManagedOrderState`]: an order can be `Working`
/// while a cancel request is in flight (`Canceling`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    /// No action in flight.
    None,
    /// Submission dispatched, awaiting router acknowledgment.
    Submitting,
    /// Amendment dispatched, awaiting router acknowledgment.
    Amending,
    /// Cancel dispatched, awaiting router confirmation.
    Canceling,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::Submitting => write!(f, "SUBMITTING"),
            Self::Amending => write!(f, "AMENDING"),
            Self::Canceling => write!(f, "CANCELING"),
        }
    }
}

/// The router's externally-reported status for an order record.
///
/// This is the *router's* notion of status, not the managed order's local
/// state; the local state may lag it. Consulted before attempting a live
/// cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouterOrderStatus {
    /// No status yet reported.
    None,
    /// Order record created router-side.
    New,
    /// Order accepted by the venue.
    Submitted,
    /// Partially executed.
    PartiallyFilled,
    /// Completely executed.
    Filled,
    /// Canceled router-side.
    Canceled,
    /// An amendment is pending.
    PendingUpdate,
    /// Rejected / invalid.
    Invalid,
}

impl RouterOrderStatus {
    /// Whether the router would currently accept a cancel for this order.
    #[must_use]
    pub const fn allows_cancel(self) -> bool {
        matches!(
            self,
            Self::None | Self::New | Self::Submitted | Self::PendingUpdate
        )
    }
}

impl fmt::Display for RouterOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::New => write!(f, "NEW"),
            Self::Submitted => write!(f, "SUBMITTED"),
            Self::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            Self::Filled => write!(f, "FILLED"),
            Self::Canceled => write!(f, "CANCELED"),
            Self::PendingUpdate => write!(f, "PENDING_UPDATE"),
            Self::Invalid => write!(f, "INVALID"),
        }
    }
}
