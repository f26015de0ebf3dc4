//! Managed order errors.

use thiserror::Error;

use crate::application::ports::RouterError;
use crate::domain::managed_order::state::ManagedOrderState;
use crate::domain::shared::{ManagedOrderId, RouterOrderId};

/// Errors raised by managed order operations.
///
/// These never escape the coordinator to its caller: the coordinator absorbs
/// each one into a state transition plus an entry in its error log.
#[derive(Debug, Error)]
pub enum OrderError {
    /// `submit()` was invoked on an order that is not `New`.
    #[error("order {id} is not submittable in state {state}")]
    NotSubmittable {
        /// The order.
        id: ManagedOrderId,
        /// Its current state.
        state: ManagedOrderState,
    },

    /// The router returned a non-positive order id for the submission.
    #[error("order {id} rejected by router (returned id {router_order_id})")]
    Rejected {
        /// The order.
        id: ManagedOrderId,
        /// The non-positive id the router returned.
        router_order_id: RouterOrderId,
    },

    /// The router call for the submission failed.
    #[error("order {id} submission failed")]
    SubmitFailed {
        /// The order.
        id: ManagedOrderId,
        /// Underlying router error.
        #[source]
        source: RouterError,
    },

    /// A live cancel failed; the order was force-canceled locally so that
    /// dependent cascades are not permanently blocked. Local state may
    /// diverge from the router's authoritative status.
    #[error("order {id} cancel failed, forced local cancel")]
    CancelFailed {
        /// The order.
        id: ManagedOrderId,
        /// Underlying router error.
        #[source]
        source: RouterError,
    },
}
