//! Managed Order Bounded Context
//!
//! A managed order is one coordinated order leg with its own lifecycle state,
//! distinct from the raw order record held by the routing endpoint. It owns
//! its state machine and its dependency declarations (parent attachment, OCA
//! group memberships); the coordinator owns the relation tables built from
//! those declarations.
//!
//! # Key Concepts
//!
//! - **Lifecycle state**: confirmed state, advanced only by router events or
//!   submission outcomes; never regresses from a terminal state
//! - **Request state**: an independent axis tracking an in-flight action
//!   (submitting, amending, canceling) not yet confirmed by the router
//! - **Attachment**: a child leg gated on its parent reaching a filled state
//! - **OCA group**: one-cancels-all; the first member fill retires the group

pub mod errors;
pub mod events;
pub mod order;
pub mod state;

pub use errors::OrderError;
pub use events::{OrderEvent, RouterOrderSnapshot};
pub use order::{ManagedOrder, OrderType};
pub use state::{ManagedOrderState, RequestState, RouterOrderStatus};
