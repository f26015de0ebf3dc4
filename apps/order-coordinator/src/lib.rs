// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Order Coordinator - Managed Order Core Library
//!
//! Coordination engine for composite, interdependent trading orders. A single
//! trading intent (e.g., a bracket trade) decomposes into multiple dependent
//! legs: a parent entry order, attached child orders that must not be sent
//! until the parent fills, and one-cancels-all (OCA) sibling groups where the
//! first fill cancels every other member.
//!
//! # Architecture (Clean Architecture + DDD + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: Core business logic
//!   - `managed_order`: the `ManagedOrder` aggregate, its lifecycle state
//!     machine, and router event value objects
//!   - `shared`: strongly-typed identifiers, `Symbol`
//!
//! - **Application**: Orchestration
//!   - `ports`: `ExecutionRouter` driven port (place/cancel/status snapshot)
//!   - `services`: the `Coordinator` run-loop engine and its dependency
//!     indexes (attach, OCA, router-order, id)
//!
//! - **Infrastructure**: Adapters
//!   - `router`: `SimulatedRouter` in-process double for tests and demos
//!
//! # Concurrency model
//!
//! Producers (submission batches, router status events, market data, a
//! periodic timer) push into lock-free MPSC queues and signal the
//! coordinator. Exactly one processing pass runs at a time; concurrent
//! signals while a pass is running coalesce into exactly one follow-up pass,
//! and no signal is ever dropped.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Coordinator service and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and test doubles.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain re-exports
pub use domain::managed_order::{
    ManagedOrder, ManagedOrderState, OrderError, OrderEvent, OrderType, RequestState,
    RouterOrderSnapshot, RouterOrderStatus,
};
pub use domain::shared::{ManagedOrderId, OcaGroupId, RouterId, RouterOrderId, Symbol};

// Application re-exports
pub use application::ports::{ExecutionRouter, RouterError};
pub use application::services::{Coordinator, CoordinatorConfig, ManagedOrderSnapshot};

// Infrastructure re-exports
pub use infrastructure::router::SimulatedRouter;
