//! Domain Layer
//!
//! The innermost layer containing business logic with zero infrastructure
//! dependencies. This layer defines:
//!
//! - **Aggregates**: Consistency boundaries with invariants
//! - **Value Objects**: Immutable domain types with equality by value
//!
//! # Bounded Contexts
//!
//! - [`managed_order`]: One coordinated order leg, its lifecycle state
//!   machine, and the router event vocabulary
//! - [`shared`]: Strongly-typed identifiers and the `Symbol` value object

pub mod managed_order;
pub mod shared;
