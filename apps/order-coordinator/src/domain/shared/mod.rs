//! Shared Domain Types
//!
//! Identifiers and value objects shared across bounded contexts.

pub mod identifiers;
pub mod symbol;

pub use identifiers::{ManagedOrderId, OcaGroupId, RouterId, RouterOrderId};
pub use symbol::Symbol;
