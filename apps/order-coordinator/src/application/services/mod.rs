//! Application Services
//!
//! The coordinator run-loop engine and the dependency indexes it owns.

pub mod coordinator;
pub(crate) mod indexes;

pub use coordinator::{Coordinator, CoordinatorConfig, ManagedOrderSnapshot};
