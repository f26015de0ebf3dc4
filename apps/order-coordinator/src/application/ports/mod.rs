//! Application Ports
//!
//! Interfaces for external systems, implemented by infrastructure adapters.

pub mod router_port;

pub use router_port::{ExecutionRouter, RouterError};

#[cfg(test)]
pub use router_port::MockExecutionRouter;
