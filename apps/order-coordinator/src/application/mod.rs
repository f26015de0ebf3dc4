//! Application Layer
//!
//! Orchestration around the domain: the `ExecutionRouter` driven port and the
//! `Coordinator` run-loop service that serializes all shared-state mutation.

pub mod ports;
pub mod services;
