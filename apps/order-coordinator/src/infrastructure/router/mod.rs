//! Execution router adapters.

pub mod simulated;

pub use simulated::{PlacedOrder, SimulatedRouter};
