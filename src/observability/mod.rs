//! Telemetry for the coordination layer: structured events and counters.

pub mod events;
pub mod metrics;
