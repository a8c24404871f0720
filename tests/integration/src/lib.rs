//! End-to-end tests for the glucolink coordinator
//!
//! Each scenario runs a real coordinator task over loopback links and
//! observes it through its handle, the companion channel and the sinks:
//! - Link lifecycle driven by identifier changes
//! - Pump and glucose telemetry flowing to the companion display
//! - Settings persisted and restored across restarts

pub mod test_utils;

#[cfg(test)]
mod link_lifecycle_tests;

#[cfg(test)]
mod telemetry_flow_tests;

#[cfg(test)]
mod persistence_tests;
