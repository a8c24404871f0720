//! glucolink Telemetry
//!
//! Decides which readings are worth propagating: the deduplicator drops
//! readings equal to the last accepted one, the throttle decides whether an
//! accepted glucose reading justifies the expensive complication channel.

#![warn(missing_docs)]

pub mod dedup;
pub mod throttle;

pub use dedup::{DedupMetrics, TelemetryDeduplicator};
pub use throttle::{PropagationThrottle, StampedGlucose};
