//! Complication throttle.
//!
//! The complication channel wakes the companion display and has a small
//! daily budget, so it is reserved for readings that are meaningfully new
//! relative to the last reading that went through it: either enough time
//! has passed or the value moved far enough.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use glucolink_cgm::GlucoseReading;
use glucolink_core::ThrottleConfig;

/// A glucose reading plus its absolute time, when the session anchor is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampedGlucose {
    /// The reading
    pub reading: GlucoseReading,
    /// Absolute time resolved against the session start
    pub absolute_time: Option<DateTime<Utc>>,
}

impl StampedGlucose {
    /// Stamp a reading
    pub fn new(reading: GlucoseReading, absolute_time: Option<DateTime<Utc>>) -> Self {
        Self {
            reading,
            absolute_time,
        }
    }

    /// Seconds from `baseline` to `self`.
    ///
    /// Uses absolute times when both are known, otherwise the difference of
    /// the session-relative offsets.
    pub fn seconds_since(&self, baseline: &StampedGlucose) -> i64 {
        match (self.absolute_time, baseline.absolute_time) {
            (Some(current), Some(previous)) => (current - previous).num_seconds(),
            _ => i64::from(self.reading.relative_time) - i64::from(baseline.reading.relative_time),
        }
    }

    /// Absolute glucose change from `baseline`.
    pub fn delta_from(&self, baseline: &StampedGlucose) -> u16 {
        self.reading.value.abs_diff(baseline.reading.value)
    }
}

/// Decides whether the expensive channel should carry the next update.
#[derive(Debug, Clone)]
pub struct PropagationThrottle {
    config: ThrottleConfig,
    last_complication: Option<StampedGlucose>,
    in_flight: Option<StampedGlucose>,
    should_use_expensive_channel: bool,
    recomputes: u64,
}

impl PropagationThrottle {
    /// Create a throttle with no baseline
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            last_complication: None,
            in_flight: None,
            should_use_expensive_channel: false,
            recomputes: 0,
        }
    }

    /// Recompute the decision for a newly accepted reading.
    ///
    /// Only call this for glucose readings that passed deduplication.
    pub fn recompute(&mut self, current: &StampedGlucose) -> bool {
        self.recomputes += 1;
        self.should_use_expensive_channel = match &self.last_complication {
            None => true,
            Some(baseline) => {
                let elapsed = current.seconds_since(baseline);
                let delta = current.delta_from(baseline);
                let decision =
                    elapsed >= self.config.min_interval_secs || delta >= self.config.min_delta;
                debug!(elapsed, delta, decision, "Complication throttle recomputed");
                decision
            }
        };
        self.should_use_expensive_channel
    }

    /// Note that a complication carrying `pending` has been sent and not yet
    /// completed. Until it settles the expensive channel stays closed.
    pub fn begin_dispatch(&mut self, pending: StampedGlucose) {
        self.in_flight = Some(pending);
    }

    /// Record a successful complication dispatch of `dispatched`.
    pub fn mark_dispatched(&mut self, dispatched: StampedGlucose) {
        self.last_complication = Some(dispatched);
        self.in_flight = None;
        self.should_use_expensive_channel = false;
    }

    /// Record a failed complication dispatch. The baseline is unchanged, so
    /// the last decision applies again.
    pub fn dispatch_failed(&mut self) {
        self.in_flight = None;
    }

    /// Current decision, false while a complication is in flight
    pub fn should_use_expensive_channel(&self) -> bool {
        self.should_use_expensive_channel && self.in_flight.is_none()
    }

    /// Complication sent and not yet completed
    pub fn in_flight(&self) -> Option<&StampedGlucose> {
        self.in_flight.as_ref()
    }

    /// Last reading sent through the complication channel
    pub fn last_complication(&self) -> Option<&StampedGlucose> {
        self.last_complication.as_ref()
    }

    /// Number of recomputations so far
    pub fn recompute_count(&self) -> u64 {
        self.recomputes
    }
}

impl Default for PropagationThrottle {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}
