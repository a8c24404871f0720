//! Value-equality deduplication of pump status and glucose readings.
//!
//! Hardware links redeliver identical frames on every poll and retry. Only a
//! reading that differs from the last accepted reading of its kind replaces
//! the baseline; everything else is a duplicate and causes no downstream work.

use glucolink_cgm::GlucoseReading;
use glucolink_radio::PumpStatusReading;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Counters for accepted and suppressed readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupMetrics {
    /// Pump statuses that replaced the baseline
    pub pump_status_accepted: u64,
    /// Pump statuses equal to the baseline
    pub pump_status_duplicates: u64,
    /// Glucose readings that replaced the baseline
    pub glucose_accepted: u64,
    /// Glucose readings equal to the baseline
    pub glucose_duplicates: u64,
}

/// Last accepted reading of each kind.
#[derive(Debug, Clone, Default)]
pub struct TelemetryDeduplicator {
    last_pump_status: Option<PumpStatusReading>,
    last_glucose: Option<GlucoseReading>,
    metrics: DedupMetrics,
}

impl TelemetryDeduplicator {
    /// Create a deduplicator with empty baselines
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `candidate` if it differs from the last accepted pump status.
    ///
    /// Returns `true` when the baseline was replaced.
    pub fn accept_pump_status(&mut self, candidate: &PumpStatusReading) -> bool {
        if self.last_pump_status.as_ref() == Some(candidate) {
            self.metrics.pump_status_duplicates += 1;
            debug!(iob = candidate.insulin_on_board, "Duplicate pump status suppressed");
            return false;
        }

        self.last_pump_status = Some(candidate.clone());
        self.metrics.pump_status_accepted += 1;
        true
    }

    /// Accept `candidate` if it differs from the last accepted glucose reading.
    ///
    /// Returns `true` when the baseline was replaced.
    pub fn accept_glucose(&mut self, candidate: GlucoseReading) -> bool {
        if self.last_glucose == Some(candidate) {
            self.metrics.glucose_duplicates += 1;
            debug!(value = candidate.value, "Duplicate glucose reading suppressed");
            return false;
        }

        self.last_glucose = Some(candidate);
        self.metrics.glucose_accepted += 1;
        true
    }

    /// Last accepted pump status
    pub fn pump_status(&self) -> Option<&PumpStatusReading> {
        self.last_pump_status.as_ref()
    }

    /// Last accepted glucose reading
    pub fn glucose(&self) -> Option<GlucoseReading> {
        self.last_glucose
    }

    /// Accept/duplicate counters
    pub fn metrics(&self) -> &DedupMetrics {
        &self.metrics
    }
}
