//! Companion context contract.
//!
//! Fields that are not known are left out of the serialized blob entirely
//! rather than zero-filled, so the display can tell "no data" from "zero".

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use glucolink_cgm::GlucoseReading;
use glucolink_core::SessionStartTime;
use glucolink_radio::PumpStatusReading;

/// Snapshot delivered to the companion display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanionContext {
    /// Glucose, mg/dL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glucose_value: Option<u16>,
    /// Trend indicator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glucose_trend: Option<i8>,
    /// Absolute time of the glucose reading
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glucose_absolute_time: Option<DateTime<Utc>>,
    /// Insulin on board, units
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insulin_on_board: Option<f64>,
    /// Reservoir remaining, units
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservoir_remaining: Option<f64>,
    /// Pump clock time of the status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pump_timestamp: Option<NaiveDateTime>,
}

impl CompanionContext {
    /// Assemble a context from the current readings.
    ///
    /// Glucose is included only when a session anchor is known and the
    /// reading's state is above `min_glucose_state`.
    pub fn build(
        pump_status: Option<&PumpStatusReading>,
        glucose: Option<&GlucoseReading>,
        session_start: Option<&SessionStartTime>,
        min_glucose_state: u8,
    ) -> Self {
        let mut context = Self::default();

        if let (Some(glucose), Some(session_start)) = (glucose, session_start) {
            if glucose.is_usable(min_glucose_state) {
                context.glucose_value = Some(glucose.value);
                context.glucose_trend = Some(glucose.trend);
                context.glucose_absolute_time = Some(glucose.absolute_time(session_start));
            }
        }

        if let Some(status) = pump_status {
            context.insulin_on_board = Some(status.insulin_on_board);
            context.reservoir_remaining = Some(status.reservoir_remaining);
            context.pump_timestamp = Some(status.pump_time);
        }

        context
    }

    pub fn has_glucose(&self) -> bool {
        self.glucose_value.is_some()
    }

    /// Serialize to the blob handed to the channel.
    pub fn to_blob(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_blob(blob: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(blob)
    }
}
