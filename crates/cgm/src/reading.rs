//! Glucose reading types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use glucolink_core::SessionStartTime;

/// One decoded glucose message.
///
/// `relative_time` is seconds since the transmitter's session start; it only
/// becomes an absolute time together with a [`SessionStartTime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GlucoseReading {
    /// Glucose, mg/dL
    pub value: u16,
    /// Signed rate-of-change indicator
    pub trend: i8,
    /// Seconds since session start
    pub relative_time: u32,
    /// Sensor state / validity code
    pub state: u8,
}

impl GlucoseReading {
    /// Whether the sensor state is good enough to show downstream.
    pub fn is_usable(&self, min_state: u8) -> bool {
        self.state > min_state
    }

    /// Absolute time of the reading within `session`.
    pub fn absolute_time(&self, session: &SessionStartTime) -> DateTime<Utc> {
        session.resolve(self.relative_time)
    }
}

/// Transmitter decode failures.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DecodeError {
    /// Frame checksum did not match
    #[error("checksum mismatch")]
    Checksum,

    /// Frame shorter than its opcode requires
    #[error("truncated message: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Opcode the decoder does not handle
    #[error("unexpected opcode {0:#04x}")]
    UnexpectedOpcode(u8),

    /// Link-level failure reported by the transport
    #[error("transport error: {0}")]
    Transport(String),
}

/// What the transmitter link delivers: a decode result plus the session
/// anchor the transmitter reported alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransmitterEvent {
    pub result: Result<GlucoseReading, DecodeError>,
    #[serde(default)]
    pub session_start: Option<SessionStartTime>,
}

impl TransmitterEvent {
    pub fn reading(reading: GlucoseReading, session_start: Option<SessionStartTime>) -> Self {
        Self {
            result: Ok(reading),
            session_start,
        }
    }

    pub fn error(error: DecodeError, session_start: Option<SessionStartTime>) -> Self {
        Self {
            result: Err(error),
            session_start,
        }
    }
}
