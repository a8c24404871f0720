//! Decoded radio packets.
//!
//! The transport validates and decodes raw frames; this module only models
//! what comes out of it.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use glucolink_core::DeviceId;

/// Packet category as reported by the radio bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketCategory {
    /// Unsolicited broadcasts from the pump's sentry radio
    Sentry,
    /// Glucose meter link traffic
    Meter,
    /// Uploader/command traffic
    Carelink,
}

/// Snapshot of pump state from a sentry status broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PumpStatusReading {
    /// Insulin on board, in units
    pub insulin_on_board: f64,
    /// Reservoir remaining, in units
    pub reservoir_remaining: f64,
    /// Pump-local clock time of the status
    pub pump_time: NaiveDateTime,
    /// Pump battery, percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_percent: Option<u8>,
    /// Sensor glucose as relayed by the pump, mg/dL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glucose: Option<u16>,
}

/// Alert raised or cleared by the pump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertBody {
    pub alert_type: u8,
    pub raw: Vec<u8>,
}

/// Body the decoder could frame but not interpret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownBody {
    pub message_type: u8,
    pub raw: Vec<u8>,
}

impl UnknownBody {
    /// Flat representation for the diagnostic sink.
    pub fn diagnostic_fields(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert("messageType".to_string(), format!("{:#04x}", self.message_type));
        fields.insert("rawData".to_string(), hex::encode(&self.raw));
        fields
    }
}

/// Interpreted message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    PumpStatus(PumpStatusReading),
    Alert(AlertBody),
    AlertCleared(AlertBody),
    Unrecognized(UnknownBody),
    /// A known message type with no meaning for the coordinator
    Other { message_type: u8 },
}

/// One decoded pump message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PumpMessage {
    pub category: PacketCategory,
    pub body: MessageBody,
}

impl PumpMessage {
    pub fn sentry(body: MessageBody) -> Self {
        Self {
            category: PacketCategory::Sentry,
            body,
        }
    }
}

/// A decoded message plus the bridge device that heard it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioPacket {
    pub device: DeviceId,
    pub message: PumpMessage,
}
