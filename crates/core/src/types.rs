//! Core types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Exact length of a pump or transmitter identifier.
pub const LINK_IDENTIFIER_LEN: usize = 6;

/// Short credential selecting which physical device a link targets.
///
/// Only identifiers of exactly [`LINK_IDENTIFIER_LEN`] characters exist;
/// anything else is treated as "no identifier".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LinkIdentifier(String);

impl LinkIdentifier {
    /// Parse an identifier, returning `None` for any other length.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.chars().count() == LINK_IDENTIFIER_LEN {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    /// Normalize an optional raw identifier. Malformed input becomes absent.
    pub fn normalize(raw: Option<&str>) -> Option<Self> {
        let raw = raw?;
        let parsed = Self::parse(raw);
        if parsed.is_none() {
            tracing::debug!(length = raw.chars().count(), "Discarding malformed link identifier");
        }
        parsed
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for LinkIdentifier {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("link identifier must be {LINK_IDENTIFIER_LEN} characters"))
    }
}

impl From<LinkIdentifier> for String {
    fn from(id: LinkIdentifier) -> Self {
        id.0
    }
}

impl fmt::Display for LinkIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a radio-bridge peripheral.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Devices the radio bridge should reconnect to automatically.
pub type LinkedDeviceSet = BTreeSet<DeviceId>;

/// Absolute anchor of the transmitter's current sensor session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionStartTime(pub DateTime<Utc>);

impl SessionStartTime {
    /// Resolve a reading offset (seconds since session start) to an absolute time.
    pub fn resolve(&self, offset_secs: u32) -> DateTime<Utc> {
        self.0 + Duration::seconds(i64::from(offset_secs))
    }
}
