//! JSON-lines replay feed.
//!
//! Each input line is one [`ReplayRecord`]. Records either drive the
//! coordinator handle directly or are injected into the loopback links as if
//! the hardware had produced them.

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

use glucolink_cgm::{TransmitterEvent, TransmitterFeeder};
use glucolink_core::DeviceId;
use glucolink_coordinator::CoordinatorHandle;
use glucolink_radio::{RadioFeeder, RadioPacket};

const DRAIN_POLL: Duration = Duration::from_millis(1);
const DRAIN_LIMIT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayRecord {
    PumpId { id: Option<String> },
    TransmitterId { id: Option<String> },
    Connect { device: DeviceId },
    Disconnect { device: DeviceId },
    Radio { packet: RadioPacket },
    Transmitter { event: TransmitterEvent },
    /// Print the coordinator state as one JSON line
    Snapshot,
}

impl ReplayRecord {
    pub fn parse(line: &str) -> anyhow::Result<Self> {
        serde_json::from_str(line).with_context(|| format!("invalid replay record: {line}"))
    }
}

pub struct Replay {
    handle: CoordinatorHandle,
    radio: RadioFeeder,
    transmitter: TransmitterFeeder,
}

impl Replay {
    pub fn new(handle: CoordinatorHandle, radio: RadioFeeder, transmitter: TransmitterFeeder) -> Self {
        Self {
            handle,
            radio,
            transmitter,
        }
    }

    /// Apply one record. Returns the line to print, if any.
    pub async fn apply(&self, record: ReplayRecord) -> anyhow::Result<Option<String>> {
        match record {
            ReplayRecord::PumpId { id } => {
                let transition = self.handle.set_pump_identifier(id.as_deref()).await?;
                tracing::debug!(?transition, "Pump identifier applied");
            }
            ReplayRecord::TransmitterId { id } => {
                let transition = self.handle.set_transmitter_identifier(id.as_deref()).await?;
                tracing::debug!(?transition, "Transmitter identifier applied");
            }
            ReplayRecord::Connect { device } => self.handle.connect_device(device)?,
            ReplayRecord::Disconnect { device } => self.handle.disconnect_device(device)?,
            ReplayRecord::Radio { packet } => {
                if !self.radio.packet(packet) {
                    warn!("No radio link configured, packet dropped");
                }
            }
            ReplayRecord::Transmitter { event } => {
                if !self.transmitter.event(event) {
                    warn!("No transmitter configured, event dropped");
                }
            }
            ReplayRecord::Snapshot => {
                self.drain_links().await;
                let snapshot = self.handle.snapshot().await?;
                return Ok(Some(serde_json::to_string(&snapshot)?));
            }
        }
        Ok(None)
    }

    /// Wait until the link forwarders have taken every injected record, so
    /// it is queued ahead of the snapshot request.
    async fn drain_links(&self) {
        let drained = async {
            while self.radio.pending() + self.transmitter.pending() > 0 {
                tokio::time::sleep(DRAIN_POLL).await;
            }
        };
        if tokio::time::timeout(DRAIN_LIMIT, drained).await.is_err() {
            warn!(
                radio = self.radio.pending(),
                transmitter = self.transmitter.pending(),
                "Link traffic still pending at snapshot"
            );
        }
    }
}
