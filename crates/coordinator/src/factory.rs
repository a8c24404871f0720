//! Construction of link resources.

use glucolink_cgm::{LoopbackTransmitter, Transmitter, TransmitterFeeder};
use glucolink_core::{LinkIdentifier, LinkedDeviceSet, SessionStartTime};
use glucolink_radio::{LoopbackRadioBridge, RadioBridge, RadioFeeder};

/// Builds the live resource for each link kind when its identifier appears.
pub trait DeviceFactory: Send + 'static {
    type Radio: RadioBridge;
    type Transmitter: Transmitter;

    /// Radio bridge for `pump_id`, reconnecting to `autoconnect`.
    fn radio_bridge(&self, pump_id: LinkIdentifier, autoconnect: &LinkedDeviceSet) -> Self::Radio;

    /// Transmitter for `transmitter_id`, resuming `session_start` when known.
    fn transmitter(
        &self,
        transmitter_id: LinkIdentifier,
        session_start: Option<SessionStartTime>,
    ) -> Self::Transmitter;
}

/// Builds loopback resources sharing long-lived feeders, so traffic can be
/// injected no matter how often the links are rebuilt.
#[derive(Debug, Clone, Default)]
pub struct LoopbackFactory {
    radio: RadioFeeder,
    transmitter: TransmitterFeeder,
}

impl LoopbackFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn radio_feeder(&self) -> RadioFeeder {
        self.radio.clone()
    }

    pub fn transmitter_feeder(&self) -> TransmitterFeeder {
        self.transmitter.clone()
    }
}

impl DeviceFactory for LoopbackFactory {
    type Radio = LoopbackRadioBridge;
    type Transmitter = LoopbackTransmitter;

    fn radio_bridge(&self, pump_id: LinkIdentifier, autoconnect: &LinkedDeviceSet) -> Self::Radio {
        LoopbackRadioBridge::with_feeder(pump_id, autoconnect.clone(), self.radio.clone())
    }

    fn transmitter(
        &self,
        transmitter_id: LinkIdentifier,
        session_start: Option<SessionStartTime>,
    ) -> Self::Transmitter {
        LoopbackTransmitter::with_feeder(transmitter_id, session_start, self.transmitter.clone())
    }
}
