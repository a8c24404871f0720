//! Inbox commands, outbound events and routing outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use glucolink_cgm::{GlucoseReading, TransmitterEvent};
use glucolink_companion::DispatchReport;
use glucolink_core::{
    DeviceId, LinkIdentifier, LinkNotification, LinkSignal, LinkedDeviceSet, SessionStartTime,
    Transition,
};
use glucolink_radio::{PumpStatusReading, RadioPacket};
use glucolink_telemetry::{DedupMetrics, StampedGlucose};

/// Everything the coordinator task processes, one at a time.
#[derive(Debug)]
pub enum Command {
    SetPumpIdentifier {
        raw: Option<String>,
        reply: Option<oneshot::Sender<Transition>>,
    },
    SetTransmitterIdentifier {
        raw: Option<String>,
        reply: Option<oneshot::Sender<Transition>>,
    },
    ConnectDevice(DeviceId),
    DisconnectDevice(DeviceId),
    /// Signal from the radio-bridge subscription of the given activation
    Radio {
        generation: u64,
        signal: LinkSignal<RadioPacket>,
    },
    /// Signal from the transmitter subscription of the given activation
    Transmitter {
        generation: u64,
        signal: LinkSignal<TransmitterEvent>,
    },
    /// Completion of a spawned companion delivery
    DispatchCompleted(DispatchReport),
    Snapshot(oneshot::Sender<CoordinatorSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

impl Command {
    pub(crate) fn radio(generation: u64, signal: LinkSignal<RadioPacket>) -> Self {
        Command::Radio { generation, signal }
    }

    pub(crate) fn transmitter(generation: u64, signal: LinkSignal<TransmitterEvent>) -> Self {
        Command::Transmitter { generation, signal }
    }
}

/// Broadcast to coordinator listeners.
///
/// Update events carry no payload; listeners read a [`CoordinatorSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinatorEvent {
    GlucoseUpdated,
    PumpStatusUpdated,
    RadioNotification(LinkNotification),
    TransmitterNotification(LinkNotification),
}

/// Why a radio packet was not acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Pump alert raised or cleared
    Alert,
    /// Sentry message type with no meaning here
    UnhandledMessage,
    /// Packet category other than sentry
    UnhandledCategory,
}

/// What happened to one inbound signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Novel reading; baseline replaced and listeners notified
    Accepted,
    /// Equal to the baseline; nothing happened
    Duplicate,
    /// Written to the diagnostic sink only
    Logged,
    /// Deliberately dropped
    Ignored(IgnoreReason),
    /// Lifecycle notification passed on to listeners
    Rebroadcast,
    /// From a link activation that no longer exists
    Stale,
}

/// Point-in-time view of coordinator state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinatorSnapshot {
    pub pump_id: Option<LinkIdentifier>,
    pub transmitter_id: Option<LinkIdentifier>,
    pub radio_ready: bool,
    pub transmitter_ready: bool,
    pub session_start: Option<SessionStartTime>,
    pub linked_devices: LinkedDeviceSet,
    pub pump_status: Option<PumpStatusReading>,
    pub glucose: Option<GlucoseReading>,
    pub glucose_time: Option<DateTime<Utc>>,
    pub use_expensive_channel: bool,
    pub last_complication: Option<StampedGlucose>,
    /// A complication was sent and has not completed yet
    pub complication_in_flight: bool,
    pub throttle_recomputes: u64,
    pub dedup: DedupMetrics,
}
