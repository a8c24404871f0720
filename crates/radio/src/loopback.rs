//! In-process radio bridge.
//!
//! Packets are injected through a [`RadioFeeder`] instead of a real radio.
//! Used by the replay service and by tests.

use tokio::sync::broadcast;
use tracing::debug;

use glucolink_core::{DeviceId, LinkIdentifier, LinkNotification, LinkResource, LinkedDeviceSet};

use crate::packet::RadioPacket;
use crate::radio::RadioBridge;

const CHANNEL_CAPACITY: usize = 64;

/// Injects packets and notifications into a [`LoopbackRadioBridge`].
#[derive(Debug, Clone)]
pub struct RadioFeeder {
    notifications: broadcast::Sender<LinkNotification>,
    packets: broadcast::Sender<RadioPacket>,
}

impl RadioFeeder {
    /// Deliver a packet. Returns false when nobody is subscribed.
    pub fn packet(&self, packet: RadioPacket) -> bool {
        self.packets.send(packet).is_ok()
    }

    /// Deliver a lifecycle notification. Returns false when nobody is subscribed.
    pub fn notify(&self, notification: LinkNotification) -> bool {
        self.notifications.send(notification).is_ok()
    }

    /// Number of live packet subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.packets.receiver_count()
    }

    /// Packets and notifications not yet taken by every subscriber.
    pub fn pending(&self) -> usize {
        self.packets.len() + self.notifications.len()
    }
}

/// Radio bridge whose traffic comes from a [`RadioFeeder`].
#[derive(Debug)]
pub struct LoopbackRadioBridge {
    pump_id: LinkIdentifier,
    autoconnect: LinkedDeviceSet,
    feeder: RadioFeeder,
}

impl LoopbackRadioBridge {
    pub fn new(pump_id: LinkIdentifier, autoconnect: LinkedDeviceSet) -> Self {
        Self::with_feeder(pump_id, autoconnect, RadioFeeder::new())
    }

    /// Build a bridge that shares channels with an existing feeder, so the
    /// feeder survives the bridge being rebuilt.
    pub fn with_feeder(
        pump_id: LinkIdentifier,
        autoconnect: LinkedDeviceSet,
        feeder: RadioFeeder,
    ) -> Self {
        Self {
            pump_id,
            autoconnect,
            feeder,
        }
    }

    pub fn feeder(&self) -> RadioFeeder {
        self.feeder.clone()
    }
}

impl RadioFeeder {
    pub fn new() -> Self {
        let (notifications, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (packets, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            notifications,
            packets,
        }
    }
}

impl Default for RadioFeeder {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkResource for LoopbackRadioBridge {
    type Event = RadioPacket;

    fn identifier(&self) -> &LinkIdentifier {
        &self.pump_id
    }

    fn retarget(&mut self, identifier: LinkIdentifier) {
        debug!(from = %self.pump_id, to = %identifier, "Loopback bridge retargeted");
        self.pump_id = identifier;
    }

    fn notifications(&self) -> broadcast::Receiver<LinkNotification> {
        self.feeder.notifications.subscribe()
    }

    fn events(&self) -> broadcast::Receiver<RadioPacket> {
        self.feeder.packets.subscribe()
    }
}

impl RadioBridge for LoopbackRadioBridge {
    fn autoconnect(&self) -> &LinkedDeviceSet {
        &self.autoconnect
    }

    fn connect_device(&mut self, device: &DeviceId) {
        self.autoconnect.insert(device.clone());
        self.feeder.notify(LinkNotification::DeviceConnected {
            device: device.clone(),
        });
    }

    fn disconnect_device(&mut self, device: &DeviceId) {
        self.autoconnect.remove(device);
        self.feeder.notify(LinkNotification::DeviceDisconnected {
            device: device.clone(),
        });
    }
}
