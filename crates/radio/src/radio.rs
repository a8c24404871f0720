//! Radio bridge link resource

use glucolink_core::{DeviceId, LinkResource, LinkedDeviceSet};

use crate::packet::RadioPacket;

/// A live connection manager for radio-bridge peripherals targeting one pump.
///
/// Lifecycle notifications cover peripheral discovery and connection changes;
/// events are decoded packets heard by any connected peripheral.
pub trait RadioBridge: LinkResource<Event = RadioPacket> {
    /// Peripherals the bridge reconnects to on its own.
    fn autoconnect(&self) -> &LinkedDeviceSet;

    /// Connect to a peripheral and keep it in the autoconnect set.
    fn connect_device(&mut self, device: &DeviceId);

    /// Disconnect from a peripheral and drop it from the autoconnect set.
    fn disconnect_device(&mut self, device: &DeviceId);
}
