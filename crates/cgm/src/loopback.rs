//! In-process transmitter fed through a [`TransmitterFeeder`].

use tokio::sync::broadcast;
use tracing::debug;

use glucolink_core::{LinkIdentifier, LinkNotification, LinkResource, SessionStartTime};

use crate::reading::TransmitterEvent;
use crate::transmitter::Transmitter;

const CHANNEL_CAPACITY: usize = 64;

/// Injects decode results into a [`LoopbackTransmitter`].
#[derive(Debug, Clone)]
pub struct TransmitterFeeder {
    notifications: broadcast::Sender<LinkNotification>,
    events: broadcast::Sender<TransmitterEvent>,
}

impl TransmitterFeeder {
    pub fn new() -> Self {
        let (notifications, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (events, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            notifications,
            events,
        }
    }

    /// Deliver a decode result. Returns false when nobody is subscribed.
    pub fn event(&self, event: TransmitterEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Deliver a lifecycle notification. Returns false when nobody is subscribed.
    pub fn notify(&self, notification: LinkNotification) -> bool {
        self.notifications.send(notification).is_ok()
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Events and notifications not yet taken by every subscriber.
    pub fn pending(&self) -> usize {
        self.events.len() + self.notifications.len()
    }
}

impl Default for TransmitterFeeder {
    fn default() -> Self {
        Self::new()
    }
}

/// Transmitter whose readings come from a [`TransmitterFeeder`].
#[derive(Debug)]
pub struct LoopbackTransmitter {
    id: LinkIdentifier,
    session_start: Option<SessionStartTime>,
    feeder: TransmitterFeeder,
}

impl LoopbackTransmitter {
    pub fn new(id: LinkIdentifier, session_start: Option<SessionStartTime>) -> Self {
        Self::with_feeder(id, session_start, TransmitterFeeder::new())
    }

    pub fn with_feeder(
        id: LinkIdentifier,
        session_start: Option<SessionStartTime>,
        feeder: TransmitterFeeder,
    ) -> Self {
        Self {
            id,
            session_start,
            feeder,
        }
    }

    pub fn feeder(&self) -> TransmitterFeeder {
        self.feeder.clone()
    }
}

impl LinkResource for LoopbackTransmitter {
    type Event = TransmitterEvent;

    fn identifier(&self) -> &LinkIdentifier {
        &self.id
    }

    fn retarget(&mut self, identifier: LinkIdentifier) {
        debug!(from = %self.id, to = %identifier, "Loopback transmitter retargeted");
        self.id = identifier;
        self.session_start = None;
    }

    fn notifications(&self) -> broadcast::Receiver<LinkNotification> {
        self.feeder.notifications.subscribe()
    }

    fn events(&self) -> broadcast::Receiver<TransmitterEvent> {
        self.feeder.events.subscribe()
    }
}

impl Transmitter for LoopbackTransmitter {
    fn session_start(&self) -> Option<SessionStartTime> {
        self.session_start
    }
}
