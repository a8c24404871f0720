//! Transmitter link resource

use glucolink_core::{LinkResource, SessionStartTime};

use crate::reading::TransmitterEvent;

/// A live connection to one glucose transmitter.
///
/// Retargeting to another identifier must forget the session anchor, since
/// it belongs to the previous transmitter.
pub trait Transmitter: LinkResource<Event = TransmitterEvent> {
    /// Session anchor currently known to the transmitter.
    fn session_start(&self) -> Option<SessionStartTime>;
}
