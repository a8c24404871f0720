//! glucolink Companion
//!
//! Builds the context snapshot shown on the companion display and delivers
//! it through either the complication channel (expensive, wakes the display)
//! or the application-context channel (cheap, picked up on next launch).

pub mod channel;
pub mod context;
pub mod sync;

pub use channel::{
    ChannelAvailability, CompanionChannel, DeliveryMode, DispatchError, LoggingChannel,
    RecordingChannel,
};
pub use context::CompanionContext;
pub use sync::{CompanionSyncCoordinator, DispatchCallback, DispatchReport, SyncOutcome};
