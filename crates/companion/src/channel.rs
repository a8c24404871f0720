//! Companion delivery channel

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::context::CompanionContext;

/// Which surface a delivery targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Complication update: wakes the display, rate-limited by the platform
    Complication,
    /// Latest-value application context: cheap, read on next launch
    ApplicationContext,
}

/// Pairing state of the companion device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAvailability {
    pub paired: bool,
    pub app_installed: bool,
    pub complication_enabled: bool,
}

impl ChannelAvailability {
    /// Fully paired companion with the complication enabled.
    pub fn ready() -> Self {
        Self {
            paired: true,
            app_installed: true,
            complication_enabled: true,
        }
    }

    /// Whether anything can be delivered at all.
    pub fn is_available(&self) -> bool {
        self.paired && self.app_installed
    }
}

/// Delivery failures. None of these are fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Channel went away between the availability check and delivery
    #[error("companion channel unavailable")]
    Unavailable,

    /// Context could not be serialized
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Channel rejected or failed the delivery
    #[error("transport error: {0}")]
    Transport(String),

    /// Delivery did not complete in time
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
}

/// Platform-specific companion sync channel.
#[async_trait]
pub trait CompanionChannel: Send + Sync {
    /// Current pairing state. Must be cheap.
    fn availability(&self) -> ChannelAvailability;

    /// Deliver a serialized [`CompanionContext`].
    async fn deliver(&self, mode: DeliveryMode, blob: Vec<u8>) -> Result<(), DispatchError>;
}

/// Channel that only logs deliveries. Used by the replay service.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingChannel;

#[async_trait]
impl CompanionChannel for LoggingChannel {
    fn availability(&self) -> ChannelAvailability {
        ChannelAvailability::ready()
    }

    async fn deliver(&self, mode: DeliveryMode, blob: Vec<u8>) -> Result<(), DispatchError> {
        info!(
            mode = ?mode,
            context = %String::from_utf8_lossy(&blob),
            "Companion delivery"
        );
        Ok(())
    }
}

/// Channel that records deliveries and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingChannel {
    state: Arc<Mutex<RecordingState>>,
}

#[derive(Debug, Default)]
struct RecordingState {
    availability: ChannelAvailability,
    failure: Option<DispatchError>,
    stall: Option<Duration>,
    deliveries: Vec<(DeliveryMode, CompanionContext)>,
}

impl RecordingChannel {
    pub fn new(availability: ChannelAvailability) -> Self {
        let channel = Self::default();
        channel.set_availability(availability);
        channel
    }

    pub fn set_availability(&self, availability: ChannelAvailability) {
        if let Ok(mut state) = self.state.lock() {
            state.availability = availability;
        }
    }

    /// Make every following delivery fail with `failure` (or succeed on `None`).
    pub fn fail_with(&self, failure: Option<DispatchError>) {
        if let Ok(mut state) = self.state.lock() {
            state.failure = failure;
        }
    }

    /// Make every following delivery hang for `stall` before completing.
    pub fn stall_for(&self, stall: Option<Duration>) {
        if let Ok(mut state) = self.state.lock() {
            state.stall = stall;
        }
    }

    /// Successful deliveries so far.
    pub fn deliveries(&self) -> Vec<(DeliveryMode, CompanionContext)> {
        self.state
            .lock()
            .map(|state| state.deliveries.clone())
            .unwrap_or_default()
    }

    pub fn deliveries_by(&self, mode: DeliveryMode) -> Vec<CompanionContext> {
        self.deliveries()
            .into_iter()
            .filter(|(m, _)| *m == mode)
            .map(|(_, context)| context)
            .collect()
    }
}

#[async_trait]
impl CompanionChannel for RecordingChannel {
    fn availability(&self) -> ChannelAvailability {
        self.state
            .lock()
            .map(|state| state.availability)
            .unwrap_or_default()
    }

    async fn deliver(&self, mode: DeliveryMode, blob: Vec<u8>) -> Result<(), DispatchError> {
        let stall = self.state.lock().ok().and_then(|state| state.stall);
        if let Some(stall) = stall {
            tokio::time::sleep(stall).await;
        }

        let context = CompanionContext::from_blob(&blob)
            .map_err(|e| DispatchError::Serialization(e.to_string()))?;
        let mut state = self
            .state
            .lock()
            .map_err(|_| DispatchError::Transport("recording channel poisoned".to_string()))?;
        if let Some(failure) = state.failure.clone() {
            return Err(failure);
        }
        state.deliveries.push((mode, context));
        Ok(())
    }
}
