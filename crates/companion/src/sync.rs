//! Companion sync coordinator.
//!
//! Builds the context, picks the channel, and spawns a single bounded
//! delivery attempt. The caller never waits for delivery; the outcome comes
//! back through a completion callback so the throttle baseline can be
//! updated on the caller's own thread of control.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use glucolink_cgm::GlucoseReading;
use glucolink_core::{CompanionConfig, SessionStartTime};
use glucolink_radio::PumpStatusReading;
use glucolink_telemetry::StampedGlucose;

use crate::channel::{CompanionChannel, DeliveryMode, DispatchError};
use crate::context::CompanionContext;

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub mode: DeliveryMode,
    /// Glucose reading the context was built from
    pub glucose: Option<StampedGlucose>,
    pub result: Result<(), DispatchError>,
}

impl DispatchReport {
    /// A successful complication delivery, the only kind that moves the
    /// throttle baseline.
    pub fn complication_delivered(&self) -> Option<StampedGlucose> {
        match (&self.mode, &self.result) {
            (DeliveryMode::Complication, Ok(())) => self.glucose,
            _ => None,
        }
    }
}

/// What `sync` did synchronously.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Companion not paired or app missing; nothing attempted
    Inactive,
    /// Delivery spawned on the given channel
    Spawned(DeliveryMode),
    /// Failed before anything was spawned
    Failed(DispatchError),
}

/// Completion callback for spawned deliveries.
pub type DispatchCallback = Arc<dyn Fn(DispatchReport) + Send + Sync>;

pub struct CompanionSyncCoordinator {
    channel: Arc<dyn CompanionChannel>,
    config: CompanionConfig,
    on_complete: DispatchCallback,
}

impl CompanionSyncCoordinator {
    pub fn new(
        channel: Arc<dyn CompanionChannel>,
        config: CompanionConfig,
        on_complete: DispatchCallback,
    ) -> Self {
        Self {
            channel,
            config,
            on_complete,
        }
    }

    fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.config.dispatch_timeout_ms)
    }

    /// Sync the companion with the current readings.
    ///
    /// `use_expensive_channel` is the throttle's current decision. Must be
    /// called from within a tokio runtime.
    pub fn sync(
        &self,
        pump_status: Option<&PumpStatusReading>,
        glucose: Option<&GlucoseReading>,
        session_start: Option<&SessionStartTime>,
        use_expensive_channel: bool,
    ) -> SyncOutcome {
        let availability = self.channel.availability();
        if !availability.is_available() {
            debug!(?availability, "Companion unavailable, skipping sync");
            return SyncOutcome::Inactive;
        }

        let context = CompanionContext::build(
            pump_status,
            glucose,
            session_start,
            self.config.min_glucose_state,
        );
        let blob = match context.to_blob() {
            Ok(blob) => blob,
            Err(e) => {
                let error = DispatchError::Serialization(e.to_string());
                warn!(error = %error, "Companion context serialization failed");
                return SyncOutcome::Failed(error);
            }
        };

        let mode = if availability.complication_enabled
            && use_expensive_channel
            && glucose.is_some()
        {
            DeliveryMode::Complication
        } else {
            DeliveryMode::ApplicationContext
        };
        let stamped = glucose.map(|reading| {
            StampedGlucose::new(*reading, session_start.map(|s| reading.absolute_time(s)))
        });

        let channel = Arc::clone(&self.channel);
        let on_complete = Arc::clone(&self.on_complete);
        let limit = self.dispatch_timeout();
        tokio::spawn(async move {
            let result = match tokio::time::timeout(limit, channel.deliver(mode, blob)).await {
                Ok(result) => result,
                Err(_) => Err(DispatchError::Timeout(limit)),
            };
            match &result {
                Ok(()) => debug!(?mode, "Companion delivery complete"),
                Err(error) => warn!(?mode, error = %error, "Companion delivery failed"),
            }
            on_complete(DispatchReport {
                mode,
                glucose: stamped,
                result,
            });
        });

        SyncOutcome::Spawned(mode)
    }
}
