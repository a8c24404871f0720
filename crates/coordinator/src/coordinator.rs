//! Device coordinator.
//!
//! Owns both link cells, the dedup and throttle baselines and the persisted
//! settings mirror. Every mutation goes through [`DeviceCoordinator::handle`],
//! which the actor task calls for one [`Command`] at a time.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use glucolink_cgm::{GlucoseReading, TransmitterEvent};
use glucolink_companion::{
    CompanionChannel, CompanionSyncCoordinator, DeliveryMode, DispatchCallback, DispatchReport,
    SyncOutcome,
};
use glucolink_core::{
    collections, Config, ConfigurationStore, DeviceId, DiagnosticEntry, DiagnosticSink,
    LinkBinder, LinkIdentifier, LinkSignal, LinkState, PersistedSettings, SessionStartTime,
    TracingDiagnosticSink, Transition,
};
use glucolink_radio::{MessageBody, PacketCategory, PumpStatusReading, RadioBridge, RadioPacket};
use glucolink_telemetry::{PropagationThrottle, StampedGlucose, TelemetryDeduplicator};

use crate::command::{Command, CoordinatorEvent, CoordinatorSnapshot, IgnoreReason, RouteOutcome};
use crate::error::CoordinatorResult;
use crate::factory::DeviceFactory;
use crate::sink::{GlucoseSample, GlucoseSampleSink, SinkError, UnavailableSink};

const EVENT_CAPACITY: usize = 256;

/// Assembles a [`DeviceCoordinator`].
pub struct CoordinatorBuilder<F> {
    factory: F,
    store: Box<dyn ConfigurationStore>,
    channel: Arc<dyn CompanionChannel>,
    samples: Arc<dyn GlucoseSampleSink>,
    diagnostics: Arc<dyn DiagnosticSink>,
    config: Config,
}

impl<F: DeviceFactory> CoordinatorBuilder<F> {
    pub fn new(
        factory: F,
        store: impl ConfigurationStore + 'static,
        channel: Arc<dyn CompanionChannel>,
    ) -> Self {
        Self {
            factory,
            store: Box::new(store),
            channel,
            samples: Arc::new(UnavailableSink),
            diagnostics: Arc::new(TracingDiagnosticSink),
            config: Config::default(),
        }
    }

    pub fn samples(mut self, samples: Arc<dyn GlucoseSampleSink>) -> Self {
        self.samples = samples;
        self
    }

    pub fn diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Build the coordinator feeding `inbox`, and restore persisted settings.
    ///
    /// The coordinator only keeps weak senders; link traffic and dispatch
    /// reports stop once every strong sender of `inbox` is gone. Restoring may
    /// establish links, so this must run inside a tokio runtime.
    pub fn build(
        self,
        inbox: &mpsc::UnboundedSender<Command>,
    ) -> CoordinatorResult<DeviceCoordinator<F>> {
        let saved = self.store.load()?;

        let reports = inbox.downgrade();
        let on_complete: DispatchCallback = Arc::new(move |report| {
            if let Some(inbox) = reports.upgrade() {
                let _ = inbox.send(Command::DispatchCompleted(report));
            }
        });
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let mut coordinator = DeviceCoordinator {
            factory: self.factory,
            radio: LinkState::Unconfigured,
            transmitter: LinkState::Unconfigured,
            radio_binder: LinkBinder::new("radio", inbox, Command::radio),
            transmitter_binder: LinkBinder::new("transmitter", inbox, Command::transmitter),
            dedup: TelemetryDeduplicator::new(),
            throttle: PropagationThrottle::new(self.config.throttle),
            settings: saved.clone(),
            store: self.store,
            companion: CompanionSyncCoordinator::new(self.channel, self.config.companion, on_complete),
            samples: self.samples,
            diagnostics: self.diagnostics,
            events,
            config: self.config,
        };

        info!(
            pump_id = ?saved.pump_id,
            transmitter_id = ?saved.transmitter_id,
            linked_devices = saved.linked_devices.len(),
            "Restoring coordinator settings"
        );
        coordinator.apply_transmitter_identifier(saved.transmitter_id);
        coordinator.apply_pump_identifier(saved.pump_id);
        Ok(coordinator)
    }
}

pub struct DeviceCoordinator<F: DeviceFactory> {
    factory: F,
    radio: LinkState<F::Radio>,
    transmitter: LinkState<F::Transmitter>,
    radio_binder: LinkBinder<RadioPacket, Command>,
    transmitter_binder: LinkBinder<TransmitterEvent, Command>,
    dedup: TelemetryDeduplicator,
    throttle: PropagationThrottle,
    settings: PersistedSettings,
    store: Box<dyn ConfigurationStore>,
    companion: CompanionSyncCoordinator,
    samples: Arc<dyn GlucoseSampleSink>,
    diagnostics: Arc<dyn DiagnosticSink>,
    events: broadcast::Sender<CoordinatorEvent>,
    config: Config,
}

impl<F: DeviceFactory> DeviceCoordinator<F> {
    /// Process one command.
    pub fn handle(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::SetPumpIdentifier { raw, reply } => {
                let transition = self.set_pump_identifier(raw.as_deref());
                if let Some(reply) = reply {
                    let _ = reply.send(transition);
                }
            }
            Command::SetTransmitterIdentifier { raw, reply } => {
                let transition = self.set_transmitter_identifier(raw.as_deref());
                if let Some(reply) = reply {
                    let _ = reply.send(transition);
                }
            }
            Command::ConnectDevice(device) => self.connect_device(device),
            Command::DisconnectDevice(device) => self.disconnect_device(device),
            Command::Radio { generation, signal } => {
                self.handle_radio_signal(generation, signal);
            }
            Command::Transmitter { generation, signal } => {
                self.handle_transmitter_signal(generation, signal);
            }
            Command::DispatchCompleted(report) => self.apply_dispatch_report(report),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown(reply) => {
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Listen for coordinator events.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<CoordinatorEvent> {
        self.events.clone()
    }

    // Configuration

    /// Set or clear the pump identifier. Malformed identifiers clear it.
    pub fn set_pump_identifier(&mut self, raw: Option<&str>) -> Transition {
        self.apply_pump_identifier(LinkIdentifier::normalize(raw))
    }

    fn apply_pump_identifier(&mut self, identifier: Option<LinkIdentifier>) -> Transition {
        let factory = &self.factory;
        let autoconnect = &self.settings.linked_devices;
        let transition = self.radio.set_identifier(
            identifier.clone(),
            &mut self.radio_binder,
            |pump_id| factory.radio_bridge(pump_id, autoconnect),
        );
        self.update_settings(|settings| settings.pump_id = identifier);
        transition
    }

    /// Set or clear the transmitter identifier. Malformed identifiers clear it.
    pub fn set_transmitter_identifier(&mut self, raw: Option<&str>) -> Transition {
        self.apply_transmitter_identifier(LinkIdentifier::normalize(raw))
    }

    fn apply_transmitter_identifier(&mut self, identifier: Option<LinkIdentifier>) -> Transition {
        let factory = &self.factory;
        let session_start = self.settings.session_start;
        let transition = self.transmitter.set_identifier(
            identifier.clone(),
            &mut self.transmitter_binder,
            |transmitter_id| factory.transmitter(transmitter_id, session_start),
        );

        // The anchor belonged to the previous transmitter's session
        let clear_session = matches!(transition, Transition::Retargeted { .. });
        self.update_settings(|settings| {
            settings.transmitter_id = identifier;
            if clear_session {
                settings.session_start = None;
            }
        });
        transition
    }

    /// Remember a radio-bridge peripheral and connect to it.
    pub fn connect_device(&mut self, device: DeviceId) {
        if let Some(radio) = self.radio.resource_mut() {
            radio.connect_device(&device);
        }
        self.update_settings(|settings| {
            settings.linked_devices.insert(device);
        });
    }

    /// Forget a radio-bridge peripheral and disconnect from it.
    pub fn disconnect_device(&mut self, device: DeviceId) {
        if let Some(radio) = self.radio.resource_mut() {
            radio.disconnect_device(&device);
        }
        self.update_settings(|settings| {
            settings.linked_devices.remove(&device);
        });
    }

    fn update_settings(&mut self, change: impl FnOnce(&mut PersistedSettings)) {
        let mut next = self.settings.clone();
        change(&mut next);
        if next == self.settings {
            return;
        }
        self.settings = next;
        if let Err(error) = self.store.save(&self.settings) {
            warn!(error = %error, "Failed to persist link settings");
        }
    }

    // Inbound radio traffic

    fn handle_radio_signal(&mut self, generation: u64, signal: LinkSignal<RadioPacket>) -> RouteOutcome {
        if !self.radio.is_current(generation) {
            debug!(generation, "Dropping signal from released radio bridge");
            return RouteOutcome::Stale;
        }
        match signal {
            LinkSignal::Notification(notification) => {
                self.emit(CoordinatorEvent::RadioNotification(notification));
                RouteOutcome::Rebroadcast
            }
            LinkSignal::Event(packet) => self.route_radio_packet(packet),
        }
    }

    /// Route one decoded radio packet.
    pub fn route_radio_packet(&mut self, packet: RadioPacket) -> RouteOutcome {
        let RadioPacket { device, message } = packet;
        match message.category {
            PacketCategory::Sentry => match message.body {
                MessageBody::PumpStatus(status) => self.update_pump_status(status),
                // TODO: alerts need their own dedup before they can be surfaced
                MessageBody::Alert(_) | MessageBody::AlertCleared(_) => {
                    RouteOutcome::Ignored(IgnoreReason::Alert)
                }
                MessageBody::Unrecognized(body) => {
                    self.diagnostics.record(
                        DiagnosticEntry::builder(collections::SENTRY_OTHER)
                            .fields(body.diagnostic_fields())
                            .field("device", device.to_string())
                            .build(),
                    );
                    RouteOutcome::Logged
                }
                MessageBody::Other { message_type } => {
                    debug!(message_type, "Ignoring sentry message");
                    RouteOutcome::Ignored(IgnoreReason::UnhandledMessage)
                }
            },
            PacketCategory::Meter | PacketCategory::Carelink => {
                RouteOutcome::Ignored(IgnoreReason::UnhandledCategory)
            }
        }
    }

    fn update_pump_status(&mut self, status: PumpStatusReading) -> RouteOutcome {
        if !self.dedup.accept_pump_status(&status) {
            return RouteOutcome::Duplicate;
        }
        info!(
            iob = status.insulin_on_board,
            reservoir = status.reservoir_remaining,
            "Pump status updated"
        );
        self.emit(CoordinatorEvent::PumpStatusUpdated);
        self.sync_companion();
        RouteOutcome::Accepted
    }

    // Inbound transmitter traffic

    fn handle_transmitter_signal(
        &mut self,
        generation: u64,
        signal: LinkSignal<TransmitterEvent>,
    ) -> RouteOutcome {
        if !self.transmitter.is_current(generation) {
            debug!(generation, "Dropping signal from released transmitter");
            return RouteOutcome::Stale;
        }
        match signal {
            LinkSignal::Notification(notification) => {
                self.emit(CoordinatorEvent::TransmitterNotification(notification));
                RouteOutcome::Rebroadcast
            }
            LinkSignal::Event(event) => self.handle_transmitter_event(event),
        }
    }

    /// Handle one transmitter decode result.
    pub fn handle_transmitter_event(&mut self, event: TransmitterEvent) -> RouteOutcome {
        match event.result {
            Err(error) => {
                warn!(error = %error, "Transmitter decode failed");
                self.diagnostics.record(
                    DiagnosticEntry::builder(collections::TRANSMITTER)
                        .field("error", error.to_string())
                        .timestamp_field("collectedAt")
                        .build(),
                );
                RouteOutcome::Logged
            }
            Ok(reading) => {
                self.capture_session_start(event.session_start);
                self.update_glucose(reading)
            }
        }
    }

    fn capture_session_start(&mut self, reported: Option<SessionStartTime>) {
        if reported != self.settings.session_start {
            info!(session_start = ?reported, "Transmitter session anchor changed");
            self.update_settings(|settings| settings.session_start = reported);
        }
    }

    fn update_glucose(&mut self, reading: GlucoseReading) -> RouteOutcome {
        if !self.dedup.accept_glucose(reading) {
            return RouteOutcome::Duplicate;
        }

        let stamped = self.stamp(reading);
        let expensive = self.throttle.recompute(&stamped);
        info!(
            value = reading.value,
            trend = reading.trend,
            state = reading.state,
            expensive,
            "Glucose updated"
        );
        self.emit(CoordinatorEvent::GlucoseUpdated);
        self.write_sample(&stamped);
        self.sync_companion();
        RouteOutcome::Accepted
    }

    fn stamp(&self, reading: GlucoseReading) -> StampedGlucose {
        let absolute = self
            .settings
            .session_start
            .as_ref()
            .map(|start| reading.absolute_time(start));
        StampedGlucose::new(reading, absolute)
    }

    fn write_sample(&self, stamped: &StampedGlucose) {
        let Some(time) = stamped.absolute_time else {
            return;
        };
        if !stamped.reading.is_usable(self.config.companion.min_glucose_state) {
            return;
        }

        let sample = GlucoseSample {
            value: stamped.reading.value,
            trend: stamped.reading.trend,
            time,
            source: self.settings.transmitter_id.as_ref().map(ToString::to_string),
        };
        let sink = Arc::clone(&self.samples);
        let limit = Duration::from_millis(self.config.companion.dispatch_timeout_ms);
        tokio::spawn(async move {
            match tokio::time::timeout(limit, sink.write(sample)).await {
                Ok(Ok(())) => debug!("Glucose sample stored"),
                Ok(Err(SinkError::Unavailable)) => {}
                Ok(Err(error)) => warn!(error = %error, "Glucose sample rejected"),
                Err(_) => warn!(?limit, "Glucose sample write timed out"),
            }
        });
    }

    // Downstream

    fn sync_companion(&mut self) -> SyncOutcome {
        let glucose = self.dedup.glucose();
        let outcome = self.companion.sync(
            self.dedup.pump_status(),
            glucose.as_ref(),
            self.settings.session_start.as_ref(),
            self.throttle.should_use_expensive_channel(),
        );
        if let (SyncOutcome::Spawned(DeliveryMode::Complication), Some(reading)) = (&outcome, glucose)
        {
            let pending = self.stamp(reading);
            self.throttle.begin_dispatch(pending);
        }
        outcome
    }

    /// Apply the outcome of a companion delivery.
    pub fn apply_dispatch_report(&mut self, report: DispatchReport) {
        if report.mode != DeliveryMode::Complication {
            return;
        }
        match report.complication_delivered() {
            Some(delivered) => {
                debug!(value = delivered.reading.value, "Complication baseline updated");
                self.throttle.mark_dispatched(delivered);
            }
            None => {
                debug!("Complication not delivered, channel reopened");
                self.throttle.dispatch_failed();
            }
        }
    }

    fn emit(&self, event: CoordinatorEvent) {
        // No listeners is fine
        let _ = self.events.send(event);
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        let glucose = self.dedup.glucose();
        CoordinatorSnapshot {
            pump_id: self.settings.pump_id.clone(),
            transmitter_id: self.settings.transmitter_id.clone(),
            radio_ready: self.radio.is_ready(),
            transmitter_ready: self.transmitter.is_ready(),
            session_start: self.settings.session_start,
            linked_devices: self.settings.linked_devices.clone(),
            pump_status: self.dedup.pump_status().cloned(),
            glucose,
            glucose_time: glucose.and_then(|reading| self.stamp(reading).absolute_time),
            use_expensive_channel: self.throttle.should_use_expensive_channel(),
            last_complication: self.throttle.last_complication().copied(),
            complication_in_flight: self.throttle.in_flight().is_some(),
            throttle_recomputes: self.throttle.recompute_count(),
            dedup: *self.dedup.metrics(),
        }
    }

    pub fn radio(&self) -> &LinkState<F::Radio> {
        &self.radio
    }

    pub fn transmitter(&self) -> &LinkState<F::Transmitter> {
        &self.transmitter
    }
}
