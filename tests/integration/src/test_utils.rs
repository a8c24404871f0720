//! Test utilities for coordinator scenarios

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};

use glucolink_cgm::{GlucoseReading, TransmitterEvent, TransmitterFeeder};
use glucolink_companion::{ChannelAvailability, RecordingChannel};
use glucolink_core::{ConfigurationStore, DeviceId, MemoryDiagnosticSink, MemoryStore, SessionStartTime};
use glucolink_coordinator::{
    CoordinatorBuilder, CoordinatorHandle, CoordinatorSnapshot, LoopbackFactory, MemorySampleSink,
};
use glucolink_radio::{MessageBody, PumpMessage, PumpStatusReading, RadioFeeder, RadioPacket};

const WAIT_LIMIT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("glucolink=debug")
        .with_test_writer()
        .try_init();
}

/// A running coordinator plus every observation point around it.
pub struct TestNode {
    pub handle: CoordinatorHandle,
    pub task: JoinHandle<()>,
    pub radio: RadioFeeder,
    pub transmitter: TransmitterFeeder,
    pub channel: RecordingChannel,
    pub diagnostics: MemoryDiagnosticSink,
    pub samples: MemorySampleSink,
}

impl TestNode {
    /// Start with an empty in-memory store and a fully ready companion.
    pub fn start() -> Self {
        Self::start_with(MemoryStore::new(), ChannelAvailability::ready())
    }

    pub fn start_with(
        store: impl ConfigurationStore + 'static,
        availability: ChannelAvailability,
    ) -> Self {
        init_tracing();
        let factory = LoopbackFactory::new();
        let radio = factory.radio_feeder();
        let transmitter = factory.transmitter_feeder();
        let channel = RecordingChannel::new(availability);
        let diagnostics = MemoryDiagnosticSink::new();
        let samples = MemorySampleSink::new();

        let builder = CoordinatorBuilder::new(factory, store, Arc::new(channel.clone()))
            .samples(Arc::new(samples.clone()))
            .diagnostics(Arc::new(diagnostics.clone()));
        let (handle, task) = glucolink_coordinator::spawn(builder).unwrap();

        Self {
            handle,
            task,
            radio,
            transmitter,
            channel,
            diagnostics,
            samples,
        }
    }

    /// Poll snapshots until `predicate` holds, panicking after the wait limit.
    pub async fn wait_for<P>(&self, predicate: P) -> CoordinatorSnapshot
    where
        P: Fn(&CoordinatorSnapshot) -> bool,
    {
        let handle = self.handle.clone();
        timeout(WAIT_LIMIT, async move {
            loop {
                let snapshot = handle.snapshot().await.unwrap();
                if predicate(&snapshot) {
                    return snapshot;
                }
                sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .expect("coordinator never reached the expected state")
    }

    pub async fn stop(self) {
        self.handle.shutdown().await.unwrap();
        self.task.await.unwrap();
    }

    pub fn send_packet(&self, body: MessageBody) {
        assert!(self.radio.packet(radio_packet(body)), "radio link not subscribed");
    }

    pub fn send_reading(&self, reading: GlucoseReading, session: Option<SessionStartTime>) {
        assert!(
            self.transmitter.event(TransmitterEvent::reading(reading, session)),
            "transmitter link not subscribed"
        );
    }
}

/// Wait until a plain condition holds.
pub async fn eventually<F, Fut>(condition: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    timeout(WAIT_LIMIT, async {
        while !condition().await {
            sleep(POLL_INTERVAL).await;
        }
    })
    .await
    .expect("condition never held");
}

pub fn session_start() -> SessionStartTime {
    SessionStartTime(Utc.with_ymd_and_hms(2024, 3, 14, 8, 0, 0).unwrap())
}

pub fn at(offset_secs: u32) -> DateTime<Utc> {
    session_start().resolve(offset_secs)
}

pub fn pump_status(iob: f64) -> PumpStatusReading {
    PumpStatusReading {
        insulin_on_board: iob,
        reservoir_remaining: 142.0,
        pump_time: NaiveDate::from_ymd_opt(2024, 3, 14)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap(),
        battery_percent: Some(80),
        glucose: None,
    }
}

pub fn glucose(value: u16, relative_time: u32, state: u8) -> GlucoseReading {
    GlucoseReading {
        value,
        trend: 0,
        relative_time,
        state,
    }
}

pub fn radio_packet(body: MessageBody) -> RadioPacket {
    RadioPacket {
        device: bridge_device(),
        message: PumpMessage::sentry(body),
    }
}

pub fn bridge_device() -> DeviceId {
    DeviceId::new("rileylink-a1")
}
