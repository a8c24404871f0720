//! Pump and glucose telemetry reaching the companion display and sinks.

use crate::test_utils::*;
use glucolink_cgm::{DecodeError, TransmitterEvent};
use glucolink_companion::{ChannelAvailability, DeliveryMode};
use glucolink_core::{collections, MemoryStore};
use glucolink_coordinator::CoordinatorEvent;
use glucolink_radio::{AlertBody, MessageBody, UnknownBody};

#[tokio::test]
async fn test_pump_status_broadcast_once() {
    let node = TestNode::start();
    let mut events = node.handle.subscribe();
    node.handle.set_pump_identifier(Some("123456")).await.unwrap();

    node.send_packet(MessageBody::PumpStatus(pump_status(2.1)));
    node.send_packet(MessageBody::PumpStatus(pump_status(2.1)));

    let snapshot = node
        .wait_for(|s| s.dedup.pump_status_accepted + s.dedup.pump_status_duplicates == 2)
        .await;
    assert_eq!(snapshot.dedup.pump_status_accepted, 1);
    assert_eq!(snapshot.pump_status.unwrap().insulin_on_board, 2.1);

    assert_eq!(events.recv().await.unwrap(), CoordinatorEvent::PumpStatusUpdated);
    assert!(events.try_recv().is_err());

    let channel = &node.channel;
    eventually(|| async move { !channel.deliveries().is_empty() }).await;
    let contexts = node.channel.deliveries_by(DeliveryMode::ApplicationContext);
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].insulin_on_board, Some(2.1));
    assert_eq!(contexts[0].reservoir_remaining, Some(142.0));

    node.stop().await;
}

#[tokio::test]
async fn test_glucose_broadcast_once() {
    let node = TestNode::start();
    let mut events = node.handle.subscribe();
    node.handle.set_transmitter_identifier(Some("ABCDEF")).await.unwrap();

    node.send_reading(glucose(118, 0, 6), Some(session_start()));
    node.send_reading(glucose(118, 0, 6), Some(session_start()));

    let snapshot = node
        .wait_for(|s| s.dedup.glucose_accepted + s.dedup.glucose_duplicates == 2)
        .await;
    assert_eq!(snapshot.dedup.glucose_accepted, 1);
    assert_eq!(snapshot.throttle_recomputes, 1);

    assert_eq!(events.recv().await.unwrap(), CoordinatorEvent::GlucoseUpdated);
    assert!(events.try_recv().is_err());

    let channel = &node.channel;
    eventually(|| async move { !channel.deliveries().is_empty() }).await;
    assert_eq!(node.channel.deliveries().len(), 1);

    node.stop().await;
}

#[tokio::test]
async fn test_first_glucose_goes_to_complication() {
    let node = TestNode::start();
    node.handle.set_transmitter_identifier(Some("ABCDEF")).await.unwrap();

    node.send_reading(glucose(118, 0, 6), Some(session_start()));

    let channel = &node.channel;
    eventually(|| async move { !channel.deliveries().is_empty() }).await;
    let complications = node.channel.deliveries_by(DeliveryMode::Complication);
    assert_eq!(complications.len(), 1);
    assert_eq!(complications[0].glucose_value, Some(118));
    assert_eq!(complications[0].glucose_absolute_time, Some(session_start().0));

    let snapshot = node.wait_for(|s| s.last_complication.is_some()).await;
    assert!(!snapshot.use_expensive_channel);
    assert_eq!(snapshot.session_start, Some(session_start()));
    assert_eq!(snapshot.glucose_time, Some(at(0)));

    node.stop().await;
}

#[tokio::test]
async fn test_throttle_holds_back_small_changes() {
    let node = TestNode::start();
    node.handle.set_transmitter_identifier(Some("ABCDEF")).await.unwrap();

    node.send_reading(glucose(118, 0, 6), Some(session_start()));
    node.wait_for(|s| s.last_complication.is_some()).await;

    // Five minutes later, 4 mg/dL change
    node.send_reading(glucose(122, 300, 6), Some(session_start()));
    let channel = &node.channel;
    eventually(|| async move { channel.deliveries().len() == 2 }).await;
    assert_eq!(node.channel.deliveries_by(DeliveryMode::Complication).len(), 1);
    let cheap = node.channel.deliveries_by(DeliveryMode::ApplicationContext);
    assert_eq!(cheap[0].glucose_value, Some(122));

    // 30 minutes after the last complication
    node.send_reading(glucose(125, 1800, 6), Some(session_start()));
    eventually(|| async move { channel.deliveries().len() == 3 }).await;
    assert_eq!(node.channel.deliveries_by(DeliveryMode::Complication).len(), 2);

    let snapshot = node.wait_for(|s| s.throttle_recomputes == 3).await;
    assert_eq!(snapshot.last_complication.unwrap().reading.value, 125);

    node.stop().await;
}

#[tokio::test]
async fn test_low_validity_glucose_withheld() {
    let node = TestNode::start();
    node.handle.set_transmitter_identifier(Some("ABCDEF")).await.unwrap();

    node.send_reading(glucose(40, 0, 5), Some(session_start()));

    let channel = &node.channel;
    eventually(|| async move { !channel.deliveries().is_empty() }).await;
    let (_, context) = node.channel.deliveries().remove(0);
    assert!(!context.has_glucose());

    let snapshot = node.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.glucose.unwrap().value, 40);
    assert!(node.samples.samples().is_empty());

    node.stop().await;
}

#[tokio::test]
async fn test_glucose_without_session_has_no_date() {
    let node = TestNode::start();
    node.handle.set_transmitter_identifier(Some("ABCDEF")).await.unwrap();

    node.send_reading(glucose(130, 600, 7), None);

    let channel = &node.channel;
    eventually(|| async move { !channel.deliveries().is_empty() }).await;
    let (_, context) = node.channel.deliveries().remove(0);
    assert!(!context.has_glucose());

    let snapshot = node.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.glucose_time, None);
    assert_eq!(snapshot.session_start, None);

    node.stop().await;
}

#[tokio::test]
async fn test_complication_disabled_falls_back_to_context() {
    let node = TestNode::start_with(
        MemoryStore::new(),
        ChannelAvailability {
            paired: true,
            app_installed: true,
            complication_enabled: false,
        },
    );
    node.handle.set_transmitter_identifier(Some("ABCDEF")).await.unwrap();

    node.send_reading(glucose(150, 0, 6), Some(session_start()));

    let channel = &node.channel;
    eventually(|| async move { !channel.deliveries().is_empty() }).await;
    let contexts = node.channel.deliveries_by(DeliveryMode::ApplicationContext);
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].glucose_value, Some(150));

    // Never reached the complication, so the next reading still wants it
    let snapshot = node.handle.snapshot().await.unwrap();
    assert!(snapshot.use_expensive_channel);
    assert!(snapshot.last_complication.is_none());

    node.stop().await;
}

#[tokio::test]
async fn test_unpaired_companion_gets_nothing() {
    let node = TestNode::start_with(MemoryStore::new(), ChannelAvailability::default());
    node.handle.set_pump_identifier(Some("123456")).await.unwrap();

    node.send_packet(MessageBody::PumpStatus(pump_status(0.4)));
    node.wait_for(|s| s.pump_status.is_some()).await;

    assert!(node.channel.deliveries().is_empty());
    node.stop().await;
}

#[tokio::test]
async fn test_usable_glucose_reaches_sample_sink() {
    let node = TestNode::start();
    node.handle.set_transmitter_identifier(Some("ABCDEF")).await.unwrap();

    node.send_reading(glucose(97, 900, 6), Some(session_start()));

    let samples = &node.samples;
    eventually(|| async move { !samples.samples().is_empty() }).await;
    let sample = node.samples.samples().remove(0);
    assert_eq!(sample.value, 97);
    assert_eq!(sample.time, at(900));
    assert_eq!(sample.source.as_deref(), Some("ABCDEF"));

    node.stop().await;
}

#[tokio::test]
async fn test_unrecognized_packet_is_recorded() {
    let node = TestNode::start();
    node.handle.set_pump_identifier(Some("123456")).await.unwrap();

    node.send_packet(MessageBody::Unrecognized(UnknownBody {
        message_type: 0x2a,
        raw: vec![0x01, 0xff],
    }));

    let diagnostics = &node.diagnostics;
    eventually(|| async move { !diagnostics.entries().is_empty() }).await;
    let entries = node.diagnostics.in_collection(collections::SENTRY_OTHER);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].field("messageType"), Some("0x2a"));
    assert_eq!(entries[0].field("rawData"), Some("01ff"));

    node.stop().await;
}

#[tokio::test]
async fn test_alerts_do_not_touch_state() {
    let node = TestNode::start();
    node.handle.set_pump_identifier(Some("123456")).await.unwrap();

    node.send_packet(MessageBody::Alert(AlertBody {
        alert_type: 3,
        raw: vec![0x03],
    }));
    node.send_packet(MessageBody::PumpStatus(pump_status(1.2)));

    // Status sent after the alert proves the alert was already handled
    let snapshot = node.wait_for(|s| s.pump_status.is_some()).await;
    assert_eq!(snapshot.dedup.pump_status_accepted, 1);
    assert!(node.diagnostics.entries().is_empty());

    node.stop().await;
}

#[tokio::test]
async fn test_decode_error_is_recorded() {
    let node = TestNode::start();
    node.handle.set_transmitter_identifier(Some("ABCDEF")).await.unwrap();

    assert!(node.transmitter.event(TransmitterEvent::error(
        DecodeError::Truncated {
            expected: 19,
            actual: 7
        },
        None,
    )));

    let diagnostics = &node.diagnostics;
    eventually(|| async move { !diagnostics.entries().is_empty() }).await;
    let entries = node.diagnostics.in_collection(collections::TRANSMITTER);
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].field("error"),
        Some("truncated message: expected 19 bytes, got 7")
    );
    assert!(entries[0].field("collectedAt").unwrap().ends_with('Z'));
    assert!(node.handle.snapshot().await.unwrap().glucose.is_none());

    node.stop().await;
}
