//! Link lifecycle scenarios driven through the coordinator handle.

use crate::test_utils::*;
use glucolink_core::{LinkNotification, Transition};
use glucolink_coordinator::CoordinatorEvent;
use glucolink_radio::MessageBody;

#[tokio::test]
async fn test_pump_identifier_establishes_radio_link() {
    let node = TestNode::start();

    let transition = node.handle.set_pump_identifier(Some("123456")).await.unwrap();
    assert!(matches!(transition, Transition::Established { .. }));
    assert_eq!(node.radio.subscriber_count(), 1);

    let snapshot = node.handle.snapshot().await.unwrap();
    assert!(snapshot.radio_ready);
    assert_eq!(snapshot.pump_id.unwrap().as_str(), "123456");

    node.stop().await;
}

#[tokio::test]
async fn test_invalid_identifiers_leave_links_unconfigured() {
    let node = TestNode::start();

    for raw in ["12345", "1234567", ""] {
        let transition = node.handle.set_pump_identifier(Some(raw)).await.unwrap();
        assert_eq!(transition, Transition::Unchanged, "pump id {raw:?}");
        let transition = node.handle.set_transmitter_identifier(Some(raw)).await.unwrap();
        assert_eq!(transition, Transition::Unchanged, "transmitter id {raw:?}");
    }

    let snapshot = node.handle.snapshot().await.unwrap();
    assert!(!snapshot.radio_ready);
    assert!(!snapshot.transmitter_ready);
    assert_eq!(snapshot.pump_id, None);
    assert_eq!(node.radio.subscriber_count(), 0);

    node.stop().await;
}

#[tokio::test]
async fn test_malformed_identifier_tears_down_live_link() {
    let node = TestNode::start();
    node.handle.set_pump_identifier(Some("123456")).await.unwrap();

    let transition = node.handle.set_pump_identifier(Some("12345")).await.unwrap();
    assert!(matches!(transition, Transition::TornDown { .. }));

    let snapshot = node.handle.snapshot().await.unwrap();
    assert!(!snapshot.radio_ready);
    assert_eq!(snapshot.pump_id, None);

    node.stop().await;
}

#[tokio::test]
async fn test_identifier_change_retargets_in_place() {
    let node = TestNode::start();

    let first = node.handle.set_transmitter_identifier(Some("ABCDEF")).await.unwrap();
    let Transition::Established { generation } = first else {
        panic!("expected a new transmitter link, got {first:?}");
    };

    let second = node.handle.set_transmitter_identifier(Some("GHIJKL")).await.unwrap();
    assert_eq!(second, Transition::Retargeted { generation });
    assert_eq!(node.transmitter.subscriber_count(), 1);

    let same = node.handle.set_transmitter_identifier(Some("GHIJKL")).await.unwrap();
    assert_eq!(same, Transition::Unchanged);

    node.stop().await;
}

#[tokio::test]
async fn test_torn_down_link_stops_forwarding() {
    let node = TestNode::start();
    node.handle.set_pump_identifier(Some("123456")).await.unwrap();
    node.handle.set_pump_identifier(None).await.unwrap();

    let radio = &node.radio;
    eventually(|| async move { radio.subscriber_count() == 0 }).await;
    assert!(!node.radio.packet(radio_packet(MessageBody::PumpStatus(pump_status(1.0)))));

    let snapshot = node.handle.snapshot().await.unwrap();
    assert!(snapshot.pump_status.is_none());

    node.stop().await;
}

#[tokio::test]
async fn test_lifecycle_notifications_are_rebroadcast() {
    let node = TestNode::start();
    let mut events = node.handle.subscribe();
    node.handle.set_pump_identifier(Some("123456")).await.unwrap();

    node.handle.connect_device(bridge_device()).unwrap();

    let event = tokio::time::timeout(std::time::Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        event,
        CoordinatorEvent::RadioNotification(LinkNotification::DeviceConnected {
            device: bridge_device()
        })
    );

    node.transmitter.notify(LinkNotification::StatusChanged {
        description: "scanning".to_string(),
    });
    node.handle.set_transmitter_identifier(Some("ABCDEF")).await.unwrap();
    node.transmitter.notify(LinkNotification::StatusChanged {
        description: "connected".to_string(),
    });

    let event = tokio::time::timeout(std::time::Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        event,
        CoordinatorEvent::TransmitterNotification(LinkNotification::StatusChanged {
            description: "connected".to_string()
        })
    );

    node.stop().await;
}
