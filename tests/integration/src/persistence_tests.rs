//! Link settings surviving a coordinator restart.

use crate::test_utils::*;
use glucolink_companion::ChannelAvailability;
use glucolink_core::{ConfigurationStore, DeviceId, MemoryStore, PersistedSettings, TomlFileStore};
use tempfile::TempDir;

fn file_store(dir: &TempDir) -> TomlFileStore {
    TomlFileStore::new(dir.path().join("settings.toml"))
}

#[tokio::test]
async fn test_settings_restored_after_restart() {
    let dir = TempDir::new().unwrap();

    let node = TestNode::start_with(file_store(&dir), ChannelAvailability::ready());
    node.handle.set_pump_identifier(Some("123456")).await.unwrap();
    node.handle.set_transmitter_identifier(Some("ABCDEF")).await.unwrap();
    node.handle.connect_device(bridge_device()).unwrap();
    node.send_reading(glucose(110, 120, 6), Some(session_start()));
    node.wait_for(|s| s.session_start.is_some()).await;
    node.stop().await;

    let saved = file_store(&dir).load().unwrap();
    assert_eq!(saved.pump_id.as_ref().map(|id| id.as_str()), Some("123456"));
    assert_eq!(saved.session_start, Some(session_start()));

    let node = TestNode::start_with(file_store(&dir), ChannelAvailability::ready());
    let snapshot = node.handle.snapshot().await.unwrap();
    assert!(snapshot.radio_ready);
    assert!(snapshot.transmitter_ready);
    assert_eq!(snapshot.transmitter_id.unwrap().as_str(), "ABCDEF");
    assert!(snapshot.linked_devices.contains(&bridge_device()));
    assert_eq!(snapshot.session_start, Some(session_start()));

    // Baselines are not persisted
    assert!(snapshot.glucose.is_none());
    assert!(!snapshot.use_expensive_channel);
    assert!(snapshot.last_complication.is_none());
    assert_eq!(node.radio.subscriber_count(), 1);
    assert_eq!(node.transmitter.subscriber_count(), 1);

    node.stop().await;
}

#[tokio::test]
async fn test_restored_session_dates_first_reading() {
    let store = MemoryStore::with_settings(PersistedSettings {
        transmitter_id: glucolink_core::LinkIdentifier::parse("ABCDEF"),
        session_start: Some(session_start()),
        ..PersistedSettings::default()
    });
    let node = TestNode::start_with(store, ChannelAvailability::ready());

    // The transmitter has not re-reported its anchor yet
    node.send_reading(glucose(140, 3600, 6), Some(session_start()));

    let snapshot = node.wait_for(|s| s.glucose.is_some()).await;
    assert_eq!(snapshot.glucose_time, Some(at(3600)));

    node.stop().await;
}

#[tokio::test]
async fn test_connect_disconnect_persisted() {
    let store = MemoryStore::new();
    let node = TestNode::start_with(store.clone(), ChannelAvailability::ready());
    node.handle.set_pump_identifier(Some("123456")).await.unwrap();

    let other = DeviceId::new("rileylink-b2");
    node.handle.connect_device(bridge_device()).unwrap();
    node.handle.connect_device(other.clone()).unwrap();
    node.wait_for(|s| s.linked_devices.len() == 2).await;
    assert_eq!(store.settings().linked_devices.len(), 2);

    node.handle.disconnect_device(bridge_device()).unwrap();
    let snapshot = node.wait_for(|s| s.linked_devices.len() == 1).await;
    assert!(snapshot.linked_devices.contains(&other));
    assert!(!store.settings().linked_devices.contains(&bridge_device()));

    // Repeating a disconnect changes nothing and writes nothing
    let saves = store.save_count();
    node.handle.disconnect_device(bridge_device()).unwrap();
    node.handle.snapshot().await.unwrap();
    assert_eq!(store.save_count(), saves);

    node.stop().await;
}

#[tokio::test]
async fn test_linked_devices_remembered_without_radio() {
    let store = MemoryStore::new();
    let node = TestNode::start_with(store.clone(), ChannelAvailability::ready());

    node.handle.connect_device(bridge_device()).unwrap();
    node.wait_for(|s| !s.linked_devices.is_empty()).await;
    node.stop().await;

    let node = TestNode::start_with(store, ChannelAvailability::ready());
    let snapshot = node.handle.snapshot().await.unwrap();
    assert!(!snapshot.radio_ready);
    assert!(snapshot.linked_devices.contains(&bridge_device()));

    node.stop().await;
}

#[tokio::test]
async fn test_transmitter_change_clears_saved_session() {
    let store = MemoryStore::with_settings(PersistedSettings {
        transmitter_id: glucolink_core::LinkIdentifier::parse("ABCDEF"),
        session_start: Some(session_start()),
        ..PersistedSettings::default()
    });
    let node = TestNode::start_with(store.clone(), ChannelAvailability::ready());

    node.handle.set_transmitter_identifier(Some("FEDCBA")).await.unwrap();
    let snapshot = node.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.session_start, None);
    assert_eq!(store.settings().session_start, None);
    assert_eq!(
        store.settings().transmitter_id.map(|id| id.to_string()),
        Some("FEDCBA".to_string())
    );

    node.stop().await;
}
