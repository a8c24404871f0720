//! Core functionality for the glucolink device coordinator.
//!
//! This crate provides the fundamental types, traits, and utilities shared by
//! the radio bridge, transmitter, telemetry and coordinator crates: link
//! identifiers, the generic two-state link cell, persisted settings and the
//! diagnostic sink.

pub mod config;
pub mod error;
pub mod event;
pub mod link;
pub mod logging;
pub mod store;
pub mod types;

pub use config::{CompanionConfig, Config, LoggingConfig, StorageConfig, ThrottleConfig};
pub use error::StoreError;
pub use event::{
    collections, DiagnosticEntry, DiagnosticEntryBuilder, DiagnosticSink, MemoryDiagnosticSink,
    TracingDiagnosticSink,
};
pub use link::{
    ActiveLink, LinkBinder, LinkNotification, LinkResource, LinkSignal, LinkState, Subscriptions,
    Transition,
};
pub use store::{ConfigurationStore, MemoryStore, PersistedSettings};
#[cfg(feature = "file-store")]
pub use store::TomlFileStore;
pub use types::{DeviceId, LinkIdentifier, LinkedDeviceSet, SessionStartTime, LINK_IDENTIFIER_LEN};
