//! Diagnostic event schema.
//!
//! Packets the coordinator does not understand and transmitter decode failures
//! are not errors for the caller, but they are worth keeping. They are written
//! as flat string maps into named collections of a [`DiagnosticSink`].

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Well-known diagnostic collection names.
pub mod collections {
    /// Radio packets in the sentry category with an unrecognized body
    pub const SENTRY_OTHER: &str = "sentryOther";
    /// Transmitter decode failures
    pub const TRANSMITTER: &str = "g5";
}

/// A single diagnostic log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticEntry {
    /// Collection the entry belongs to
    pub collection: String,
    /// Flat key/value payload
    pub fields: BTreeMap<String, String>,
    /// When the entry was produced
    pub recorded_at: DateTime<Utc>,
}

impl DiagnosticEntry {
    /// Start building an entry for `collection`.
    pub fn builder(collection: impl Into<String>) -> DiagnosticEntryBuilder {
        DiagnosticEntryBuilder::new(collection)
    }

    /// Get a field by key.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Builder for creating diagnostic entries.
pub struct DiagnosticEntryBuilder {
    entry: DiagnosticEntry,
}

impl DiagnosticEntryBuilder {
    /// Create a new builder stamped with the current time.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            entry: DiagnosticEntry {
                collection: collection.into(),
                fields: BTreeMap::new(),
                recorded_at: Utc::now(),
            },
        }
    }

    /// Add a field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entry.fields.insert(key.into(), value.into());
        self
    }

    /// Add all fields of a map.
    pub fn fields(mut self, fields: BTreeMap<String, String>) -> Self {
        self.entry.fields.extend(fields);
        self
    }

    /// Add the recording time as an RFC 3339 field.
    pub fn timestamp_field(self, key: impl Into<String>) -> Self {
        let stamp = self
            .entry
            .recorded_at
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        self.field(key, stamp)
    }

    /// Override the recording time.
    pub fn recorded_at(mut self, at: DateTime<Utc>) -> Self {
        self.entry.recorded_at = at;
        self
    }

    /// Build the entry.
    pub fn build(self) -> DiagnosticEntry {
        self.entry
    }
}

/// Destination for diagnostic entries.
pub trait DiagnosticSink: Send + Sync {
    /// Record an entry. Must not block for long.
    fn record(&self, entry: DiagnosticEntry);
}

/// Writes diagnostic entries to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnosticSink;

impl DiagnosticSink for TracingDiagnosticSink {
    fn record(&self, entry: DiagnosticEntry) {
        let fields = serde_json::to_string(&entry.fields).unwrap_or_default();
        tracing::info!(
            target: "glucolink::diagnostics",
            collection = %entry.collection,
            recorded_at = %entry.recorded_at,
            fields = %fields,
            "Diagnostic entry"
        );
    }
}

/// In-memory sink, mainly for tests and the replay service summary.
#[derive(Debug, Default, Clone)]
pub struct MemoryDiagnosticSink {
    entries: Arc<Mutex<Vec<DiagnosticEntry>>>,
}

impl MemoryDiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded entry.
    pub fn entries(&self) -> Vec<DiagnosticEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Entries belonging to `collection`.
    pub fn in_collection(&self, collection: &str) -> Vec<DiagnosticEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.collection == collection)
            .collect()
    }
}

impl DiagnosticSink for MemoryDiagnosticSink {
    fn record(&self, entry: DiagnosticEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}
