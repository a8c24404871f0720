//! Health-data sample sink.
//!
//! Accepted, usable glucose readings are offered to a health-data store.
//! The store is a pass-through: it takes the write or refuses it, and an
//! unavailable store just means the feature is off.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// One glucose sample for the health-data store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlucoseSample {
    /// Glucose, mg/dL
    pub value: u16,
    pub trend: i8,
    /// Absolute time of the reading
    pub time: DateTime<Utc>,
    /// Transmitter that produced the reading
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// No store on this host, or not authorized
    #[error("health store unavailable")]
    Unavailable,

    /// Store refused the sample
    #[error("sample rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait GlucoseSampleSink: Send + Sync {
    async fn write(&self, sample: GlucoseSample) -> Result<(), SinkError>;
}

/// Sink for hosts without a health-data store.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableSink;

#[async_trait]
impl GlucoseSampleSink for UnavailableSink {
    async fn write(&self, _sample: GlucoseSample) -> Result<(), SinkError> {
        Err(SinkError::Unavailable)
    }
}

/// Keeps samples in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySampleSink {
    samples: Arc<Mutex<Vec<GlucoseSample>>>,
}

impl MemorySampleSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> Vec<GlucoseSample> {
        self.samples
            .lock()
            .map(|samples| samples.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl GlucoseSampleSink for MemorySampleSink {
    async fn write(&self, sample: GlucoseSample) -> Result<(), SinkError> {
        let mut samples = self
            .samples
            .lock()
            .map_err(|_| SinkError::Rejected("sample store poisoned".to_string()))?;
        samples.push(sample);
        Ok(())
    }
}
