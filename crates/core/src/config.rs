//! Configuration management for glucolink.

use serde::{Deserialize, Serialize};
#[cfg(feature = "file-store")]
use std::path::Path;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub throttle: ThrottleConfig,
    pub companion: CompanionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Location of the persisted link settings
    pub settings_path: PathBuf,
}

/// Thresholds for the complication throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Minimum seconds between complication updates
    pub min_interval_secs: i64,
    /// Glucose change (mg/dL) that forces an early complication update
    pub min_delta: u16,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    /// Readings at or below this state code are withheld from the companion
    pub min_glucose_state: u8,
    /// Upper bound for a single delivery attempt
    pub dispatch_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            settings_path: PathBuf::from("glucolink-settings.toml"),
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: 30 * 60,
            min_delta: 20,
        }
    }
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            min_glucose_state: 5,
            dispatch_timeout_ms: 5_000,
        }
    }
}

impl Config {
    #[cfg(feature = "file-store")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self::default()
    }
}
