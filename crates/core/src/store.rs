//! Persisted link settings.
//!
//! The coordinator mirrors these scalars in memory and writes the full set
//! through on every change. Stores only need to round-trip the struct.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::error::StoreError;
use crate::types::{LinkIdentifier, LinkedDeviceSet, SessionStartTime};

/// Scalars that survive a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedSettings {
    /// Pump identifier driving the radio-bridge link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pump_id: Option<LinkIdentifier>,
    /// Transmitter identifier driving the glucose link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmitter_id: Option<LinkIdentifier>,
    /// Anchor of the transmitter's current session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_start: Option<SessionStartTime>,
    /// Radio-bridge devices to reconnect automatically
    pub linked_devices: LinkedDeviceSet,
}

/// Persistent key-value storage for [`PersistedSettings`].
pub trait ConfigurationStore: Send {
    /// Load the last saved settings, or defaults when nothing was saved yet.
    fn load(&self) -> Result<PersistedSettings, StoreError>;

    /// Replace the saved settings.
    fn save(&mut self, settings: &PersistedSettings) -> Result<(), StoreError>;
}

/// Process-local store. Clones share the same settings.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreState>>,
}

#[derive(Debug, Default)]
struct MemoryStoreState {
    settings: PersistedSettings,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `settings`, as if saved by a previous run.
    pub fn with_settings(settings: PersistedSettings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStoreState { settings, saves: 0 })),
        }
    }

    /// Current saved settings.
    pub fn settings(&self) -> PersistedSettings {
        self.inner
            .lock()
            .map(|state| state.settings.clone())
            .unwrap_or_default()
    }

    /// Number of `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.inner.lock().map(|state| state.saves).unwrap_or(0)
    }
}

impl ConfigurationStore for MemoryStore {
    fn load(&self) -> Result<PersistedSettings, StoreError> {
        Ok(self.settings())
    }

    fn save(&mut self, settings: &PersistedSettings) -> Result<(), StoreError> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| StoreError::Encode("memory store poisoned".to_string()))?;
        state.settings = settings.clone();
        state.saves += 1;
        Ok(())
    }
}

#[cfg(feature = "file-store")]
pub use file::TomlFileStore;

#[cfg(feature = "file-store")]
mod file {
    use super::*;
    use std::path::{Path, PathBuf};

    /// Settings kept in a TOML file. A missing file loads as defaults.
    #[derive(Debug, Clone)]
    pub struct TomlFileStore {
        path: PathBuf,
    }

    impl TomlFileStore {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl ConfigurationStore for TomlFileStore {
        fn load(&self) -> Result<PersistedSettings, StoreError> {
            match std::fs::read_to_string(&self.path) {
                Ok(content) => {
                    toml::from_str(&content).map_err(|e| StoreError::Decode(e.to_string()))
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Ok(PersistedSettings::default())
                }
                Err(e) => Err(e.into()),
            }
        }

        fn save(&mut self, settings: &PersistedSettings) -> Result<(), StoreError> {
            let content =
                toml::to_string(settings).map_err(|e| StoreError::Encode(e.to_string()))?;
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            // Write beside the target and rename so a crash never leaves half a file
            let staging = self.path.with_extension("toml.tmp");
            std::fs::write(&staging, content)?;
            std::fs::rename(&staging, &self.path)?;
            Ok(())
        }
    }
}
