//! Persisted UI preferences.
//!
//! Values are stored as strings under fixed keys, the way a browser's
//! `localStorage` holds them, so the same keys work for the web page and
//! the native player.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::ToneError;
use crate::params::{
    AudioParameters, DEFAULT_FREQUENCY, DEFAULT_Q_FACTOR, DEFAULT_VOLUME, clamp_frequency,
    clamp_q_factor, clamp_volume, volume_to_gain,
};

pub const FREQUENCY_KEY: &str = "frequency";
pub const VOLUME_KEY: &str = "volume";
pub const Q_FACTOR_KEY: &str = "q-factor";

/// String key/value storage.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, ToneError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), ToneError>;
}

/// Volatile store, for tests and hosts without persistence.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, ToneError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ToneError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a single JSON object on disk, rewritten on every `set`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open `path`, treating a missing or empty file as an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ToneError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                ToneError::Preferences(format!("Failed to parse {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(ToneError::Preferences(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };
        debug!("opened preference store {}", path.display());
        Ok(JsonFileStore { path, values })
    }

    /// `preferences.json` in the platform's per-user config directory.
    #[cfg(feature = "native")]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("net", "tonefinder", "tonefinder")
            .map(|dirs| dirs.config_dir().join("preferences.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), ToneError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl PreferenceStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, ToneError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ToneError> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }
}

/// The three user controls, in UI units (volume is a slider position, not gain).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub frequency: f64,
    pub volume: f64,
    #[serde(rename = "q-factor")]
    pub q_factor: f64,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            frequency: DEFAULT_FREQUENCY,
            volume: DEFAULT_VOLUME,
            q_factor: DEFAULT_Q_FACTOR,
        }
    }
}

impl Preferences {
    /// Read every key, keeping the default for anything missing or unreadable.
    pub fn load(store: &dyn PreferenceStore) -> Result<Self, ToneError> {
        let defaults = Preferences::default();
        Ok(Preferences {
            frequency: read_number(store, FREQUENCY_KEY)?
                .map_or(defaults.frequency, clamp_frequency),
            volume: read_number(store, VOLUME_KEY)?.map_or(defaults.volume, clamp_volume),
            q_factor: read_number(store, Q_FACTOR_KEY)?.map_or(defaults.q_factor, clamp_q_factor),
        })
    }

    pub fn save(&self, store: &mut dyn PreferenceStore) -> Result<(), ToneError> {
        store.set(FREQUENCY_KEY, &self.frequency.to_string())?;
        store.set(VOLUME_KEY, &self.volume.to_string())?;
        store.set(Q_FACTOR_KEY, &self.q_factor.to_string())
    }

    pub fn to_parameters(&self) -> AudioParameters {
        AudioParameters::new(volume_to_gain(self.volume), self.frequency)
            .with_q_factor(self.q_factor)
    }
}

fn read_number(store: &dyn PreferenceStore, key: &str) -> Result<Option<f64>, ToneError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => {
            warn!("ignoring stored {key} value '{raw}'");
            Ok(None)
        }
    }
}
