//! Ambient process configuration for the engine's resource knobs (§10.4).
//!
//! Distinct from `synthpod-io::driver::DriverInitConfig`, which only
//! carries a backend's *preferred* hardware sample rate/block size at
//! open time. `DriverConfig` is the broader set of engine resource knobs
//! loaded once at startup: how many module-worker threads to spin up, how
//! often to flush sparse (non-audio) port updates, and how long a
//! connect/disconnect ramp takes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Engine resource configuration, loadable from a TOML file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub sample_rate: u32,
    pub block_size: u32,
    /// Number of module-worker threads; `0` means one thread per module
    /// that declares a worker interface (§4.12), rather than a shared pool.
    pub worker_threads: usize,
    /// Seconds between sparse (non-audio) port update flushes. Default
    /// 1/25s, per §4.6.
    pub sparse_update_interval_secs: f32,
    /// Seconds a connect/disconnect ramp takes to complete, per §4.9.
    pub ramp_duration_secs: f32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 512,
            worker_threads: 0,
            sparse_update_interval_secs: 1.0 / 25.0,
            ramp_duration_secs: 0.1,
        }
    }
}

impl DriverConfig {
    /// Serializes to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::from)
    }

    /// Parses from TOML text. Missing fields fall back to their defaults.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(ConfigError::from)
    }

    /// Loads from a file, falling back to field-level defaults for
    /// anything the file omits.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&text)
    }

    /// Saves to a file, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::create_dir(parent, e))?;
            }
        }
        let text = self.to_toml()?;
        std::fs::write(path, text).map_err(|e| ConfigError::write_file(path, e))
    }
}
