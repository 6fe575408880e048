//! Client configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::{BackendPreference, DEFAULT_SEARCH_PREFIXES};
use crate::error::{Error, Result};

/// Default per-transfer timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Configuration for a pongoOS client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Timeout applied to every control and bulk transfer.
    pub transfer_timeout_ms: u64,
    /// Backend resolution strategy.
    pub backend: BackendPreference,
    /// Prefixes scanned for a libusb build, in order.
    pub library_search_paths: Vec<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transfer_timeout_ms: DEFAULT_TIMEOUT_MS,
            backend: BackendPreference::default(),
            library_search_paths: DEFAULT_SEARCH_PREFIXES.iter().map(PathBuf::from).collect(),
        }
    }
}

impl ClientConfig {
    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ClientConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.transfer_timeout_ms == 0 {
            return Err(Error::Config("transfer_timeout_ms must be non-zero".into()));
        }
        Ok(())
    }
}
