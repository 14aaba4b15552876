//! Session configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::protocol::constants::{DEFAULT_TIMEOUT_MS, DFU_INTERFACE, STM_DFU_PRODUCT_ID, STM_VENDOR_ID};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// What `download` does when its own data transfer fails.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteFailurePolicy {
    /// Log the failure and still run both status polls. Only a failing
    /// poll surfaces an error.
    #[default]
    Lenient,
    /// Fail with a transfer error and demote the session, no polls.
    Strict,
}

/// What happens to the transport handle when a transfer failure demotes
/// the session to disconnected.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TeardownPolicy {
    /// Keep the handle until `disconnect()` or the next `connect()`.
    #[default]
    Retain,
    /// Drop the handle immediately.
    Release,
}

/// Configuration for a DFU session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// USB vendor ID to match.
    pub vendor_id: u16,
    /// USB product ID to match.
    pub product_id: u16,
    /// Interface to claim.
    pub interface: u8,
    /// Timeout for every control transfer, in milliseconds.
    pub timeout_ms: u64,
    pub write_failure: WriteFailurePolicy,
    pub teardown: TeardownPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            vendor_id: STM_VENDOR_ID,
            product_id: STM_DFU_PRODUCT_ID,
            interface: DFU_INTERFACE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            write_failure: WriteFailurePolicy::default(),
            teardown: TeardownPolicy::default(),
        }
    }
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
