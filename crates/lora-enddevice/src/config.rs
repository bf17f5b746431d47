//! Device configuration.
//!
//! Every section has a default, so an empty document (or no document at all)
//! describes an mDot on `/dev/ttyUSB0` at 115200 baud.
//!
//! ```yaml
//! radio_type: rn2903
//! serial_port:
//!   port: /dev/ttyACM0
//!   baud_rate: 57600
//! queue:
//!   tick_ms: 100
//!   max_attempts: 3
//! network:
//!   healthy_poll_secs: 90
//!   degraded_poll_secs: 60
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Supported radio module families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RadioType {
    /// MultiTech mDot (AT command set).
    #[default]
    Mdot,
    /// Microchip RN2903.
    Rn2903,
}

impl RadioType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RadioType::Mdot => "mdot",
            RadioType::Rn2903 => "rn2903",
        }
    }
}

/// Any name other than `rn2903` selects the mDot.
impl From<String> for RadioType {
    fn from(name: String) -> Self {
        RadioType::from(name.as_str())
    }
}

impl From<&str> for RadioType {
    fn from(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("rn2903") {
            RadioType::Rn2903
        } else {
            RadioType::Mdot
        }
    }
}

impl From<RadioType> for String {
    fn from(radio: RadioType) -> Self {
        radio.as_str().to_string()
    }
}

impl std::fmt::Display for RadioType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serial port settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialPortOptions {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub port: String,
    pub baud_rate: u32,
}

impl Default for SerialPortOptions {
    fn default() -> Self {
        SerialPortOptions {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
        }
    }
}

/// Command queue settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Delay between processing cycles, in milliseconds.
    pub tick_ms: u64,
    /// Times a command is written before it is given up.
    pub max_attempts: u32,
}

impl QueueConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            tick_ms: 100,
            max_attempts: 3,
        }
    }
}

/// Join status polling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Poll interval while joined, in seconds.
    pub healthy_poll_secs: u64,
    /// Poll interval after a failed join or status query, in seconds.
    pub degraded_poll_secs: u64,
}

impl NetworkConfig {
    pub fn healthy_poll(&self) -> Duration {
        Duration::from_secs(self.healthy_poll_secs)
    }

    pub fn degraded_poll(&self) -> Duration {
        Duration::from_secs(self.degraded_poll_secs)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            healthy_poll_secs: 90,
            degraded_poll_secs: 60,
        }
    }
}

/// Top level device configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub radio_type: RadioType,
    pub serial_port: SerialPortOptions,
    pub queue: QueueConfig,
    pub network: NetworkConfig,
}

impl DeviceConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<DeviceConfig, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(DeviceConfig::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<DeviceConfig, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Render as YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}
