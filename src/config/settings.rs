//! Reader settings

use crate::core::discovery::{DeviceLocation, DiscoveryConfig, DEFAULT_BAUDS, MODEL_ID};
use crate::core::session::{SessionConfig, SESSION_BAUD};
use crate::core::sink::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("Cannot access {path}: {source}")]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration could not be encoded
    #[error("Cannot encode configuration: {0}")]
    Encode(#[from] toml::ser::Error),

    /// Platform has no configuration directory
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Serial line and device
    pub serial: SerialSettings,
    /// Device discovery
    pub discovery: DiscoverySettings,
    /// Reading output
    pub output: OutputSettings,
}

/// Serial settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Port of a known device; discovery runs when unset
    pub port: Option<String>,
    /// Address of a known device
    pub address: Option<char>,
    /// Baud rate of the configured device
    pub baud: u32,
    /// Read timeout in milliseconds
    pub timeout_ms: u64,
    /// Delay after opening a port in milliseconds
    pub settle_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: None,
            address: None,
            baud: SESSION_BAUD,
            timeout_ms: 1000,
            settle_ms: 100,
        }
    }
}

/// Discovery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Baud rates tried on every port
    pub bauds: Vec<u32>,
    /// Model identifier expected in the settings reply
    pub model_id: String,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            bauds: DEFAULT_BAUDS.to_vec(),
            model_id: MODEL_ID.to_string(),
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Reading format on stdout
    pub format: OutputFormat,
}

impl AppConfig {
    /// Load config from the default location, defaults when the file is missing
    pub fn load() -> Result<Self, ConfigError> {
        let path = super::config_file().ok_or(ConfigError::NoConfigDir)?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse config from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Save config to a file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Discovery parameters
    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            bauds: self.discovery.bauds.clone(),
            timeout: Duration::from_millis(self.serial.timeout_ms),
            settle: Duration::from_millis(self.serial.settle_ms),
            model_id: self.discovery.model_id.clone(),
        }
    }

    /// Session parameters
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            timeout: Duration::from_millis(self.serial.timeout_ms),
            settle: Duration::from_millis(self.serial.settle_ms),
        }
    }

    /// Configured device, when both port and address are set
    pub fn device_location(&self) -> Option<DeviceLocation> {
        Some(DeviceLocation {
            port: self.serial.port.clone()?,
            address: self.serial.address?,
            baud: self.serial.baud,
        })
    }
}
