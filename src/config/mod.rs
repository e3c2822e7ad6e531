//! Configuration module
//!
//! Handles reader settings loaded from TOML

mod settings;

pub use settings::{AppConfig, ConfigError, DiscoverySettings, OutputSettings, SerialSettings};

use directories::ProjectDirs;
use std::path::PathBuf;

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "wxt520", "WXT520").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default location of the configuration file
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}
