//! Configuration module
//!
//! Handles controller endpoint, session and logging settings

mod settings;

pub use settings::{AppConfig, ConfigError, ControllerConfig, LoggingConfig, SessionSettings};

use directories::ProjectDirs;
use std::path::PathBuf;

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "asterm", "Asterm").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default location of `config.toml`
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}
