//! Application settings

use crate::core::command::LineEnding;
use crate::core::session::SessionConfig;
use crate::core::store::FsProgramStore;
use crate::core::transport::TelnetConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read or written
    #[error("Cannot access {}: {source}", path.display())]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`AppConfig`]
    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        /// Config file path
        path: PathBuf,
        /// Parser error
        #[source]
        source: toml::de::Error,
    },

    /// Config could not be serialized
    #[error("Cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Controller endpoint
    pub controller: ControllerConfig,
    /// Session behaviour
    pub session: SessionSettings,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load config from `path`, or from the default location
    ///
    /// A missing file at the default location yields the defaults; a missing
    /// explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match super::config_file() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Parse config from TOML text
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        let io_err = |source: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, content).map_err(io_err)
    }

    /// Transport settings for the controller
    pub fn telnet_config(&self) -> TelnetConfig {
        TelnetConfig::new(&self.controller.host)
            .port(self.controller.port)
            .terminal_type(&self.controller.terminal_type)
            .connect_timeout(self.controller.connect_timeout_secs)
    }

    /// Session engine settings
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            login: self.controller.login.clone(),
            line_ending: self.controller.line_ending,
            idle_timeout: self.session.idle_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Store for program files
    pub fn program_store(&self) -> FsProgramStore {
        FsProgramStore::new(&self.session.program_dir)
    }
}

/// Controller endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Host address
    pub host: String,
    /// Console port
    pub port: u16,
    /// Login credential
    pub login: String,
    /// Terminal type announced during Telnet negotiation
    pub terminal_type: String,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Line ending for the login and commands
    pub line_ending: LineEnding,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9105,
            login: "as".to_string(),
            terminal_type: "VT100".to_string(),
            connect_timeout_secs: 10,
            line_ending: LineEnding::CrLf,
        }
    }
}

/// Session behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Give up when no byte arrives for this many milliseconds
    pub idle_timeout_ms: Option<u64>,
    /// Directory `load` file names are resolved against
    pub program_dir: PathBuf,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout_ms: None,
            program_dir: PathBuf::from("."),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (`RUST_LOG` wins when set)
    pub level: String,
    /// Also write logs to this file
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_controller_factory_settings() {
        let config = AppConfig::default();
        assert_eq!(config.controller.host, "localhost");
        assert_eq!(config.controller.port, 9105);
        assert_eq!(config.controller.login, "as");
        assert_eq!(config.telnet_config().terminal_type, "VT100");
        assert!(config.session_config().idle_timeout.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [controller]
            host = "10.0.0.5"
            line_ending = "lf"

            [session]
            idle_timeout_ms = 1500
            "#,
        )
        .unwrap();

        assert_eq!(config.controller.host, "10.0.0.5");
        assert_eq!(config.controller.port, 9105);
        assert_eq!(config.controller.line_ending, LineEnding::Lf);

        let session = config.session_config();
        assert_eq!(session.idle_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(session.line_ending.bytes(), b"\n");
    }

    #[test]
    fn test_save_and_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut config = AppConfig::default();
        config.controller.login = "operator".to_string();
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(loaded.controller.login, "operator");
    }

    #[test]
    fn test_missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(Some(dir.path().join("absent.toml").as_path())).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
