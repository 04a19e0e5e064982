//! Configuration management for mushterm.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.mushterm/config.toml`
//! - Conversion of the loaded preferences into [`ClientOptions`]
//! - The terminal color theme used by the renderer
//!
//! # Configuration File
//!
//! ```toml
//! [server]
//! host = "mush.pennmush.org"
//! port = 4201
//!
//! [display]
//! ansi_colors = true
//! status_bar = true
//!
//! [pueblo]
//! enabled = false
//! announce_delay_ms = 1000
//!
//! [reconnect]
//! enabled = true
//! max_attempts = 5
//! delay_ms = 5000
//!
//! [logging]
//! auto_log = false
//! # log_filename = "session.log"
//!
//! [history]
//! limit = 100
//! ```
//!
//! Missing sections and keys take their defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::core::client::ClientOptions;
use crate::core::session::SessionSettings;
use crate::history::HISTORY_LIMIT;

/// Default server
pub const DEFAULT_HOST: &str = "mush.pennmush.org";
pub const DEFAULT_PORT: u16 = 4201;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub display: DisplayConfig,
    pub pueblo: PuebloConfig,
    pub reconnect: ReconnectConfig,
    pub logging: LoggingConfig,
    pub history: HistoryConfig,
    pub theme: Theme,
}

/// Default connection target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Render ANSI colors and attributes
    pub ansi_colors: bool,
    pub status_bar: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            ansi_colors: true,
            status_bar: true,
        }
    }
}

/// Pueblo markup support
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PuebloConfig {
    pub enabled: bool,
    /// Delay before the identification command after connecting
    pub announce_delay_ms: u64,
}

impl Default for PuebloConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            announce_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub enabled: bool,
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            delay_ms: 5000,
        }
    }
}

/// Session logging preferences, forwarded with every connect intent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub auto_log: bool,
    pub log_filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: HISTORY_LIMIT,
        }
    }
}

impl Config {
    /// Load configuration from `~/.mushterm/config.toml`.
    ///
    /// A missing or broken file yields the defaults.
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                match Self::load_from(&path) {
                    Ok(config) => return config,
                    Err(e) => warn!("Ignoring config: {}", e),
                }
            }
        }
        Self::default()
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// `~/.mushterm`, created on first use
    pub fn config_dir() -> Option<PathBuf> {
        let dir = home_dir()?.join(".mushterm");
        if !dir.exists() {
            let _ = fs::create_dir_all(&dir);
        }
        Some(dir)
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Options for [`crate::core::client::Client`]
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            session: SessionSettings {
                markup: self.pueblo.enabled,
                auto_reconnect: self.reconnect.enabled,
                max_attempts: self.reconnect.max_attempts,
                reconnect_delay: Duration::from_millis(self.reconnect.delay_ms),
                announce_delay: Duration::from_millis(self.pueblo.announce_delay_ms),
                auto_log: self.logging.auto_log,
                log_filename: self.logging.log_filename.clone(),
            },
            ansi_colors: self.display.ansi_colors,
            history_limit: self.history.limit,
        }
    }
}

/// Color definition (RGB)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert to crossterm Color
    pub fn to_crossterm(&self) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

/// Colors for local lines and the status bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub status_bar_bg: Color,
    pub status_bar_fg: Color,
    pub connected: Color,
    pub connecting: Color,
    pub disconnected: Color,

    pub system_fg: Color,
    pub error_fg: Color,
    pub command_fg: Color,
    pub markup_fg: Color,

    // Toast levels
    pub info_fg: Color,
    pub success_fg: Color,
    pub warning_fg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            status_bar_bg: Color::new(36, 40, 59),
            status_bar_fg: Color::new(169, 177, 214),
            connected: Color::new(158, 206, 106),
            connecting: Color::new(224, 175, 104),
            disconnected: Color::new(247, 118, 142),

            system_fg: Color::new(122, 162, 247),
            error_fg: Color::new(247, 118, 142),
            command_fg: Color::new(125, 207, 255),
            markup_fg: Color::new(187, 154, 247),

            info_fg: Color::new(169, 177, 214),
            success_fg: Color::new(158, 206, 106),
            warning_fg: Color::new(224, 175, 104),
        }
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "mush.pennmush.org");
        assert_eq!(config.server.port, 4201);
        assert!(config.display.ansi_colors);
        assert!(!config.pueblo.enabled);
        assert!(config.reconnect.enabled);

        let options = config.client_options();
        assert_eq!(options.session.max_attempts, 5);
        assert_eq!(options.session.reconnect_delay, Duration::from_secs(5));
        assert_eq!(options.session.announce_delay, Duration::from_secs(1));
        assert_eq!(options.history_limit, 100);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            [server]
            host = "localhost"

            [pueblo]
            enabled = true

            [reconnect]
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 4201);
        assert!(config.pueblo.enabled);
        assert_eq!(config.pueblo.announce_delay_ms, 1000);
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.reconnect.delay_ms, 5000);

        let options = config.client_options();
        assert!(options.session.markup);
        assert_eq!(options.session.max_attempts, 3);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        assert!(matches!(
            Config::parse("[server]\nport = \"not a number\""),
            Err(ConfigError::Parse(_))
        ));

        let missing = Config::load_from(Path::new("/nonexistent/mushterm/config.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_serialized_config_parses_back() {
        let mut config = Config::default();
        config.logging.log_filename = Some("session.log".to_string());
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(Config::parse(&text).unwrap(), config);
    }
}
