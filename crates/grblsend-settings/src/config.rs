//! Configuration for grblsend
//!
//! Provides configuration file handling and validation. Supports JSON and
//! TOML files; the default location is `<config dir>/grblsend/config.toml`.
//!
//! Configuration is organized into logical sections:
//! - Connection settings (port, baud rate, handshake)
//! - Streaming settings (acknowledgment timing, progress, feed rate)
//! - Tool settings (tool on/off commands)

use crate::error::{SettingsError, SettingsResult};
use grblsend_communication::communication::serial::DEFAULT_DESCRIPTION_PREFIX;
use grblsend_communication::communication::DEFAULT_BAUD_RATE;
use grblsend_communication::firmware::grbl::controller::DEFAULT_FIRMWARE_SIGNATURE;
use grblsend_communication::firmware::grbl::streamer::DEFAULT_PROGRESS_INTERVAL;
use grblsend_communication::{ConnectionParams, SessionConfig, StreamOptions};
use grblsend_core::ToolCommands;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Port value that asks for automatic discovery
pub const AUTO_PORT: &str = "auto";

const CONFIG_DIR_NAME: &str = "grblsend";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Serial device, or `auto` to pick the first matching USB device
    pub port: String,
    /// Baud rate for serial connections
    pub baud_rate: u32,
    /// Device read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Pause after opening the port in milliseconds
    pub settle_delay_ms: u64,
    /// Wait for the `$I` reply in milliseconds
    pub handshake_timeout_ms: u64,
    /// Substring the `$I` reply must contain
    pub firmware_signature: String,
    /// Description prefix used by port discovery
    pub port_description_prefix: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: AUTO_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: 1000,
            settle_delay_ms: 2000,
            handshake_timeout_ms: 10_000,
            firmware_signature: DEFAULT_FIRMWARE_SIGNATURE.to_string(),
            port_description_prefix: DEFAULT_DESCRIPTION_PREFIX.to_string(),
        }
    }
}

impl ConnectionSettings {
    /// Whether the port should be discovered rather than opened by name
    pub fn wants_discovery(&self) -> bool {
        let port = self.port.trim();
        port.is_empty() || port.eq_ignore_ascii_case(AUTO_PORT)
    }
}

/// Streaming settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Wait for each acknowledgment in milliseconds
    pub ack_timeout_ms: u64,
    /// Wait for a status frame in milliseconds
    pub status_timeout_ms: u64,
    /// Sleep between read attempts in milliseconds
    pub poll_interval_ms: u64,
    /// Report progress every this many lines
    pub progress_interval: usize,
    /// Feed rate issued before the program
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_rate: Option<f64>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            ack_timeout_ms: 30_000,
            status_timeout_ms: 1000,
            poll_interval_ms: 10,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            feed_rate: None,
        }
    }
}

/// Tool on/off commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub tool_off: String,
    pub tool_on: String,
    /// Send `tool_off` after a successful transfer
    pub switch_off_at_end: bool,
}

impl Default for ToolSettings {
    fn default() -> Self {
        let tool = ToolCommands::default();
        Self {
            tool_off: tool.off,
            tool_on: tool.on,
            switch_off_at_end: false,
        }
    }
}

/// Complete sender configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    pub connection: ConnectionSettings,
    pub stream: StreamSettings,
    pub tool: ToolSettings,
}

impl SenderConfig {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// `<config dir>/grblsend/config.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        let dir = dirs::config_dir().ok_or_else(|| {
            SettingsError::ConfigDirectory("no configuration directory on this platform".into())
        })?;
        Ok(dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load the file at the default path, or defaults when it does not exist
    pub fn load_default() -> SettingsResult<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::LoadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config: Self = match Format::of(path)? {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SettingsError::ConfigDirectory(format!("{}: {}", parent.display(), e))
            })?;
        }
        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Validate config
    pub fn validate(&self) -> SettingsResult<()> {
        if self.connection.baud_rate == 0 {
            return Err(SettingsError::invalid("baud_rate", "must be > 0"));
        }
        if self.connection.handshake_timeout_ms == 0 {
            return Err(SettingsError::invalid("handshake_timeout_ms", "must be > 0"));
        }
        if self.connection.firmware_signature.trim().is_empty() {
            return Err(SettingsError::invalid("firmware_signature", "must not be empty"));
        }
        if self.stream.ack_timeout_ms == 0 {
            return Err(SettingsError::invalid("ack_timeout_ms", "must be > 0"));
        }
        if self.stream.poll_interval_ms == 0 {
            return Err(SettingsError::invalid("poll_interval_ms", "must be > 0"));
        }
        if self.stream.progress_interval == 0 {
            return Err(SettingsError::invalid("progress_interval", "must be > 0"));
        }
        if let Some(rate) = self.stream.feed_rate {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(SettingsError::invalid(
                    "feed_rate",
                    format!("{} is not a positive feed rate", rate),
                ));
            }
        }
        if self.tool.tool_off.trim().is_empty() {
            return Err(SettingsError::invalid("tool_off", "must not be empty"));
        }
        Ok(())
    }

    /// Session parameters for `port`
    pub fn session_config(&self, port: &str) -> SessionConfig {
        let connection = &self.connection;
        SessionConfig {
            connection: ConnectionParams {
                port: port.to_string(),
                baud_rate: connection.baud_rate,
                read_timeout: Duration::from_millis(connection.read_timeout_ms),
                settle_delay: Duration::from_millis(connection.settle_delay_ms),
            },
            handshake_timeout: Duration::from_millis(connection.handshake_timeout_ms),
            ack_timeout: Duration::from_millis(self.stream.ack_timeout_ms),
            status_timeout: Duration::from_millis(self.stream.status_timeout_ms),
            poll_interval: Duration::from_millis(self.stream.poll_interval_ms),
            firmware_signature: connection.firmware_signature.clone(),
        }
    }

    /// Streaming options
    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            feed_rate: self.stream.feed_rate,
            progress_interval: self.stream.progress_interval,
            line_timeout: Duration::from_millis(self.stream.ack_timeout_ms),
            finish_tool: self.tool.switch_off_at_end.then(|| self.tool_commands()),
        }
    }

    pub fn tool_commands(&self) -> ToolCommands {
        ToolCommands::new(self.tool.tool_off.clone(), self.tool.tool_on.clone())
    }
}

enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            other => Err(SettingsError::UnsupportedFormat(format!(
                "{} (config file must be .json or .toml)",
                other.unwrap_or("no extension")
            ))),
        }
    }
}
