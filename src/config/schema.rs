//! Configuration schema definitions.
//!
//! All sections default sensibly, so an empty file (or no file) is valid.

use super::error::{ConfigError, ConfigResult};
use crate::transport::TransportOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device selection
    pub serial: SerialConfig,
    /// Queue pacing and read behaviour
    pub transport: TransportConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values the transport cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.device.trim().is_empty() {
            return Err(ConfigError::validation("serial.device", "must not be empty"));
        }
        if self.transport.max_update_rate_hz == 0 {
            return Err(ConfigError::validation(
                "transport.max_update_rate_hz",
                "must be at least 1",
            ));
        }
        if self.transport.read_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "transport.read_timeout_ms",
                "must be at least 1",
            ));
        }
        if self.transport.read_capacity == 0 {
            return Err(ConfigError::validation(
                "transport.read_capacity",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Serial device section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device node to open
    pub device: String,
    /// Baud rate; unsupported values are clamped to 230400
    pub baud_rate: i64,
    /// Short names for device nodes
    #[serde(default)]
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: 230400,
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialConfig {
    /// Resolve a device name through aliases
    pub fn resolve_device(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

/// Transport tuning section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Maximum batches flushed per second
    pub max_update_rate_hz: u32,
    /// Read readiness timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Largest single read in bytes
    pub read_capacity: usize,
    /// Delay between reopening and flushing during recovery, in milliseconds
    pub settle_delay_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        let options = TransportOptions::default();
        Self {
            max_update_rate_hz: options.max_update_rate_hz,
            read_timeout_ms: options.read_timeout.as_millis() as u64,
            read_capacity: options.read_capacity,
            settle_delay_ms: options.settle_delay.as_millis() as u64,
        }
    }
}

impl TransportConfig {
    pub fn to_options(&self) -> TransportOptions {
        TransportOptions {
            max_update_rate_hz: self.max_update_rate_hz,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            read_capacity: self.read_capacity,
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}
