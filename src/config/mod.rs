//! Configuration for the serial-link binary.
//!
//! TOML file plus environment variable overrides.
//!
//! # Configuration Resolution
//!
//! 1. `SERIAL_LINK_CONFIG` environment variable (explicit path)
//! 2. `./serial-link.toml` (current directory)
//! 3. `~/.config/serial-link/config.toml` (XDG on Linux/macOS)
//! 4. `%APPDATA%\serial-link\config.toml` (Windows)
//! 5. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! - `SERIAL_LINK_SERIAL_DEVICE=/dev/ttyACM0`
//! - `SERIAL_LINK_SERIAL_BAUD_RATE=115200`
//! - `SERIAL_LINK_TRANSPORT_MAX_UPDATE_RATE_HZ=20`
//! - `SERIAL_LINK_TRANSPORT_READ_TIMEOUT_MS=100`
//! - `SERIAL_LINK_TRANSPORT_READ_CAPACITY=32`
//! - `SERIAL_LINK_LOGGING_LEVEL=debug`
//!
//! # Example
//!
//! ```rust,no_run
//! use serial_link::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//! println!("Device: {} @ {}", config.serial.device, config.serial.baud_rate);
//! # Ok::<(), serial_link::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LogFormat, LoggingConfig, SerialConfig, TransportConfig};
