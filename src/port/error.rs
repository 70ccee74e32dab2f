//! Port-specific error types.
//!
//! Every failure crossing the transport boundary is a `PortError` value;
//! nothing panics across it.

use thiserror::Error;

/// Errors that can occur during serial port operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// The device node does not exist.
    #[error("Serial device not found: {0}")]
    NotFound(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Port configuration failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Attempted to use a port that's not open.
    #[error("Port is not open")]
    NotOpen,

    /// A read asked for more bytes than the scratch buffer holds.
    #[error("Requested {requested} bytes but the read capacity is {capacity}")]
    ReadCapacityExceeded { requested: usize, capacity: usize },

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a device path.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Map a `serialport` open failure onto our taxonomy.
    pub(crate) fn from_open(path: &str, err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice => PortError::not_found(path),
            serialport::ErrorKind::InvalidInput => PortError::config(err.to_string()),
            _ => PortError::Serial(err),
        }
    }
}
