//! Port handle: owns the open device and the configuration it was opened with.
//!
//! The handle is either closed or holds exactly one open adapter. A failed
//! open leaves it closed; no half-open device survives an error.

use super::baud::map_baud;
use super::error::PortError;
use super::traits::{PortOpener, PortSettings, SerialPortAdapter};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default pause between reopening a device and flushing it.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Device path and baud rate the handle was last opened with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    pub device_path: String,
    pub baud_rate: i64,
}

/// Identity of one successful open.
///
/// Every successful open issues a fresh value, so callers can tell a no-op
/// open apart from a reopen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Descriptor(u64);

impl Descriptor {
    pub fn id(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct OpenPort {
    descriptor: Descriptor,
    adapter: Box<dyn SerialPortAdapter>,
}

/// Owns the device and its configuration.
pub struct PortHandle<O: PortOpener> {
    opener: O,
    port: Option<OpenPort>,
    config: Option<PortConfig>,
    next_descriptor: u64,
    settle_delay: Duration,
}

impl<O: PortOpener> PortHandle<O> {
    /// Create a closed handle that opens devices through `opener`.
    pub fn new(opener: O) -> Self {
        Self {
            opener,
            port: None,
            config: None,
            next_descriptor: 1,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// Override how long [`recover`](Self::recover) waits before flushing.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Open `path` at `baud`.
    ///
    /// If the handle is already open this returns the current descriptor and
    /// leaves both the device and the stored configuration untouched.
    pub fn open(&mut self, path: &str, baud: i64) -> Result<Descriptor, PortError> {
        if let Some(open) = &self.port {
            debug!(
                device = path,
                descriptor = %open.descriptor,
                "open requested while already open; keeping current device"
            );
            return Ok(open.descriptor);
        }

        self.config = Some(PortConfig {
            device_path: path.to_string(),
            baud_rate: baud,
        });

        let speed = map_baud(baud);
        if i64::from(speed.bits_per_second()) != baud {
            debug!(requested = baud, applied = %speed, "unsupported baud rate clamped");
        }

        let settings = PortSettings::canonical(speed);
        let adapter = match self.opener.open(path, &settings) {
            Ok(adapter) => adapter,
            Err(e) => {
                warn!(device = path, error = %e, "failed to open serial device");
                return Err(e);
            }
        };

        let descriptor = Descriptor(self.next_descriptor);
        self.next_descriptor += 1;
        self.port = Some(OpenPort {
            descriptor,
            adapter,
        });

        info!(device = path, baud = %speed, descriptor = %descriptor, "serial device opened");
        Ok(descriptor)
    }

    /// Close the device. Closing a closed handle is a no-op.
    pub fn close(&mut self) {
        if let Some(open) = self.port.take() {
            info!(device = open.adapter.name(), descriptor = %open.descriptor, "serial device closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Current descriptor, if open.
    pub fn descriptor(&self) -> Option<Descriptor> {
        self.port.as_ref().map(|p| p.descriptor)
    }

    /// Configuration stored by the most recent open attempt.
    pub fn config(&self) -> Option<&PortConfig> {
        self.config.as_ref()
    }

    /// Close and reopen with the stored configuration.
    ///
    /// On success waits for the device to settle, then discards anything
    /// buffered in either direction. One attempt only; returns whether the
    /// reopen succeeded.
    pub fn recover(&mut self) -> bool {
        self.close();

        let Some(config) = self.config.clone() else {
            warn!("recover requested before any open; nothing to reopen");
            return false;
        };

        if self.open(&config.device_path, config.baud_rate).is_err() {
            warn!(device = %config.device_path, "recovery failed; port left closed");
            return false;
        }

        std::thread::sleep(self.settle_delay);
        if let Some(open) = self.port.as_mut() {
            if let Err(e) = open.adapter.clear_buffers() {
                warn!(device = %config.device_path, error = %e, "flush after recovery failed");
            }
        }

        info!(device = %config.device_path, "serial device recovered");
        true
    }

    pub(crate) fn write(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let open = self.port.as_mut().ok_or(PortError::NotOpen)?;
        open.adapter.write_bytes(data)
    }

    /// Wait up to `timeout` for input, then read at most `buffer.len()` bytes.
    ///
    /// Returns 0 when nothing arrived in time.
    pub(crate) fn read_ready(
        &mut self,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, PortError> {
        let open = self.port.as_mut().ok_or(PortError::NotOpen)?;
        if !open.adapter.wait_readable(timeout)? {
            return Ok(0);
        }
        open.adapter.read_bytes(buffer)
    }
}

impl<O: PortOpener> std::fmt::Debug for PortHandle<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortHandle")
            .field("descriptor", &self.descriptor())
            .field("config", &self.config)
            .finish()
    }
}
