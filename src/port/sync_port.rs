//! Operating-system serial device.
//!
//! Wraps the `serialport` crate's `SerialPort` trait with our own
//! `SerialPortAdapter` so the port handle can be driven by a mock in tests.

use super::error::PortError;
use super::traits::{PortOpener, PortSettings, SerialPortAdapter};
use std::io::{Read, Write};
use std::time::{Duration, Instant};

/// A serial device opened through the `serialport` crate.
pub struct SyncSerialPort {
    /// The underlying serial port implementation.
    port: Box<dyn serialport::SerialPort>,
    /// Raw descriptor used for readiness polling.
    #[cfg(unix)]
    fd: std::os::unix::io::RawFd,
    /// The device path for identification.
    name: String,
}

impl SyncSerialPort {
    /// Open a device with the given line settings.
    ///
    /// # Example
    /// ```no_run
    /// use serial_link::port::{map_baud, PortSettings, SyncSerialPort};
    ///
    /// let settings = PortSettings::canonical(map_baud(115200));
    /// let port = SyncSerialPort::open("/dev/ttyUSB0", &settings)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(path: &str, settings: &PortSettings) -> Result<Self, PortError> {
        let builder = serialport::new(path, settings.baud.bits_per_second())
            .data_bits(settings.data_bits.into())
            .flow_control(settings.flow_control.into())
            .parity(settings.parity.into())
            .stop_bits(settings.stop_bits.into())
            .timeout(settings.inter_byte_timeout);

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            let native = builder
                .open_native()
                .map_err(|e| PortError::from_open(path, e))?;
            let fd = native.as_raw_fd();
            Ok(Self {
                port: Box::new(native),
                fd,
                name: path.to_string(),
            })
        }

        #[cfg(not(unix))]
        {
            let port = builder.open().map_err(|e| PortError::from_open(path, e))?;
            Ok(Self {
                port,
                name: path.to_string(),
            })
        }
    }
}

impl SerialPortAdapter for SyncSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.port.write(data).map_err(PortError::Io)
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(PortError::Io(e)),
        }
    }

    #[cfg(unix)]
    fn wait_readable(&mut self, timeout: Duration) -> Result<bool, PortError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let mut fds = libc::pollfd {
                fd: self.fd,
                events: libc::POLLIN,
                revents: 0,
            };
            let millis = remaining.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

            // SAFETY: `fds` is a single valid pollfd living on the stack for
            // the duration of the call, and `self.fd` is owned by `self.port`.
            let rc = unsafe { libc::poll(&mut fds, 1, millis) };
            if rc < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted && !remaining.is_zero() {
                    continue;
                }
                return Err(PortError::Io(err));
            }
            return Ok(rc > 0 && fds.revents & libc::POLLIN != 0);
        }
    }

    #[cfg(not(unix))]
    fn wait_readable(&mut self, timeout: Duration) -> Result<bool, PortError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.port.bytes_to_read()? > 0 {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(5)));
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn clear_buffers(&mut self) -> Result<(), PortError> {
        self.port
            .clear(serialport::ClearBuffer::All)
            .map_err(PortError::Serial)
    }
}

impl std::fmt::Debug for SyncSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSerialPort")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate().ok())
            .finish()
    }
}

/// Opens real devices through [`SyncSerialPort`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

impl PortOpener for SystemOpener {
    fn open(
        &self,
        path: &str,
        settings: &PortSettings,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        Ok(Box::new(SyncSerialPort::open(path, settings)?))
    }
}
