//! Serial Link Library
//!
//! A queued, rate-limited serial transport for driving a microcontroller
//! over a tty. Producers enqueue byte buffers without blocking; a single
//! worker thread writes them to the device at a capped rate, and reads are
//! synchronous with a fixed readiness timeout.
//!
//! # Modules
//!
//! - `port`: baud mapping, device backends (real and mock), the port handle
//! - `transport`: outbound queue, worker loop and the `SerialTransport` facade
//! - `config`: TOML configuration with environment overrides
//! - `logging`: tracing subscriber setup for binaries
//! - `error`: application-level errors for the CLI
//!
//! # Example
//!
//! ```
//! use serial_link::port::{MockOpener, MockSerialPort};
//! use serial_link::transport::{SerialTransport, TransportOptions};
//!
//! let device = MockSerialPort::new("/dev/mock");
//! let transport = SerialTransport::with_opener(
//!     MockOpener::new(device.clone()),
//!     TransportOptions::default(),
//! );
//! transport.open("/dev/mock", 9600).unwrap();
//! transport.send(&[0x01, 0x02]).unwrap();
//! assert_eq!(device.written_bytes(), vec![0x01, 0x02]);
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod port;
pub mod transport;

pub use error::{AppError, AppResult};
pub use port::{
    map_baud, BaudRate, Descriptor, MockOpener, MockSerialPort, PortConfig, PortError,
    PortHandle, PortOpener, PortSettings, SerialPortAdapter, SyncSerialPort, SystemOpener,
};
pub use transport::{
    Batch, IoBuffer, ReadOutcome, SerialTransport, TransportOptions, TransportStats, WorkerState,
};

pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
