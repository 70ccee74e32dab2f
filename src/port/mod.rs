//! Port layer: baud mapping, device backends and the port handle.
//!
//! Provides the `SerialPortAdapter`/`PortOpener` seam so the handle can be
//! driven by real hardware or by the mock device in tests.

pub mod baud;
pub mod error;
pub mod handle;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use baud::{map_baud, BaudRate};
pub use error::PortError;
pub use handle::{Descriptor, PortConfig, PortHandle, DEFAULT_SETTLE_DELAY};
pub use mock::{MockOpener, MockSerialPort};
pub use sync_port::{SyncSerialPort, SystemOpener};
pub use traits::*;
