//! Shared test utilities for serial-link integration tests.
//!
//! - Mock-backed transports with tunable pacing
//! - Polling helper for asynchronous worker effects

#![allow(dead_code)]

use serial_link::port::{MockOpener, MockSerialPort};
use serial_link::transport::{SerialTransport, TransportOptions};
use std::time::{Duration, Instant};

pub const MOCK_PATH: &str = "/dev/mock";

/// A transport wired to a mock device, plus handles to inspect it.
pub struct MockRig {
    pub transport: SerialTransport<MockOpener>,
    pub opener: MockOpener,
    pub device: MockSerialPort,
}

impl MockRig {
    pub fn new(options: TransportOptions) -> Self {
        let device = MockSerialPort::new(MOCK_PATH);
        let opener = MockOpener::new(device.clone());
        let transport = SerialTransport::with_opener(opener.clone(), options);
        Self {
            transport,
            opener,
            device,
        }
    }

    /// Rig with default options except for the given update rate.
    pub fn with_rate(rate_hz: u32) -> Self {
        Self::new(OptionsBuilder::new().rate_hz(rate_hz).build())
    }

    /// Rig whose device is already open at 9600 baud.
    pub fn opened(rate_hz: u32) -> Self {
        let rig = Self::with_rate(rate_hz);
        rig.transport
            .open(MOCK_PATH, 9600)
            .expect("mock device should open");
        rig
    }
}

/// Builder for transport options used in tests.
pub struct OptionsBuilder {
    options: TransportOptions,
}

impl OptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: TransportOptions {
                settle_delay: Duration::from_millis(1),
                ..TransportOptions::default()
            },
        }
    }

    pub fn rate_hz(mut self, rate: u32) -> Self {
        self.options.max_update_rate_hz = rate;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.options.read_timeout = timeout;
        self
    }

    pub fn read_capacity(mut self, capacity: usize) -> Self {
        self.options.read_capacity = capacity;
        self
    }

    pub fn build(self) -> TransportOptions {
        self.options
    }
}

/// Poll `cond` every couple of milliseconds until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_builder() {
        let options = OptionsBuilder::new()
            .rate_hz(10)
            .read_timeout(Duration::from_millis(20))
            .read_capacity(8)
            .build();

        assert_eq!(options.max_update_rate_hz, 10);
        assert_eq!(options.read_timeout, Duration::from_millis(20));
        assert_eq!(options.read_capacity, 8);
    }

    #[test]
    fn test_opened_rig() {
        let rig = MockRig::opened(50);
        assert!(rig.transport.is_open());
        assert_eq!(rig.opener.open_count(), 1);
    }
}
