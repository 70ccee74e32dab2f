//! Baud rate mapping.
//!
//! Converts an integer baud rate into one of the line speeds the transport
//! supports. Unknown rates are clamped to the fastest supported speed rather
//! than rejected, because downstream device configurations rely on it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A line speed supported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaudRate {
    B0,
    B50,
    B75,
    B110,
    B134,
    B150,
    B200,
    B300,
    B1200,
    B1800,
    B2400,
    B4800,
    B9600,
    B19200,
    B38400,
    B57600,
    B115200,
    B230400,
}

impl BaudRate {
    /// Every supported speed, slowest first.
    pub const ALL: [BaudRate; 18] = [
        BaudRate::B0,
        BaudRate::B50,
        BaudRate::B75,
        BaudRate::B110,
        BaudRate::B134,
        BaudRate::B150,
        BaudRate::B200,
        BaudRate::B300,
        BaudRate::B1200,
        BaudRate::B1800,
        BaudRate::B2400,
        BaudRate::B4800,
        BaudRate::B9600,
        BaudRate::B19200,
        BaudRate::B38400,
        BaudRate::B57600,
        BaudRate::B115200,
        BaudRate::B230400,
    ];

    /// The fallback used for unsupported rates.
    pub const MAX: BaudRate = BaudRate::B230400;

    /// Bits per second for this speed.
    pub const fn bits_per_second(self) -> u32 {
        match self {
            BaudRate::B0 => 0,
            BaudRate::B50 => 50,
            BaudRate::B75 => 75,
            BaudRate::B110 => 110,
            BaudRate::B134 => 134,
            BaudRate::B150 => 150,
            BaudRate::B200 => 200,
            BaudRate::B300 => 300,
            BaudRate::B1200 => 1200,
            BaudRate::B1800 => 1800,
            BaudRate::B2400 => 2400,
            BaudRate::B4800 => 4800,
            BaudRate::B9600 => 9600,
            BaudRate::B19200 => 19200,
            BaudRate::B38400 => 38400,
            BaudRate::B57600 => 57600,
            BaudRate::B115200 => 115200,
            BaudRate::B230400 => 230400,
        }
    }

    /// The termios speed constant for this rate.
    #[cfg(unix)]
    pub fn speed(self) -> libc::speed_t {
        match self {
            BaudRate::B0 => libc::B0,
            BaudRate::B50 => libc::B50,
            BaudRate::B75 => libc::B75,
            BaudRate::B110 => libc::B110,
            BaudRate::B134 => libc::B134,
            BaudRate::B150 => libc::B150,
            BaudRate::B200 => libc::B200,
            BaudRate::B300 => libc::B300,
            BaudRate::B1200 => libc::B1200,
            BaudRate::B1800 => libc::B1800,
            BaudRate::B2400 => libc::B2400,
            BaudRate::B4800 => libc::B4800,
            BaudRate::B9600 => libc::B9600,
            BaudRate::B19200 => libc::B19200,
            BaudRate::B38400 => libc::B38400,
            BaudRate::B57600 => libc::B57600,
            BaudRate::B115200 => libc::B115200,
            BaudRate::B230400 => libc::B230400,
        }
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits_per_second())
    }
}

/// Map an integer baud rate to a supported line speed.
///
/// Total over all integers: anything outside the supported set (including
/// negative values) maps to [`BaudRate::MAX`].
pub fn map_baud(rate: i64) -> BaudRate {
    BaudRate::ALL
        .iter()
        .copied()
        .find(|b| i64::from(b.bits_per_second()) == rate)
        .unwrap_or(BaudRate::MAX)
}
