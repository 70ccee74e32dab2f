//! Tests requiring actual serial hardware.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! export TEST_PORT=/dev/ttyUSB0          # device under test
//! export TEST_BAUD=115200                # optional, default: 9600
//! export TEST_LOOPBACK=1                 # if TX and RX are bridged
//!
//! cargo test --features hardware-tests -- --ignored
//! ```

use super::utils::{print_available_ports, TransportFixture};
use std::time::{Duration, Instant};

fn fixture_or_skip() -> Option<TransportFixture> {
    let fixture = TransportFixture::setup();
    if fixture.is_none() {
        println!("Skipping hardware test: TEST_PORT not set or device unavailable");
        print_available_ports();
    }
    fixture
}

#[test]
#[ignore] // Run with --ignored flag
fn test_real_device_open_close() {
    let Some(fixture) = fixture_or_skip() else {
        return;
    };

    assert!(fixture.transport.is_open());
    let first = fixture.transport.descriptor();
    assert_eq!(
        fixture
            .transport
            .open(&fixture.config.device, fixture.config.baud_rate)
            .ok(),
        first
    );

    fixture.transport.close();
    assert!(!fixture.transport.is_open());
    fixture.transport.close();
}

#[test]
#[ignore]
fn test_real_device_read_timeout() {
    let Some(fixture) = fixture_or_skip() else {
        return;
    };
    if fixture.config.loopback_enabled {
        println!("Skipping: loopback devices may echo stray data");
        return;
    }

    let start = Instant::now();
    let outcome = fixture.transport.read_data(8).unwrap();
    let elapsed = start.elapsed();
    if outcome.is_timeout() {
        assert!(elapsed >= Duration::from_millis(100));
    }
    assert!(elapsed < Duration::from_secs(1));
    assert!(outcome.len() <= 8);
}

#[test]
#[ignore]
fn test_real_device_queued_loopback() {
    let Some(fixture) = fixture_or_skip() else {
        return;
    };
    if !fixture.config.loopback_enabled {
        println!("Skipping: TEST_LOOPBACK not set");
        return;
    }

    fixture.transport.start().unwrap();
    fixture.transport.enqueue_data(&[0x55, 0xaa, 0x01]);
    let echoed = fixture.read_at_least(3, Duration::from_secs(2));
    fixture.transport.stop();

    assert_eq!(&echoed[..3.min(echoed.len())], &[0x55, 0xaa, 0x01]);
}

#[test]
#[ignore]
fn test_real_device_recover() {
    let Some(fixture) = fixture_or_skip() else {
        return;
    };

    let before = fixture.transport.descriptor();
    assert!(fixture.transport.recover());
    assert!(fixture.transport.is_open());
    assert_ne!(fixture.transport.descriptor(), before);
}
