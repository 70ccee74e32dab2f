//! Complete workflow tests: open -> start -> enqueue -> flush -> stop -> close

use crate::common::{wait_for, MockRig, MOCK_PATH};
use pretty_assertions::assert_eq;
use serial_link::transport::{Batch, IoBuffer, WorkerState};
use std::time::{Duration, Instant};

#[test]
fn test_full_workflow_single_payload() {
    let rig = MockRig::with_rate(50);
    let period = Duration::from_millis(20);

    rig.transport.open(MOCK_PATH, 9600).unwrap();
    assert!(rig.transport.is_open());
    rig.transport.start().unwrap();

    let enqueued_at = Instant::now();
    rig.transport.enqueue_data(vec![0x01, 0x02]);

    assert!(wait_for(Duration::from_secs(2), || rig.device.write_count() == 1));
    let written_at = rig.device.write_times()[0];
    // Worker is idle-blocked on the queue, so the write follows promptly.
    assert!(written_at.duration_since(enqueued_at) < period * 10);

    rig.transport.stop();
    assert_eq!(rig.transport.worker_state(), WorkerState::Stopped);
    assert_eq!(rig.device.get_write_log(), vec![vec![0x01, 0x02]]);

    // Nothing more reaches the device after stop.
    rig.transport.enqueue_data(vec![0x03]);
    std::thread::sleep(period * 3);
    assert_eq!(rig.device.write_count(), 1);

    rig.transport.close();
    assert!(!rig.transport.is_open());
}

#[test]
fn test_enqueue_before_start_preserves_order() {
    let rig = MockRig::opened(500);

    rig.transport.enqueue_data("a");
    rig.transport
        .enqueue_batch(Batch::from_iter(["b", "c", "d"]));
    rig.transport.enqueue_batch(vec![IoBuffer::from("e")]);
    rig.transport.enqueue_data("f");
    assert_eq!(rig.device.write_count(), 0);

    rig.transport.start().unwrap();
    assert!(wait_for(Duration::from_secs(3), || rig.device.write_count() == 6));
    rig.transport.stop();

    assert_eq!(rig.device.written_bytes(), b"abcdef".to_vec());
    let log: Vec<Vec<u8>> = rig.device.get_write_log();
    assert_eq!(log.len(), 6, "each buffer is its own write");
}

#[test]
fn test_batch_buffers_written_back_to_back() {
    let rig = MockRig::opened(10);
    let big: Batch = (0..20u8).map(|i| vec![i]).collect();
    rig.transport.enqueue_batch(big);
    rig.transport.enqueue_data(vec![0xff]);
    rig.transport.start().unwrap();

    assert!(wait_for(Duration::from_secs(3), || rig.device.write_count() == 21));
    rig.transport.stop();

    let times = rig.device.write_times();
    // A whole batch goes out inside one cycle...
    assert!(times[19].duration_since(times[0]) < Duration::from_millis(80));
    // ...and the next batch waits for the following cycle.
    assert!(times[20].duration_since(times[0]) >= Duration::from_millis(95));
}

#[test]
fn test_pacing_caps_batch_rate() {
    let rig = MockRig::opened(25);
    for i in 0..5u8 {
        rig.transport.enqueue_data(vec![i]);
    }

    let start = Instant::now();
    rig.transport.start().unwrap();
    assert!(wait_for(Duration::from_secs(3), || rig.device.write_count() == 5));
    let elapsed = start.elapsed();
    rig.transport.stop();

    // Five batches at 25 Hz need at least four full 40 ms periods.
    assert!(elapsed >= Duration::from_millis(155), "took {elapsed:?}");
    assert_eq!(rig.transport.stats().batches_sent, 5);
}

#[test]
fn test_stop_with_pending_queue_returns_promptly() {
    let rig = MockRig::opened(2);
    for i in 0..10u8 {
        rig.transport.enqueue_data(vec![i]);
    }
    rig.transport.start().unwrap();
    assert!(wait_for(Duration::from_secs(2), || rig.device.write_count() >= 1));

    let start = Instant::now();
    rig.transport.stop();
    assert!(start.elapsed() < Duration::from_millis(400));
    assert_eq!(rig.transport.pending_batches(), 0);

    let written = rig.device.write_count();
    std::thread::sleep(Duration::from_millis(600));
    assert_eq!(rig.device.write_count(), written);
    assert!(written < 10);
}

#[test]
fn test_direct_send_bypasses_queue() {
    let rig = MockRig::opened(1);
    rig.transport.enqueue_data("queued");
    assert_eq!(rig.transport.send(b"direct").unwrap(), 6);

    assert_eq!(rig.device.get_write_log(), vec![b"direct".to_vec()]);
    assert_eq!(rig.transport.pending_batches(), 1);
}

#[test]
fn test_read_roundtrip_through_transport() {
    let mut rig = MockRig::opened(50);
    rig.device.enqueue_read(&[0x10, 0x20, 0x30]);

    let outcome = rig.transport.read_data(2).unwrap();
    assert_eq!(outcome.data(), &[0x10, 0x20]);
    let outcome = rig.transport.read_data(rig.transport.read_capacity()).unwrap();
    assert_eq!(outcome.data(), &[0x30]);
    assert!(rig.transport.read_data(4).unwrap().is_timeout());
}

#[test]
fn test_open_twice_keeps_first_configuration() {
    let rig = MockRig::with_rate(50);
    let first = rig.transport.open(MOCK_PATH, 9600).unwrap();
    let second = rig.transport.open("/dev/elsewhere", 115200).unwrap();

    assert_eq!(first, second);
    assert_eq!(rig.opener.open_count(), 1);
    let config = rig.transport.config().unwrap();
    assert_eq!(config.device_path, MOCK_PATH);
    assert_eq!(config.baud_rate, 9600);
}
