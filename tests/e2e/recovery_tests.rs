//! Open failure and recovery behaviour.

use crate::common::{wait_for, MockRig, MOCK_PATH};
use serial_link::port::PortError;
use std::time::Duration;

#[test]
fn test_open_failure_is_surfaced_and_port_stays_closed() {
    let rig = MockRig::with_rate(50);
    rig.opener.reject_path("/dev/absent");

    let err = rig.transport.open("/dev/absent", 9600).unwrap_err();
    assert!(matches!(err, PortError::NotFound(ref p) if p == "/dev/absent"));
    assert!(!rig.transport.is_open());
    assert!(matches!(rig.transport.send(b"x"), Err(PortError::NotOpen)));
}

#[test]
fn test_recover_on_permanently_invalid_path() {
    let rig = MockRig::with_rate(50);
    rig.opener.reject_path("/dev/absent");
    let _ = rig.transport.open("/dev/absent", 9600);

    assert!(!rig.transport.recover());
    assert!(!rig.transport.is_open());
    assert!(!rig.transport.recover());
    assert_eq!(rig.opener.open_count(), 0);
}

#[test]
fn test_recover_after_device_returns() {
    let mut rig = MockRig::opened(50);
    let before = rig.transport.descriptor().unwrap();
    rig.device.enqueue_read(b"stale");

    rig.opener.unplug();
    assert!(!rig.transport.recover());
    assert!(!rig.transport.is_open());

    rig.opener.plug_in();
    assert!(rig.transport.recover());
    assert!(rig.transport.is_open());
    assert_ne!(rig.transport.descriptor(), Some(before));

    // Recovery flushed the stale input.
    assert_eq!(rig.device.available_bytes(), 0);
    assert_eq!(rig.device.clear_count(), 1);
    assert_eq!(rig.opener.last_settings().unwrap().baud.bits_per_second(), 9600);
}

#[test]
fn test_worker_keeps_running_across_device_loss() {
    let mut rig = MockRig::opened(200);
    rig.transport.start().unwrap();

    rig.device.set_fail_writes(true);
    rig.transport.enqueue_data("lost");
    assert!(wait_for(Duration::from_secs(2), || rig
        .transport
        .stats()
        .writes_failed
        == 1));

    rig.device.set_fail_writes(false);
    assert!(rig.transport.recover());
    rig.transport.enqueue_data("after");
    assert!(wait_for(Duration::from_secs(2), || rig.device.write_count() == 1));
    rig.transport.stop();

    assert_eq!(rig.device.get_write_log(), vec![b"after".to_vec()]);
}

#[test]
fn test_close_is_idempotent_and_reopen_works() {
    let rig = MockRig::with_rate(50);
    rig.transport.close();
    rig.transport.open(MOCK_PATH, 19200).unwrap();
    rig.transport.close();
    rig.transport.close();
    assert!(!rig.transport.is_open());

    rig.transport.open(MOCK_PATH, 19200).unwrap();
    assert!(rig.transport.is_open());
    assert_eq!(rig.opener.open_count(), 2);
}
