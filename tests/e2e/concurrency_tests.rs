//! Concurrency tests: lock discipline between send, read_data, the worker
//! and producers.

use crate::common::{wait_for, MockRig, OptionsBuilder, MOCK_PATH};
use serial_link::transport::WorkerState;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn stress_send_and_read_never_overlap() {
    let options = OptionsBuilder::new()
        .rate_hz(1000)
        .read_timeout(Duration::from_millis(2))
        .build();
    let mut rig = MockRig::new(options);
    rig.transport.open(MOCK_PATH, 115200).unwrap();
    rig.device.set_io_delay(Duration::from_micros(200));
    rig.transport.start().unwrap();

    let transport = Arc::new(rig.transport);
    let mut handles = Vec::new();

    for t in 0..3u8 {
        let transport = Arc::clone(&transport);
        handles.push(thread::spawn(move || {
            for i in 0..40u8 {
                transport.send(&[t, i]).unwrap();
            }
        }));
    }
    for _ in 0..2 {
        let transport = Arc::clone(&transport);
        handles.push(thread::spawn(move || {
            for _ in 0..40 {
                let outcome = transport.read_data(4).unwrap();
                assert!(outcome.len() <= 4);
            }
        }));
    }
    {
        let transport = Arc::clone(&transport);
        handles.push(thread::spawn(move || {
            for i in 0..40u8 {
                transport.enqueue_data(vec![0xee, i]);
            }
        }));
    }

    let mut feeder = rig.device.clone();
    for _ in 0..20 {
        feeder.enqueue_read(b"xyz");
        thread::sleep(Duration::from_millis(1));
    }

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(wait_for(Duration::from_secs(5), || transport.stats().batches_sent == 40));
    transport.stop();

    assert!(!rig.device.overlap_detected(), "device saw concurrent access");
    assert_eq!(rig.device.write_count(), 3 * 40 + 40);
}

#[test]
fn test_enqueue_does_not_wait_for_inflight_send() {
    let mut rig = MockRig::opened(50);
    rig.device.set_io_delay(Duration::from_millis(200));

    let transport = Arc::new(rig.transport);
    let sender = {
        let transport = Arc::clone(&transport);
        thread::spawn(move || transport.send(b"slow").unwrap())
    };

    // Let the sender take the device lock.
    thread::sleep(Duration::from_millis(30));
    let start = Instant::now();
    transport.enqueue_data("fast");
    assert!(start.elapsed() < Duration::from_millis(50));
    assert_eq!(transport.pending_batches(), 1);

    assert_eq!(sender.join().unwrap(), 4);
}

#[test]
fn test_per_producer_order_is_preserved() {
    let rig = MockRig::opened(1000);
    let transport = Arc::new(rig.transport);

    let producers: Vec<_> = (0..4u8)
        .map(|p| {
            let transport = Arc::clone(&transport);
            thread::spawn(move || {
                for i in 0..25u8 {
                    transport.enqueue_data(vec![p, i]);
                }
            })
        })
        .collect();
    transport.start().unwrap();
    for producer in producers {
        producer.join().unwrap();
    }

    assert!(wait_for(Duration::from_secs(5), || rig.device.write_count() == 100));
    transport.stop();

    let mut next = [0u8; 4];
    for write in rig.device.get_write_log() {
        let (p, i) = (write[0] as usize, write[1]);
        assert_eq!(i, next[p], "producer {p} out of order");
        next[p] += 1;
    }
}

#[test]
fn test_concurrent_start_stop_leaves_one_worker() {
    let rig = MockRig::opened(200);
    let transport = Arc::new(rig.transport);

    let togglers: Vec<_> = (0..4)
        .map(|n| {
            let transport = Arc::clone(&transport);
            thread::spawn(move || {
                for k in 0..20 {
                    if (n + k) % 2 == 0 {
                        transport.start().unwrap();
                    } else {
                        transport.stop();
                    }
                }
            })
        })
        .collect();
    for toggler in togglers {
        toggler.join().unwrap();
    }

    transport.start().unwrap();
    assert_eq!(transport.worker_state(), WorkerState::Running);
    transport.enqueue_data("once");
    assert!(wait_for(Duration::from_secs(2), || rig.device.write_count() == 1));
    thread::sleep(Duration::from_millis(20));
    assert_eq!(rig.device.write_count(), 1);

    transport.stop();
    assert_eq!(transport.worker_state(), WorkerState::Stopped);
}
