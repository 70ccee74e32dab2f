//! Worker loop: drains the outbound queue onto the device at a capped rate.

use super::queue::OutboundQueue;
use super::Shared;
use crate::port::PortOpener;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Fixed-cadence limiter: successive cycles start at least one period apart.
#[derive(Debug, Clone)]
pub struct Pacer {
    period: Duration,
    cycle_start: Instant,
}

impl Pacer {
    /// A pacer allowing at most `rate_hz` cycles per second (minimum 1).
    pub fn new(rate_hz: u32) -> Self {
        Self {
            period: Duration::from_secs(1) / rate_hz.max(1),
            cycle_start: Instant::now(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Mark the start of a cycle.
    pub fn begin_cycle(&mut self) {
        self.cycle_start = Instant::now();
    }

    /// Sleep out the remainder of the current cycle.
    ///
    /// Returns `false` if `queue` was cancelled before the cycle ended.
    pub fn finish_cycle(&self, queue: &OutboundQueue) -> bool {
        !queue.wait_cancelled_until(self.cycle_start + self.period)
    }
}

/// Body of the worker thread. Returns once the queue is cancelled.
pub(crate) fn run_worker<O: PortOpener>(shared: &Shared<O>) {
    let mut pacer = Pacer::new(shared.options.max_update_rate_hz);
    debug!(period = ?pacer.period(), "worker loop started");

    while let Some(batch) = shared.queue.wait_pop() {
        pacer.begin_cycle();
        trace!(
            buffers = batch.len(),
            bytes = batch.byte_len(),
            "flushing batch"
        );

        for buffer in &batch {
            if let Err(e) = shared.send(buffer.as_slice()) {
                warn!(error = %e, len = buffer.len(), "dropping outbound buffer");
            }
        }
        shared.stats.record_batch();

        if !pacer.finish_cycle(&shared.queue) {
            break;
        }
    }

    debug!("worker loop exited");
}
