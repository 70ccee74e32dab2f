//! Queued serial transport.
//!
//! Producers hand byte buffers to [`SerialTransport::enqueue_data`] and
//! return immediately; a dedicated worker thread drains them onto the device
//! at a capped rate. Direct [`send`](SerialTransport::send) and
//! [`read_data`](SerialTransport::read_data) calls share one lock with the
//! worker, so reads and writes never interleave on the device.
//!
//! ```text
//! producers ──enqueue──> OutboundQueue ──wait_pop──> worker ─┐
//! send / read_data ──────────────────────────────────────────┼──> Mutex<PortHandle>
//! ```

pub mod queue;
pub mod worker;

use crate::port::{Descriptor, PortConfig, PortError, PortHandle, PortOpener, SystemOpener};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info, trace};

pub use queue::{Batch, IoBuffer, OutboundQueue};
pub use worker::Pacer;

/// Default cap on batches drained per second.
pub const DEFAULT_MAX_UPDATE_RATE_HZ: u32 = 50;
/// Default readiness timeout for [`SerialTransport::read_data`].
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);
/// Default read scratch capacity in bytes.
pub const DEFAULT_READ_CAPACITY: usize = 32;

/// Tunables fixed for the lifetime of a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Maximum batches the worker flushes per second.
    pub max_update_rate_hz: u32,
    /// How long `read_data` waits for the device to become readable.
    pub read_timeout: Duration,
    /// Largest read a caller may request.
    pub read_capacity: usize,
    /// Pause between reopening and flushing during recovery.
    pub settle_delay: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            max_update_rate_hz: DEFAULT_MAX_UPDATE_RATE_HZ,
            read_timeout: DEFAULT_READ_TIMEOUT,
            read_capacity: DEFAULT_READ_CAPACITY,
            settle_delay: crate::port::DEFAULT_SETTLE_DELAY,
        }
    }
}

/// Lifecycle of the worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Stopped,
    Running,
}

/// Result of a timed read. Empty when nothing arrived before the timeout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOutcome {
    data: Vec<u8>,
}

impl ReadOutcome {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the read window elapsed without data.
    pub fn is_timeout(&self) -> bool {
        self.data.is_empty()
    }
}

/// Counters since the transport was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportStats {
    pub bytes_written: u64,
    pub writes_failed: u64,
    pub batches_sent: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    bytes_written: AtomicU64,
    writes_failed: AtomicU64,
    batches_sent: AtomicU64,
}

impl StatCounters {
    fn record_write(&self, result: &Result<usize, PortError>) {
        match result {
            Ok(n) => {
                self.bytes_written.fetch_add(*n as u64, Ordering::Relaxed);
            }
            Err(_) => {
                self.writes_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub(crate) fn record_batch(&self) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> TransportStats {
        TransportStats {
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            writes_failed: self.writes_failed.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
        }
    }
}

/// State shared between the facade and the worker thread.
pub(crate) struct Shared<O: PortOpener> {
    /// The only path to the device. Every read and write holds this lock.
    pub(crate) io: Mutex<PortHandle<O>>,
    pub(crate) queue: OutboundQueue,
    pub(crate) stats: StatCounters,
    pub(crate) options: TransportOptions,
}

impl<O: PortOpener> Shared<O> {
    pub(crate) fn send(&self, data: &[u8]) -> Result<usize, PortError> {
        let result = self.io.lock().write(data);
        self.stats.record_write(&result);
        result
    }
}

/// Rate-limited, queued serial transport.
pub struct SerialTransport<O: PortOpener = SystemOpener> {
    shared: Arc<Shared<O>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SerialTransport<SystemOpener> {
    /// A transport for real devices with default options.
    pub fn new() -> Self {
        Self::with_opener(SystemOpener, TransportOptions::default())
    }
}

impl Default for SerialTransport<SystemOpener> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: PortOpener> SerialTransport<O> {
    /// A closed, stopped transport that opens devices through `opener`.
    pub fn with_opener(opener: O, options: TransportOptions) -> Self {
        let handle = PortHandle::new(opener).with_settle_delay(options.settle_delay);
        Self {
            shared: Arc::new(Shared {
                io: Mutex::new(handle),
                queue: OutboundQueue::new(),
                stats: StatCounters::default(),
                options,
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &TransportOptions {
        &self.shared.options
    }

    /// Open the device. A no-op returning the current descriptor if already open.
    pub fn open(&self, path: &str, baud: i64) -> Result<Descriptor, PortError> {
        self.shared.io.lock().open(path, baud)
    }

    /// Close the device. Idempotent.
    pub fn close(&self) {
        self.shared.io.lock().close();
    }

    pub fn is_open(&self) -> bool {
        self.shared.io.lock().is_open()
    }

    pub fn descriptor(&self) -> Option<Descriptor> {
        self.shared.io.lock().descriptor()
    }

    /// Configuration from the most recent open attempt.
    pub fn config(&self) -> Option<PortConfig> {
        self.shared.io.lock().config().cloned()
    }

    /// Close, reopen, settle and flush. Returns whether the reopen succeeded.
    pub fn recover(&self) -> bool {
        self.shared.io.lock().recover()
    }

    /// Spawn the worker thread if it is not already running.
    pub fn start(&self) -> Result<(), PortError> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        self.shared.queue.reset();
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("serial-link-worker".into())
            .spawn(move || worker::run_worker(&shared))?;
        *worker = Some(handle);

        info!(
            rate_hz = self.shared.options.max_update_rate_hz,
            "transport worker started"
        );
        Ok(())
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// Batches still queued are discarded. Idempotent.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        let Some(handle) = worker.take() else {
            return;
        };

        let discarded = self.shared.queue.cancel();
        if handle.join().is_err() {
            error!("transport worker panicked");
        }
        info!(discarded, "transport worker stopped");
    }

    pub fn worker_state(&self) -> WorkerState {
        if self.worker.lock().is_some() {
            WorkerState::Running
        } else {
            WorkerState::Stopped
        }
    }

    /// Write directly to the device, bypassing the queue.
    ///
    /// Fails with [`PortError::NotOpen`] when the device is closed.
    pub fn send(&self, data: &[u8]) -> Result<usize, PortError> {
        self.shared.send(data)
    }

    /// Queue a single buffer for the worker. Never performs I/O.
    pub fn enqueue_data(&self, buffer: impl Into<IoBuffer>) {
        self.enqueue_batch(Batch::from(buffer.into()));
    }

    /// Queue buffers to be written back to back, in order.
    pub fn enqueue_batch(&self, batch: impl Into<Batch>) {
        self.shared.queue.push(batch.into());
    }

    /// Batches waiting for the worker.
    pub fn pending_batches(&self) -> usize {
        self.shared.queue.len()
    }

    /// Largest `n_bytes` accepted by [`read_data`](Self::read_data).
    pub fn read_capacity(&self) -> usize {
        self.shared.options.read_capacity
    }

    /// Read up to `n_bytes`, waiting at most the configured read timeout.
    ///
    /// An empty outcome means nothing arrived in time; use
    /// [`is_open`](Self::is_open) to tell that apart from a lost device.
    pub fn read_data(&self, n_bytes: usize) -> Result<ReadOutcome, PortError> {
        let capacity = self.read_capacity();
        if n_bytes > capacity {
            return Err(PortError::ReadCapacityExceeded {
                requested: n_bytes,
                capacity,
            });
        }

        let mut scratch = vec![0u8; n_bytes];
        let n = self
            .shared
            .io
            .lock()
            .read_ready(&mut scratch, self.shared.options.read_timeout)?;
        scratch.truncate(n);

        if scratch.is_empty() {
            trace!("read window elapsed without data");
        }
        Ok(ReadOutcome { data: scratch })
    }

    pub fn stats(&self) -> TransportStats {
        self.shared.stats.snapshot()
    }
}

impl<O: PortOpener> Drop for SerialTransport<O> {
    fn drop(&mut self) {
        self.stop();
        self.close();
    }
}

impl<O: PortOpener> std::fmt::Debug for SerialTransport<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("worker", &self.worker_state())
            .field("pending_batches", &self.pending_batches())
            .field("options", &self.shared.options)
            .finish()
    }
}
