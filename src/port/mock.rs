//! Mock serial device for testing.
//!
//! Provides a `MockSerialPort` that records writes and serves queued reads
//! without hardware, and a `MockOpener` that hands it out to a port handle.
//! Clones of a mock share state, so a test can keep one clone to inspect
//! what the transport did with another.

use super::error::PortError;
use super::traits::{PortOpener, PortSettings, SerialPortAdapter};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Inner state of the mock port.
#[derive(Debug, Default)]
struct MockPortState {
    /// Bytes to be returned by read operations.
    read_queue: VecDeque<u8>,
    /// Every successful write, in order.
    write_log: Vec<Vec<u8>>,
    /// When each logged write happened.
    write_times: Vec<Instant>,
    /// Number of times the buffers were flushed.
    clear_count: usize,
    /// Fail every write with a broken pipe.
    fail_writes: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MockPortState>,
    data_ready: Condvar,
    /// Set while a read or write is inside the device.
    busy: AtomicBool,
    /// Latched when two operations were inside the device at once.
    overlap: AtomicBool,
    /// Artificial time each read/write spends inside the device.
    io_delay: Mutex<Duration>,
}

/// Mock serial device.
///
/// # Example
/// ```
/// use serial_link::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("/dev/mock");
/// port.enqueue_read(b"OK");
///
/// let mut buffer = [0u8; 8];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"OK");
///
/// port.write_bytes(&[0x01, 0x02]).unwrap();
/// assert_eq!(port.get_write_log(), vec![vec![0x01, 0x02]]);
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    shared: Arc<Shared>,
}

/// Marks the device busy for the lifetime of one operation.
struct BusyGuard<'a>(&'a Shared);

impl<'a> BusyGuard<'a> {
    fn enter(shared: &'a Shared) -> Self {
        if shared.busy.swap(true, Ordering::SeqCst) {
            shared.overlap.store(true, Ordering::SeqCst);
        }
        let delay = *shared.io_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        BusyGuard(shared)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.busy.store(false, Ordering::SeqCst);
    }
}

impl MockSerialPort {
    /// Create a new mock device with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(Shared::default()),
        }
    }

    /// Same device, reported under a different name.
    fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Queue bytes for subsequent reads and wake any waiting reader.
    pub fn enqueue_read(&mut self, data: &[u8]) {
        let mut state = self.shared.state.lock();
        state.read_queue.extend(data);
        self.shared.data_ready.notify_all();
    }

    /// Get a copy of all data written to the device.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.shared.state.lock().write_log.clone()
    }

    /// All written bytes concatenated in write order.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.shared.state.lock().write_log.concat()
    }

    /// When each write in the log happened.
    pub fn write_times(&self) -> Vec<Instant> {
        self.shared.state.lock().write_times.clone()
    }

    /// Number of writes recorded so far.
    pub fn write_count(&self) -> usize {
        self.shared.state.lock().write_log.len()
    }

    /// Clear the write log.
    pub fn clear_write_log(&mut self) {
        let mut state = self.shared.state.lock();
        state.write_log.clear();
        state.write_times.clear();
    }

    /// Make every subsequent write fail until reset.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.shared.state.lock().fail_writes = fail;
    }

    /// Hold each read and write inside the device for `delay`.
    pub fn set_io_delay(&mut self, delay: Duration) {
        *self.shared.io_delay.lock() = delay;
    }

    /// Whether two operations were ever inside the device at the same time.
    pub fn overlap_detected(&self) -> bool {
        self.shared.overlap.load(Ordering::SeqCst)
    }

    /// How many times the buffers have been flushed.
    pub fn clear_count(&self) -> usize {
        self.shared.state.lock().clear_count
    }

    /// Get the number of bytes available to read.
    pub fn available_bytes(&self) -> usize {
        self.shared.state.lock().read_queue.len()
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let _busy = BusyGuard::enter(&self.shared);
        let mut state = self.shared.state.lock();

        if state.fail_writes {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device disconnected",
            )));
        }

        state.write_log.push(data.to_vec());
        state.write_times.push(Instant::now());
        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let _busy = BusyGuard::enter(&self.shared);
        let mut state = self.shared.state.lock();

        let n = buffer.len().min(state.read_queue.len());
        for (slot, byte) in buffer.iter_mut().zip(state.read_queue.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn wait_readable(&mut self, timeout: Duration) -> Result<bool, PortError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.read_queue.is_empty() {
            if self
                .shared
                .data_ready
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return Ok(!state.read_queue.is_empty());
            }
        }
        Ok(true)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn clear_buffers(&mut self) -> Result<(), PortError> {
        let mut state = self.shared.state.lock();
        state.read_queue.clear();
        state.clear_count += 1;
        Ok(())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}

#[derive(Debug, Default)]
struct OpenerState {
    opens: usize,
    unplugged: bool,
    rejected: HashSet<String>,
    last_settings: Option<PortSettings>,
    last_path: Option<String>,
}

/// Hands out a shared [`MockSerialPort`] for every successful open.
///
/// Opens can be made to fail per path ([`reject_path`](Self::reject_path))
/// or globally ([`unplug`](Self::unplug)) to exercise recovery.
#[derive(Debug, Clone)]
pub struct MockOpener {
    device: MockSerialPort,
    state: Arc<Mutex<OpenerState>>,
}

impl MockOpener {
    /// Create an opener backed by `device`.
    pub fn new(device: MockSerialPort) -> Self {
        Self {
            device,
            state: Arc::new(Mutex::new(OpenerState::default())),
        }
    }

    /// The device handed out on open.
    pub fn device(&self) -> MockSerialPort {
        self.device.clone()
    }

    /// Make opens of `path` fail as if the node did not exist.
    pub fn reject_path(&self, path: impl Into<String>) {
        self.state.lock().rejected.insert(path.into());
    }

    /// Make every open fail until [`plug_in`](Self::plug_in) is called.
    pub fn unplug(&self) {
        self.state.lock().unplugged = true;
    }

    /// Undo [`unplug`](Self::unplug).
    pub fn plug_in(&self) {
        self.state.lock().unplugged = false;
    }

    /// Number of successful opens.
    pub fn open_count(&self) -> usize {
        self.state.lock().opens
    }

    /// Settings applied by the most recent successful open.
    pub fn last_settings(&self) -> Option<PortSettings> {
        self.state.lock().last_settings.clone()
    }

    /// Path used by the most recent successful open.
    pub fn last_path(&self) -> Option<String> {
        self.state.lock().last_path.clone()
    }
}

impl PortOpener for MockOpener {
    fn open(
        &self,
        path: &str,
        settings: &PortSettings,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        let mut state = self.state.lock();
        if state.unplugged || state.rejected.contains(path) {
            return Err(PortError::not_found(path));
        }
        state.opens += 1;
        state.last_settings = Some(settings.clone());
        state.last_path = Some(path.to_string());
        Ok(Box::new(self.device.renamed(path)))
    }
}
