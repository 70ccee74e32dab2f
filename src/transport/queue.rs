//! Outbound queue between producers and the worker.
//!
//! Unbounded FIFO of [`Batch`]es. Any number of threads may push; a single
//! worker pops. Waits are cancellable so the worker can be stopped while it
//! is blocked on an empty queue or sleeping between batches.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

/// One outbound write. Immutable once created.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct IoBuffer(Arc<[u8]>);

impl IoBuffer {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self(data.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for IoBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IoBuffer({:02x?})", &*self.0)
    }
}

impl From<Vec<u8>> for IoBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self(data.into())
    }
}

impl From<&[u8]> for IoBuffer {
    fn from(data: &[u8]) -> Self {
        Self(data.into())
    }
}

impl<const N: usize> From<[u8; N]> for IoBuffer {
    fn from(data: [u8; N]) -> Self {
        Self(Arc::from(&data[..]))
    }
}

impl<const N: usize> From<&[u8; N]> for IoBuffer {
    fn from(data: &[u8; N]) -> Self {
        Self(Arc::from(&data[..]))
    }
}

impl From<&str> for IoBuffer {
    fn from(data: &str) -> Self {
        Self(data.as_bytes().into())
    }
}

impl AsRef<[u8]> for IoBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Buffers enqueued together and flushed in order, as a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch(Vec<IoBuffer>);

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, buffer: impl Into<IoBuffer>) {
        self.0.push(buffer.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total payload bytes across all buffers.
    pub fn byte_len(&self) -> usize {
        self.0.iter().map(IoBuffer::len).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IoBuffer> {
        self.0.iter()
    }
}

impl From<IoBuffer> for Batch {
    fn from(buffer: IoBuffer) -> Self {
        Self(vec![buffer])
    }
}

impl From<Vec<IoBuffer>> for Batch {
    fn from(buffers: Vec<IoBuffer>) -> Self {
        Self(buffers)
    }
}

impl<B: Into<IoBuffer>> FromIterator<B> for Batch {
    fn from_iter<I: IntoIterator<Item = B>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a IoBuffer;
    type IntoIter = std::slice::Iter<'a, IoBuffer>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for Batch {
    type Item = IoBuffer;
    type IntoIter = std::vec::IntoIter<IoBuffer>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[derive(Debug, Default)]
struct QueueState {
    batches: VecDeque<Batch>,
    cancelled: bool,
}

/// Blocking multi-producer, single-consumer FIFO of batches.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    state: Mutex<QueueState>,
    /// Wakes the consumer when a batch arrives.
    signal: Condvar,
    /// Wakes pacing sleeps on cancellation only.
    cancelled: Condvar,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch and wake the consumer. Never fails.
    pub fn push(&self, batch: Batch) {
        let mut state = self.state.lock();
        state.batches.push_back(batch);
        self.signal.notify_one();
    }

    /// Block until a batch is available and remove it.
    ///
    /// Returns `None` once the queue has been cancelled.
    pub fn wait_pop(&self) -> Option<Batch> {
        let mut state = self.state.lock();
        loop {
            if state.cancelled {
                return None;
            }
            if let Some(batch) = state.batches.pop_front() {
                return Some(batch);
            }
            self.signal.wait(&mut state);
        }
    }

    /// Remove the head batch without blocking.
    pub fn try_pop(&self) -> Option<Batch> {
        let mut state = self.state.lock();
        if state.cancelled {
            return None;
        }
        state.batches.pop_front()
    }

    /// Sleep until `deadline` unless cancelled first.
    ///
    /// Pushes do not end the sleep. Returns `true` if the queue was cancelled.
    pub(crate) fn wait_cancelled_until(&self, deadline: Instant) -> bool {
        let mut state = self.state.lock();
        while !state.cancelled {
            if self.cancelled.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.cancelled
    }

    /// Cancel all waits and drop whatever is still queued.
    ///
    /// Returns the number of batches discarded.
    pub fn cancel(&self) -> usize {
        let mut state = self.state.lock();
        state.cancelled = true;
        let dropped = state.batches.len();
        state.batches.clear();
        self.signal.notify_all();
        self.cancelled.notify_all();
        dropped
    }

    /// Clear cancellation so the queue can serve a new consumer.
    pub fn reset(&self) {
        self.state.lock().cancelled = false;
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    pub fn len(&self) -> usize {
        self.state.lock().batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().batches.is_empty()
    }
}
