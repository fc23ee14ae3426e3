//! Bounded FIFO buffer for outbound messages while disconnected.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Holds serialized frames that could not be sent immediately.
///
/// Enqueue is non-blocking: a full queue rejects the new entry rather than
/// evicting an older one. Drained in FIFO order on each successful connect;
/// never persisted across restarts.
pub struct OutboundQueue {
    inner: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Enqueues a frame. Returns `false` when the queue is full.
    pub fn push(&self, message: String) -> bool {
        match self.inner.lock() {
            Ok(mut q) => {
                if q.len() >= self.capacity {
                    return false;
                }
                q.push_back(message);
                true
            }
            Err(_) => false,
        }
    }

    /// Removes and returns the oldest frame, if any.
    pub fn pop(&self) -> Option<String> {
        self.inner.lock().ok().and_then(|mut q| q.pop_front())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
