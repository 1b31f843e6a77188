//! Bounded driver over a [`BlockingQueue`].

use std::time::Duration;

use tokio::sync::watch;

use super::{BlockingQueue, Counters, Driver, Progress};
use crate::jobs::JobRef;

/// Fixed-capacity FIFO driver.
///
/// [`Driver::enqueue`] refuses jobs once the queue is full. Producers outside
/// the async runtime may wait for room with
/// [`enqueue_with_timeout`](QueueDriver::enqueue_with_timeout).
pub struct QueueDriver {
    queue: BlockingQueue<JobRef>,
    counters: Counters,
}

impl QueueDriver {
    /// Creates a driver holding at most `capacity` pending jobs (`0` is treated as `1`).
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: BlockingQueue::new(capacity),
            counters: Counters::new(),
        }
    }

    /// Enqueues `job`, blocking the calling thread up to `timeout` for room.
    ///
    /// Returns `false` if the queue stayed full.
    pub fn enqueue_with_timeout(&self, job: JobRef, timeout: Duration) -> bool {
        self.queue
            .enqueue_then(job, Some(timeout), || self.counters.enqueued())
            .is_ok()
    }

    /// Maximum number of pending jobs.
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

impl Driver for QueueDriver {
    fn enqueue(&self, job: JobRef) -> bool {
        self.queue
            .enqueue_then(job, None, || self.counters.enqueued())
            .is_ok()
    }

    fn dequeue(&self) -> Option<JobRef> {
        self.queue.dequeue_then(|| self.counters.dequeued())
    }

    fn clear(&self) {
        self.queue
            .clear_then(|dropped| self.counters.discarded(dropped as u64));
    }

    fn complete(&self, success: bool) {
        self.counters.completed(success);
    }

    fn total(&self) -> u64 {
        self.counters.snapshot().total
    }

    fn pending(&self) -> u64 {
        self.counters.snapshot().pending
    }

    fn executing(&self) -> u64 {
        self.counters.snapshot().executing
    }

    fn completed(&self) -> u64 {
        self.counters.snapshot().completed
    }

    fn success(&self) -> u64 {
        self.counters.snapshot().success
    }

    fn failed(&self) -> u64 {
        self.counters.snapshot().failed
    }

    fn progress(&self) -> Progress {
        self.counters.snapshot()
    }

    fn watch_progress(&self) -> Option<watch::Receiver<Progress>> {
        Some(self.counters.watch())
    }
}

impl std::fmt::Debug for QueueDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueDriver")
            .field("queue", &self.queue)
            .field("progress", &self.counters.snapshot())
            .finish()
    }
}
