//! Unbounded in-memory FIFO driver.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::watch;

use super::{Counters, Driver, Progress};
use crate::jobs::JobRef;

/// Unbounded FIFO driver kept entirely in memory.
///
/// Queue and counters change under the queue lock, so `dequeue` never
/// observes a job before its `enqueue` was counted.
#[derive(Default)]
pub struct MemoryDriver {
    queue: Mutex<VecDeque<JobRef>>,
    counters: Counters,
}

impl MemoryDriver {
    /// Creates an empty driver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued jobs.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// True when no job is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl Driver for MemoryDriver {
    fn enqueue(&self, job: JobRef) -> bool {
        let mut queue = self.queue.lock();
        queue.push_back(job);
        self.counters.enqueued();
        true
    }

    fn dequeue(&self) -> Option<JobRef> {
        let mut queue = self.queue.lock();
        let job = queue.pop_front()?;
        self.counters.dequeued();
        Some(job)
    }

    fn clear(&self) {
        let mut queue = self.queue.lock();
        let dropped = queue.len() as u64;
        queue.clear();
        self.counters.discarded(dropped);
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

impl std::fmt::Debug for MemoryDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDriver")
            .field("queued", &self.len())
            .field("progress", &self.counters.snapshot())
            .finish()
    }
}
