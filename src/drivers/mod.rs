//! # Queue drivers backing a worker pool.
//!
//! A [`Driver`] owns the pending jobs of one [`WorkerPool`](crate::WorkerPool)
//! and the six lifecycle counters reported by [`Progress`].
//!
//! ## Bundled drivers
//! - [`MemoryDriver`] unbounded in-memory FIFO
//! - [`QueueDriver`] fixed-capacity FIFO over a [`BlockingQueue`]
//!
//! A durable driver (database, broker) implements the same trait with
//! external storage behind it.
//!
//! ## Contract
//! - `enqueue`/`dequeue` never block and never panic on full/empty; they
//!   report through their return value.
//! - `dequeue` moves a job from `pending` to `executing`; `complete` moves it
//!   to `completed` and `success`/`failed`.
//! - Counters may disagree transiently during a transition but converge.

mod blocking_queue;
mod counters;
mod memory;
mod queue;

use std::sync::Arc;

use tokio::sync::watch;

use crate::jobs::JobRef;

pub use blocking_queue::BlockingQueue;
pub use counters::{Counters, Progress};
pub use memory::MemoryDriver;
pub use queue::QueueDriver;

/// Shared handle to a driver.
pub type DriverRef = Arc<dyn Driver>;

/// Queue abstraction with lifecycle counters.
pub trait Driver: Send + Sync + 'static {
    /// Adds a job. Returns `false` if the driver refused it.
    fn enqueue(&self, job: JobRef) -> bool;

    /// Takes the next job, if any.
    fn dequeue(&self) -> Option<JobRef>;

    /// Drops every queued job.
    fn clear(&self);

    /// Records the outcome of a dequeued job.
    fn complete(&self, success: bool);

    fn total(&self) -> u64;
    fn pending(&self) -> u64;
    fn executing(&self) -> u64;
    fn completed(&self) -> u64;
    fn success(&self) -> u64;
    fn failed(&self) -> u64;

    /// Snapshot of all counters.
    ///
    /// The default reads each counter separately, so it is not transactional.
    fn progress(&self) -> Progress {
        Progress {
            total: self.total(),
            pending: self.pending(),
            executing: self.executing(),
            completed: self.completed(),
            success: self.success(),
            failed: self.failed(),
        }
    }

    /// Receiver notified after counter changes, if the driver publishes them.
    fn watch_progress(&self) -> Option<watch::Receiver<Progress>> {
        None
    }
}
