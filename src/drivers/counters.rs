//! # Driver counters and progress snapshots.
//!
//! [`Counters`] is the bookkeeping shared by the bundled drivers. Every
//! mutation republishes a [`Progress`] snapshot on a
//! [`tokio::sync::watch`] channel:
//!
//! - **Non-blocking**: `send_replace` never waits for receivers.
//! - **Coalescing**: a burst of updates leaves only the latest snapshot, so
//!   high throughput never piles up notification work.
//! - **Ordered**: snapshots are published under the counter lock, so a
//!   receiver never observes an older snapshot after a newer one.
//!
//! ## Invariants (at quiescence)
//! ```text
//! completed = success + failed
//! total     = pending + executing + completed
//! ```

use parking_lot::Mutex;
use tokio::sync::watch;

/// Point-in-time snapshot of a driver's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Progress {
    /// Jobs accepted by the driver.
    pub total: u64,
    /// Jobs waiting in the queue.
    pub pending: u64,
    /// Jobs handed to a worker and not yet completed.
    pub executing: u64,
    /// Jobs that finished, successfully or not.
    pub completed: u64,
    /// Jobs that finished successfully.
    pub success: u64,
    /// Jobs that failed permanently.
    pub failed: u64,
}

impl Progress {
    /// True when nothing is pending or executing.
    pub fn is_drained(&self) -> bool {
        self.pending == 0 && self.executing == 0
    }
}

/// Mutex-guarded counters with a progress watch channel.
#[derive(Debug)]
pub struct Counters {
    state: Mutex<Progress>,
    tx: watch::Sender<Progress>,
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

impl Counters {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Progress::default());
        Self {
            state: Mutex::new(Progress::default()),
            tx,
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Progress {
        *self.state.lock()
    }

    /// New receiver observing every subsequent snapshot.
    pub fn watch(&self) -> watch::Receiver<Progress> {
        self.tx.subscribe()
    }

    /// A job was accepted.
    pub fn enqueued(&self) {
        self.update(|p| {
            p.total += 1;
            p.pending += 1;
        });
    }

    /// A job left the queue for a worker.
    pub fn dequeued(&self) {
        self.update(|p| {
            p.pending = p.pending.saturating_sub(1);
            p.executing += 1;
        });
    }

    /// A job finished.
    pub fn completed(&self, success: bool) {
        self.update(|p| {
            p.executing = p.executing.saturating_sub(1);
            p.completed += 1;
            if success {
                p.success += 1;
            } else {
                p.failed += 1;
            }
        });
    }

    /// `n` queued jobs were dropped without running.
    pub fn discarded(&self, n: u64) {
        if n == 0 {
            return;
        }
        self.update(|p| {
            p.total = p.total.saturating_sub(n);
            p.pending = p.pending.saturating_sub(n);
        });
    }

    fn update(&self, f: impl FnOnce(&mut Progress)) {
        let mut state = self.state.lock();
        f(&mut state);
        self.tx.send_replace(*state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_keeps_invariants() {
        let c = Counters::new();
        for _ in 0..3 {
            c.enqueued();
        }
        c.dequeued();
        c.dequeued();
        c.completed(true);
        c.completed(false);

        let p = c.snapshot();
        assert_eq!(p.total, 3);
        assert_eq!(p.pending, 1);
        assert_eq!(p.executing, 0);
        assert_eq!(p.completed, p.success + p.failed);
        assert_eq!(p.total, p.pending + p.executing + p.completed);
        assert!(!p.is_drained());

        c.discarded(1);
        let p = c.snapshot();
        assert_eq!(p.total, 2);
        assert!(p.is_drained());
    }

    #[test]
    fn test_watch_sees_latest_snapshot() {
        let c = Counters::new();
        let mut rx = c.watch();
        c.enqueued();
        c.enqueued();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().pending, 2);
        assert!(!rx.has_changed().unwrap());
    }
}
