//! # Worker registry of one pool.
//!
//! Holds the pool's workers and makes the spawn decision under a single
//! lock, so concurrent `spawn_workers` calls never exceed `max_workers`.
//!
//! ## Spawn round
//! ```text
//! per_round = max_workers / batch        (max_workers when that is 0)
//! want      = min(per_round, pending - idle)
//! 1. restart up to `want` stopped workers
//! 2. create min(want - restarted, max_workers - len) new ones
//! ```
//!
//! ## Rules
//! - Lock order: pool state → registry → worker.
//! - Workers never touch the registry.

use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::core::config::WorkerConfig;
use crate::core::worker::Worker;

/// Live workers of a pool, in spawn order.
#[derive(Default)]
pub(crate) struct Registry {
    workers: Mutex<Vec<Arc<Worker>>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Runs one spawn round. Returns the number of workers started.
    pub(crate) fn grow(
        &self,
        pending: usize,
        cfg: &WorkerConfig,
        spawn: impl Fn() -> Arc<Worker>,
    ) -> usize {
        let mut workers = self.workers.lock();

        let idle = workers.iter().filter(|w| w.is_idle()).count();
        let want = cfg.per_round().min(pending.saturating_sub(idle));
        if want == 0 {
            return 0;
        }

        let mut started = 0;
        for worker in workers.iter().filter(|w| w.is_stopped()) {
            if started == want {
                break;
            }
            if worker.start() {
                started += 1;
            }
        }

        let room = cfg.max_workers_clamped().saturating_sub(workers.len());
        let fresh = (want - started).min(room);
        workers.extend((0..fresh).map(|_| spawn()));
        started + fresh
    }

    /// Removes the worker `id` if it is still stopped.
    pub(crate) fn remove_stopped(&self, id: Uuid) -> Option<Arc<Worker>> {
        let mut workers = self.workers.lock();
        let pos = workers
            .iter()
            .position(|w| w.id() == id && w.is_stopped())?;
        Some(workers.remove(pos))
    }

    /// Snapshot of all workers.
    pub(crate) fn snapshot(&self) -> Vec<Arc<Worker>> {
        self.workers.lock().clone()
    }

    /// Removes and returns every worker.
    pub(crate) fn drain(&self) -> Vec<Arc<Worker>> {
        std::mem::take(&mut *self.workers.lock())
    }

    pub(crate) fn len(&self) -> usize {
        self.workers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::JobDefaults;
    use crate::core::worker::WorkerContext;
    use crate::drivers::MemoryDriver;
    use crate::events::EventBus;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio_util::sync::CancellationToken;

    fn context() -> Arc<WorkerContext> {
        Arc::new(WorkerContext {
            pool: Uuid::new_v4(),
            driver: Arc::new(MemoryDriver::new()),
            bus: Arc::new(EventBus::with_lifecycle_topics()),
            defaults: JobDefaults::default(),
            wake: Arc::new(Notify::new()),
            root: CancellationToken::new(),
            idle_poll_interval: Duration::from_millis(10),
        })
    }

    fn cfg(max_workers: usize, batch: usize) -> WorkerConfig {
        WorkerConfig {
            max_workers,
            batch,
            ..WorkerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_grow_respects_per_round_and_bound() {
        let ctx = context();
        let reg = Registry::new();
        let spawn = || Worker::spawn(Arc::clone(&ctx));

        assert_eq!(reg.grow(100, &cfg(4, 2), spawn), 2);
        assert_eq!(reg.len(), 2);

        // two idle workers absorb two pending jobs
        assert_eq!(reg.grow(2, &cfg(4, 2), spawn), 0);

        assert_eq!(reg.grow(100, &cfg(4, 1), spawn), 2);
        assert_eq!(reg.len(), 4);
        assert_eq!(reg.grow(100, &cfg(4, 1), spawn), 0);
        assert_eq!(reg.len(), 4);
    }

    #[tokio::test]
    async fn test_grow_restarts_stopped_first() {
        let ctx = context();
        let reg = Registry::new();
        let spawn = || Worker::spawn(Arc::clone(&ctx));

        reg.grow(1, &cfg(2, 1), spawn);
        let first = reg.snapshot().remove(0);
        first.stop();

        assert_eq!(reg.grow(1, &cfg(2, 1), spawn), 1);
        assert_eq!(reg.len(), 1);
        assert!(first.is_idle());
    }

    #[tokio::test]
    async fn test_remove_only_stopped() {
        let ctx = context();
        let reg = Registry::new();
        reg.grow(1, &cfg(1, 1), || Worker::spawn(Arc::clone(&ctx)));
        let worker = reg.snapshot().remove(0);

        assert!(reg.remove_stopped(worker.id()).is_none());
        worker.stop();
        assert!(reg.remove_stopped(worker.id()).is_some());
        assert_eq!(reg.len(), 0);
        assert!(reg.drain().is_empty());
    }
}
