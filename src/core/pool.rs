//! # WorkerPool: a driver, a bounded set of workers, and their upkeep.
//!
//! A [`WorkerPool`] owns one [`Driver`](crate::Driver), a registry of
//! [`Worker`]s, and two background tasks while running:
//!
//! - the **watcher** reclaims idle/stopped workers and spawns new ones for
//!   pending work;
//! - the **progress forwarder** turns driver counter changes into
//!   [`ProgressUpdated`] events on the pool's [`EventBus`].
//!
//! ## Architecture
//! ```text
//! dispatch(job) ──► Driver.enqueue ──► wake idle workers ──► spawn_workers()
//!
//! start():
//!   status = Running
//!   ├─► spawn watcher   (every watch_interval)
//!   │     ├─ JoinSet: per worker
//!   │     │    ├─ idle    > max_idle_time    → stop()
//!   │     │    └─ stopped > max_stopped_time → remove + release
//!   │     └─ pending > 0 → spawn_workers()
//!   ├─► spawn progress forwarder  (Driver watch → ProgressUpdated)
//!   └─► spawn_workers()
//!
//! Worker ×N ── dequeue ──► run_job ──► BeforeHandle / RetryHandle /
//!                                     AfterHandle / FailedHandle ──► EventBus
//! ```
//!
//! ## States
//! ```text
//! Pending ──start()──► Running ──stop()──► Stopped ──start()──► Running
//!    │                    │                   │
//!    └────────────────────┴──release()────────┴──► Released (terminal)
//! ```
//!
//! ## Rules
//! - At most `max_workers` workers exist at any time.
//! - `dispatch` is refused once the pool is `Stopped` or `Released`; jobs
//!   dispatched while `Pending` wait in the driver until `start()`.
//! - `stop()` is cooperative: running jobs finish, queued jobs stay queued.
//! - Background tasks hold only a weak reference to the pool.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use jobvisor::{JobError, JobFn, PoolOption, WorkerPool};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let pool = WorkerPool::builder("mail")
//!         .option(PoolOption::MaxWorkers(2))
//!         .build();
//!
//!     pool.start().await;
//!     pool.dispatch(JobFn::arc("send", |_ctx: CancellationToken| async {
//!         Ok::<(), JobError>(())
//!     }));
//!
//!     tokio::time::sleep(Duration::from_millis(50)).await;
//!     assert_eq!(pool.progress().success, 1);
//!     pool.release().await;
//! }
//! ```

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{Notify, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::builder::WorkerPoolBuilder;
use crate::core::config::PoolConfig;
use crate::core::registry::Registry;
use crate::core::runner::publish;
use crate::core::worker::{Worker, WorkerContext};
use crate::drivers::{DriverRef, Progress};
use crate::events::{EventBus, ProgressUpdated};
use crate::jobs::JobRef;

/// Lifecycle state of a [`WorkerPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PoolStatus {
    /// Created, never started. Dispatched jobs queue up.
    Pending,
    /// Workers are pulling jobs.
    Running,
    /// Stopped; may be started again.
    Stopped,
    /// Released; terminal.
    Released,
}

struct PoolState {
    status: PoolStatus,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
    run: Option<CancellationToken>,
    tasks: Vec<JoinHandle<()>>,
}

/// Named set of workers executing jobs from one driver.
pub struct WorkerPool {
    id: Uuid,
    name: RwLock<String>,
    created_at: Instant,
    config: PoolConfig,
    ctx: Arc<WorkerContext>,
    registry: Registry,
    state: Mutex<PoolState>,
}

impl WorkerPool {
    /// Creates a pending pool.
    ///
    /// Lifecycle topics are registered on `bus` if missing.
    pub fn new(
        name: impl Into<String>,
        driver: DriverRef,
        bus: Arc<EventBus>,
        config: PoolConfig,
    ) -> Arc<Self> {
        bus.ensure_lifecycle_topics();

        let id = Uuid::new_v4();
        let ctx = Arc::new(WorkerContext {
            pool: id,
            driver,
            bus,
            defaults: config.job.clone(),
            wake: Arc::new(Notify::new()),
            root: CancellationToken::new(),
            idle_poll_interval: config.worker.idle_poll_interval.max(Duration::from_millis(1)),
        });

        Arc::new(Self {
            id,
            name: RwLock::new(name.into()),
            created_at: Instant::now(),
            config,
            ctx,
            registry: Registry::new(),
            state: Mutex::new(PoolState {
                status: PoolStatus::Pending,
                started_at: None,
                stopped_at: None,
                run: None,
                tasks: Vec::new(),
            }),
        })
    }

    /// Starts building a pool named `name`.
    pub fn builder(name: impl Into<String>) -> WorkerPoolBuilder {
        WorkerPoolBuilder::new(name)
    }

    /// Starts the pool.
    ///
    /// Returns `false` once the pool has been released; `true` otherwise
    /// (including when it was already running).
    pub async fn start(self: &Arc<Self>) -> bool {
        {
            let mut st = self.state.lock();
            match st.status {
                PoolStatus::Released => return false,
                PoolStatus::Running => return true,
                PoolStatus::Pending | PoolStatus::Stopped => {}
            }

            let run = self.ctx.root.child_token();
            st.status = PoolStatus::Running;
            st.started_at = Some(Instant::now());
            st.tasks = vec![
                tokio::spawn(watch_workers(
                    Arc::downgrade(self),
                    run.clone(),
                    self.config.worker.watch_interval.max(Duration::from_millis(1)),
                )),
                tokio::spawn(forward_progress(
                    Arc::clone(&self.ctx),
                    run.clone(),
                    self.config.worker.watch_interval.max(Duration::from_millis(1)),
                )),
            ];
            st.run = Some(run);
        }

        info!(pool = %self.name(), id = %self.id, "pool started");
        self.spawn_workers();
        true
    }

    /// Stops the pool. Returns `false` unless it was running.
    ///
    /// Background tasks end before this returns; workers finish their
    /// current job and stop.
    pub async fn stop(&self) -> bool {
        let tasks = {
            let mut st = self.state.lock();
            if st.status != PoolStatus::Running {
                return false;
            }
            st.status = PoolStatus::Stopped;
            st.stopped_at = Some(Instant::now());
            if let Some(run) = st.run.take() {
                run.cancel();
            }
            std::mem::take(&mut st.tasks)
        };

        join_all(tasks).await;
        for worker in self.registry.snapshot() {
            worker.stop();
        }
        info!(pool = %self.name(), id = %self.id, "pool stopped");
        true
    }

    /// Releases the pool for good: stops it, cancels every job token, and
    /// waits for all workers to exit. Idempotent.
    pub async fn release(&self) {
        let tasks = {
            let mut st = self.state.lock();
            if st.status == PoolStatus::Released {
                return;
            }
            if st.status == PoolStatus::Running {
                st.stopped_at = Some(Instant::now());
            }
            st.status = PoolStatus::Released;
            if let Some(run) = st.run.take() {
                run.cancel();
            }
            std::mem::take(&mut st.tasks)
        };

        self.ctx.root.cancel();
        join_all(tasks).await;

        let workers = self.registry.drain();
        join_all(workers.iter().map(|w| w.release())).await;
        info!(pool = %self.name(), id = %self.id, workers = workers.len(), "pool released");
    }

    /// Queues `job`.
    ///
    /// Returns `false` if the pool is stopped or released, or if the driver
    /// refused the job. Must be called within a Tokio runtime once the pool
    /// is running.
    pub fn dispatch(&self, job: JobRef) -> bool {
        let status = self.status();
        if matches!(status, PoolStatus::Stopped | PoolStatus::Released) {
            debug!(pool = %self.name(), job = job.name(), ?status, "dispatch refused");
            return false;
        }
        if !self.ctx.driver.enqueue(job) {
            return false;
        }
        if status == PoolStatus::Running {
            self.ctx.wake.notify_waiters();
            self.spawn_workers();
        }
        true
    }

    /// Runs one spawn round if the pool is running.
    ///
    /// Returns the number of workers started or restarted.
    pub fn spawn_workers(&self) -> usize {
        let st = self.state.lock();
        if st.status != PoolStatus::Running {
            return 0;
        }
        let pending = usize::try_from(self.ctx.driver.pending()).unwrap_or(usize::MAX);
        let spawned = self.registry.grow(pending, &self.config.worker, || {
            Worker::spawn(Arc::clone(&self.ctx))
        });
        drop(st);

        if spawned > 0 {
            debug!(pool = %self.name(), spawned, workers = self.registry.len(), "workers spawned");
        }
        spawned
    }

    /// Stops idle workers past `max_idle_time`, releases stopped ones past
    /// `max_stopped_time`.
    async fn reap(&self) {
        let max_idle = self.config.worker.max_idle_time;
        let max_stopped = self.config.worker.max_stopped_time;

        let mut checks = JoinSet::new();
        for worker in self.registry.snapshot() {
            checks.spawn(async move {
                if worker.idle_for().is_some_and(|d| d > max_idle) {
                    worker.stop();
                    None
                } else if worker.stopped_for().is_some_and(|d| d > max_stopped) {
                    Some(worker.id())
                } else {
                    None
                }
            });
        }

        while let Some(res) = checks.join_next().await {
            let Ok(Some(id)) = res else { continue };
            if let Some(worker) = self.registry.remove_stopped(id) {
                worker.release().await;
                debug!(pool = %self.name(), worker = %id, "worker released");
            }
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    pub(crate) fn set_name(&self, name: impl Into<String>) {
        *self.name.write() = name.into();
    }

    pub fn status(&self) -> PoolStatus {
        self.state.lock().status
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Last time the pool was started.
    pub fn started_at(&self) -> Option<Instant> {
        self.state.lock().started_at
    }

    /// Last time the pool stopped running.
    pub fn stopped_at(&self) -> Option<Instant> {
        self.state.lock().stopped_at
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.ctx.bus
    }

    pub fn driver(&self) -> &DriverRef {
        &self.ctx.driver
    }

    /// Snapshot of the driver's counters.
    pub fn progress(&self) -> Progress {
        self.ctx.driver.progress()
    }

    /// Snapshot of the pool's workers.
    pub fn workers(&self) -> Vec<Arc<Worker>> {
        self.registry.snapshot()
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("status", &self.status())
            .field("workers", &self.registry.len())
            .finish()
    }
}

impl Drop for WorkerPool {
    /// Dropping an unreleased pool cancels its workers and background tasks.
    fn drop(&mut self) {
        self.ctx.root.cancel();
    }
}

/// Periodic upkeep of a running pool.
async fn watch_workers(pool: Weak<WorkerPool>, run: CancellationToken, every: Duration) {
    let mut tick = time::interval(every);
    tick.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        select! {
            _ = run.cancelled() => break,
            _ = tick.tick() => {}
        }
        let Some(pool) = pool.upgrade() else { break };
        pool.reap().await;
        if pool.ctx.driver.pending() > 0 {
            pool.spawn_workers();
        }
    }
}

/// Publishes [`ProgressUpdated`] for every driver counter change.
///
/// Drivers without a watch channel are polled every `every`.
async fn forward_progress(ctx: Arc<WorkerContext>, run: CancellationToken, every: Duration) {
    match ctx.driver.watch_progress() {
        Some(rx) => forward_watched(&ctx.bus, rx, &run).await,
        None => forward_polled(&ctx, &run, every).await,
    }
}

async fn forward_watched(bus: &EventBus, mut rx: watch::Receiver<Progress>, run: &CancellationToken) {
    loop {
        select! {
            _ = run.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let progress = *rx.borrow_and_update();
                publish(bus, &ProgressUpdated { progress });
            }
        }
    }
}

async fn forward_polled(ctx: &WorkerContext, run: &CancellationToken, every: Duration) {
    let mut last = ctx.driver.progress();
    let mut tick = time::interval(every);
    tick.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        select! {
            _ = run.cancelled() => break,
            _ = tick.tick() => {}
        }
        let progress = ctx.driver.progress();
        if progress != last {
            last = progress;
            publish(&ctx.bus, &ProgressUpdated { progress });
        }
    }
}
