//! # Worker: pulls jobs from the pool's driver and runs them.
//!
//! A [`Worker`] owns one Tokio task (its run loop). The loop takes jobs from
//! the shared [`Driver`] one at a time and hands each to the job runner.
//!
//! ## States
//! ```text
//!          dequeue            job done
//!   Idle ───────────► Working ─────────► Idle
//!    │                   │
//!    │ stop()            │ stop(): finishes the current job first
//!    ▼                   ▼
//!  Stopped ◄─────────────┘
//!    │
//!    └── start() ──► Idle   (pool reuses stopped workers)
//! ```
//!
//! ## Wake-ups
//! An idle worker sleeps until one of:
//! - the pool's [`Notify`] fires (a job was dispatched),
//! - its own token is cancelled (`stop()` or pool release),
//! - `idle_poll_interval` elapses (jobs enqueued behind the pool's back).
//!
//! ## Rules
//! - `stop()` never interrupts a running job.
//! - Taking a job and becoming `Working` happen under the worker's lock, so
//!   a concurrent `stop()` either wins before the dequeue or lets the job run.
//! - A restarted worker bumps its generation; a stale run loop exiting late
//!   never marks the restarted worker as stopped.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::config::JobDefaults;
use crate::core::runner::run_job;
use crate::drivers::DriverRef;
use crate::events::EventBus;
use crate::jobs::JobRef;

/// Lifecycle state of a [`Worker`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkerStatus {
    /// Waiting for a job.
    Idle,
    /// Running a job.
    Working,
    /// Run loop ended (or ending); may be restarted.
    Stopped,
}

/// Everything a worker shares with its pool.
pub(crate) struct WorkerContext {
    pub(crate) pool: Uuid,
    pub(crate) driver: DriverRef,
    pub(crate) bus: Arc<EventBus>,
    pub(crate) defaults: JobDefaults,
    pub(crate) wake: Arc<Notify>,
    pub(crate) root: CancellationToken,
    pub(crate) idle_poll_interval: Duration,
}

enum Take {
    Exit,
    Empty,
    Job(JobRef),
}

struct WorkerState {
    status: WorkerStatus,
    idled_at: Instant,
    stopped_at: Option<Instant>,
    generation: u64,
    token: CancellationToken,
    join: Option<JoinHandle<()>>,
}

/// A job-executing task owned by a [`WorkerPool`](crate::WorkerPool).
pub struct Worker {
    id: Uuid,
    created_at: Instant,
    ctx: Arc<WorkerContext>,
    state: Mutex<WorkerState>,
}

impl Worker {
    /// Creates an idle worker and spawns its run loop.
    pub(crate) fn spawn(ctx: Arc<WorkerContext>) -> Arc<Self> {
        let now = Instant::now();
        let token = ctx.root.child_token();
        let worker = Arc::new(Self {
            id: Uuid::new_v4(),
            created_at: now,
            ctx,
            state: Mutex::new(WorkerState {
                status: WorkerStatus::Idle,
                idled_at: now,
                stopped_at: None,
                generation: 0,
                token: token.clone(),
                join: None,
            }),
        });

        let join = tokio::spawn(Arc::clone(&worker).run(0, token));
        worker.state.lock().join = Some(join);
        debug!(pool = %worker.ctx.pool, worker = %worker.id, "worker spawned");
        worker
    }

    /// Restarts a stopped worker. Returns `false` if it was not stopped or
    /// the pool has been released.
    pub(crate) fn start(self: &Arc<Self>) -> bool {
        if self.ctx.root.is_cancelled() {
            return false;
        }
        let mut st = self.state.lock();
        if st.status != WorkerStatus::Stopped {
            return false;
        }

        st.generation += 1;
        st.token = self.ctx.root.child_token();
        st.status = WorkerStatus::Idle;
        st.idled_at = Instant::now();
        st.stopped_at = None;
        st.join = Some(tokio::spawn(
            Arc::clone(self).run(st.generation, st.token.clone()),
        ));
        debug!(pool = %self.ctx.pool, worker = %self.id, generation = st.generation, "worker restarted");
        true
    }

    /// Asks the worker to stop.
    ///
    /// An idle worker is `Stopped` right away; a working one stops once its
    /// current job finishes.
    pub fn stop(&self) {
        let mut st = self.state.lock();
        st.token.cancel();
        if st.status == WorkerStatus::Idle {
            st.status = WorkerStatus::Stopped;
            st.stopped_at = Some(Instant::now());
            debug!(pool = %self.ctx.pool, worker = %self.id, "worker stopped");
        }
    }

    /// Stops the worker and waits for its run loop to exit.
    pub(crate) async fn release(&self) {
        self.stop();
        let join = self.state.lock().join.take();
        if let Some(join) = join {
            if let Err(err) = join.await {
                warn!(worker = %self.id, error = %err, "worker task ended abnormally");
            }
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> WorkerStatus {
        self.state.lock().status
    }

    pub fn is_idle(&self) -> bool {
        self.status() == WorkerStatus::Idle
    }

    pub fn is_working(&self) -> bool {
        self.status() == WorkerStatus::Working
    }

    pub fn is_stopped(&self) -> bool {
        self.status() == WorkerStatus::Stopped
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// When the worker last became idle.
    pub fn idled_at(&self) -> Instant {
        self.state.lock().idled_at
    }

    /// When the worker stopped; `None` unless `Stopped`.
    pub fn stopped_at(&self) -> Option<Instant> {
        self.state.lock().stopped_at
    }

    /// How long the worker has been idle; `None` unless `Idle`.
    pub fn idle_for(&self) -> Option<Duration> {
        let st = self.state.lock();
        (st.status == WorkerStatus::Idle).then(|| st.idled_at.elapsed())
    }

    /// How long the worker has been stopped; `None` unless `Stopped`.
    pub fn stopped_for(&self) -> Option<Duration> {
        let st = self.state.lock();
        match st.status {
            WorkerStatus::Stopped => st.stopped_at.map(|at| at.elapsed()),
            _ => None,
        }
    }

    async fn run(self: Arc<Self>, generation: u64, token: CancellationToken) {
        let wake = Arc::clone(&self.ctx.wake);

        loop {
            let notified = wake.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.take_job(generation, &token) {
                Take::Exit => break,
                Take::Empty => {}
                Take::Job(job) => {
                    debug!(pool = %self.ctx.pool, worker = %self.id, job = job.name(), "job picked up");
                    let ok = run_job(&job, &self.ctx.defaults, &self.ctx.bus, &self.ctx.root).await;
                    self.ctx.driver.complete(ok);
                    if !self.finish_job(generation, &token) {
                        break;
                    }
                    continue;
                }
            }

            select! {
                _ = &mut notified => {}
                _ = token.cancelled() => break,
                _ = time::sleep(self.ctx.idle_poll_interval) => {}
            }
        }

        self.mark_stopped(generation);
    }

    fn take_job(&self, generation: u64, token: &CancellationToken) -> Take {
        let mut st = self.state.lock();
        if st.generation != generation || token.is_cancelled() {
            return Take::Exit;
        }
        match self.ctx.driver.dequeue() {
            Some(job) => {
                st.status = WorkerStatus::Working;
                Take::Job(job)
            }
            None => Take::Empty,
        }
    }

    /// Back to `Idle`, or `Stopped` if a stop arrived mid-job.
    fn finish_job(&self, generation: u64, token: &CancellationToken) -> bool {
        let mut st = self.state.lock();
        if st.generation != generation {
            return false;
        }
        let now = Instant::now();
        if token.is_cancelled() {
            st.status = WorkerStatus::Stopped;
            st.stopped_at = Some(now);
            debug!(pool = %self.ctx.pool, worker = %self.id, "worker stopped after job");
            false
        } else {
            st.status = WorkerStatus::Idle;
            st.idled_at = now;
            true
        }
    }

    fn mark_stopped(&self, generation: u64) {
        let mut st = self.state.lock();
        if st.generation == generation && st.status != WorkerStatus::Stopped {
            st.status = WorkerStatus::Stopped;
            st.stopped_at = Some(Instant::now());
        }
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}
