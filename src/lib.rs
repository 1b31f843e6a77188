//! # jobvisor
//!
//! **Jobvisor** is an in-process background job engine for Tokio.
//!
//! Producers dispatch [`Job`]s to a named [`WorkerPool`]. The pool keeps them
//! in a pluggable [`Driver`], runs them on a bounded, self-scaling set of
//! [`Worker`]s with per-job retry, backoff and timeout policy, and reports
//! every lifecycle step on a topic-keyed [`EventBus`].
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   producers ──dispatch(job)──┐
//!                              ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  WorkerPoolManager (named pools, one shared EventBus)             │
//! └──────┬──────────────────────────┬─────────────────────────────────┘
//!        ▼                          ▼
//! ┌──────────────────────┐   ┌──────────────────────┐
//! │ WorkerPool "mail"    │   │ WorkerPool "thumbs"  │
//! │  - Driver (queue +   │   │  - Driver            │
//! │    counters)         │   │  - Registry          │
//! │  - Registry (≤ max)  │   │  - watcher           │
//! │  - watcher           │   │  - progress fwd      │
//! │  - progress fwd      │   └──────────────────────┘
//! └──┬────────┬──────────┘
//!    ▼        ▼
//! Worker   Worker ... (Idle ⇄ Working → Stopped)
//!    │        │
//!    │ run_job: BeforeHandle → attempt → RetryHandle ... → AfterHandle | FailedHandle
//!    ▼        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  EventBus: topic → [stateful listeners..., clauses...]            │
//! └───────────────────────────────────────────────────────────────────┘
//!        ▼              ▼               ▼
//!    LogWriter     metrics clause   custom Listener
//! ```
//!
//! ### Job lifecycle
//! ```text
//! dispatch ─► Driver.enqueue (pending+1)
//!          ─► Worker.dequeue (pending-1, executing+1)
//!          ─► attempt 1..=max_attempts
//!               ├─ Ok                          ─► AfterHandle
//!               ├─ Err, retry allowed          ─► RetryHandle, sleep(backoff)
//!               └─ Err, fatal/exhausted/expired ─► FailedHandle
//!          ─► Driver.complete (executing-1, completed+1, success|failed+1)
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                         |
//! |-------------------|--------------------------------------------------------------|--------------------------------------------|
//! | **Jobs**          | Async units of work with optional policy overrides.          | [`Job`], [`JobFn`], [`JobRef`], [`JobSpec`] |
//! | **Drivers**       | Queues with lifecycle counters and progress watch.           | [`Driver`], [`MemoryDriver`], [`QueueDriver`] |
//! | **Pools**         | Bounded worker sets with idle/stopped reclaim.               | [`WorkerPool`], [`Worker`]                 |
//! | **Management**    | Named pools sharing one bus.                                 | [`WorkerPoolManager`]                      |
//! | **Events**        | Topic registry with listeners and subscribers.               | [`EventBus`], [`Listener`], [`Subscriber`] |
//! | **Policies**      | Linear retry backoff with optional jitter.                   | [`RetryBackoff`], [`JitterPolicy`]         |
//! | **Configuration** | Pool and job defaults, applied as options.                   | [`PoolConfig`], [`PoolOption`]             |
//! | **Errors**        | Typed errors for jobs, pools and the bus.                    | [`JobError`], [`PoolError`], [`EventBusError`] |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use jobvisor::{
//!     AfterHandle, JobError, JobFn, LogWriter, MemoryDriver, PoolOption, TOPIC_AFTER_HANDLE,
//!     WorkerPoolManager, clause,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = WorkerPoolManager::new();
//!     manager.bus().subscribe(&LogWriter::new())?;
//!     manager.bus().on_topic(TOPIC_AFTER_HANDLE, clause(|ev| {
//!         if let Some(done) = ev.downcast_ref::<AfterHandle>() {
//!             println!("done: {}", done.job.name());
//!         }
//!         true
//!     }))?;
//!
//!     let (pool, _) = manager.create(
//!         "mail",
//!         Arc::new(MemoryDriver::new()),
//!         [PoolOption::MaxWorkers(4), PoolOption::JobMaxAttempts(5)],
//!     );
//!     manager.start_all().await;
//!
//!     pool.dispatch(JobFn::arc("hello", |ctx: CancellationToken| async move {
//!         if ctx.is_cancelled() {
//!             return Err(JobError::fail("cancelled"));
//!         }
//!         println!("Hello from job!");
//!         Ok(())
//!     }));
//!
//!     tokio::time::sleep(Duration::from_millis(50)).await;
//!     assert_eq!(pool.progress().success, 1);
//!
//!     manager.release_all().await;
//!     Ok(())
//! }
//! ```

mod core;
mod drivers;
mod error;
mod events;
mod jobs;
mod policies;
mod subscribers;

// ---- Public re-exports ----

pub use crate::core::{
    JobDefaults, PoolConfig, PoolOption, PoolStatus, Worker, WorkerConfig, WorkerPool,
    WorkerPoolBuilder, WorkerPoolManager, WorkerStatus,
};
pub use drivers::{BlockingQueue, Counters, Driver, DriverRef, MemoryDriver, Progress, QueueDriver};
pub use error::{EventBusError, JobError, PoolError};
pub use events::{
    AfterHandle, AsAny, BeforeHandle, Clause, Event, EventBus, EventSpec, FailedHandle, InitData,
    LIFECYCLE_TOPICS, Listener, ProgressUpdated, RetryHandle, Subscriber, TOPIC_AFTER_HANDLE,
    TOPIC_BEFORE_HANDLE, TOPIC_FAILED_HANDLE, TOPIC_PROGRESS_UPDATED, TOPIC_RETRY_HANDLE, clause,
};
pub use jobs::{Job, JobFn, JobRef, JobSpec};
pub use policies::{JitterPolicy, RetryBackoff};
pub use subscribers::LogWriter;
