//! Runtime core: pools, workers and job execution.
//!
//! Public API from this module: [`WorkerPool`], [`WorkerPoolManager`],
//! [`Worker`] and the configuration types.
//!
//! Internal modules:
//! - [`runner`]: runs one job's attempts with timeouts, retries and lifecycle events;
//! - [`worker`]: a run loop pulling jobs from the pool's driver;
//! - [`registry`]: the pool's workers and the spawn round;
//! - [`pool`]: worker upkeep, dispatch and pool lifecycle;
//! - [`manager`]: named pools sharing one event bus.

mod builder;
pub(crate) mod config;
mod manager;
mod pool;
mod registry;
mod runner;
mod worker;

pub use builder::WorkerPoolBuilder;
pub use config::{JobDefaults, PoolConfig, PoolOption, WorkerConfig};
pub use manager::WorkerPoolManager;
pub use pool::{PoolStatus, WorkerPool};
pub use worker::{Worker, WorkerStatus};
