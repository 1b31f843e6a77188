//! # Worker pool configuration.
//!
//! Provides [`PoolConfig`], the settings a [`WorkerPool`](crate::WorkerPool)
//! is built with, split into two groups:
//! - [`WorkerConfig`] how many workers exist and when idle/stopped ones are reclaimed;
//! - [`JobDefaults`] retry/timeout policy for jobs that do not override it.
//!
//! Options ([`PoolOption`]) are applied in order over [`PoolConfig::default`].
//!
//! ## Sentinel values
//! - `max_workers = 0`, `batch = 0` → treated as `1`
//! - `max_attempts = 0` → treated as `1`
//! - `max_execute_time_per_attempt = 0s`, `max_execute_time_total = 0s` → no timeout
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use jobvisor::{PoolConfig, PoolOption};
//!
//! let cfg = PoolConfig::from_options([
//!     PoolOption::MaxWorkers(4),
//!     PoolOption::WorkerBatch(2),
//!     PoolOption::JobMaxAttempts(5),
//!     PoolOption::JobMaxExecuteTimePerAttempt(Duration::from_secs(3)),
//! ]);
//! assert_eq!(cfg.worker.per_round(), 2);
//! assert_eq!(cfg.job.attempt_timeout(), Some(Duration::from_secs(3)));
//! assert_eq!(cfg.job.total_timeout(), None);
//! ```

use std::time::Duration;

use crate::policies::{JitterPolicy, RetryBackoff};

/// Worker spawn and reclaim settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Upper bound of live workers (`0` is treated as `1`).
    pub max_workers: usize,

    /// Divisor for the number of workers spawned per round:
    /// `max_workers / batch` (or `max_workers` when that is `0`).
    pub batch: usize,

    /// An idle worker is stopped once it has been idle this long.
    pub max_idle_time: Duration,

    /// A stopped worker is released once it has been stopped this long.
    pub max_stopped_time: Duration,

    /// Period of the pool watcher.
    pub watch_interval: Duration,

    /// How often an idle worker re-polls the driver without a wake-up.
    ///
    /// Covers jobs enqueued on a shared driver outside of [`WorkerPool::dispatch`](crate::WorkerPool::dispatch).
    pub idle_poll_interval: Duration,
}

impl WorkerConfig {
    /// Worker bound clamped to a minimum of 1.
    #[inline]
    pub fn max_workers_clamped(&self) -> usize {
        self.max_workers.max(1)
    }

    /// Number of workers one spawn round may start.
    #[inline]
    pub fn per_round(&self) -> usize {
        let max = self.max_workers_clamped();
        match max / self.batch.max(1) {
            0 => max,
            n => n,
        }
    }
}

impl Default for WorkerConfig {
    /// - `max_workers = 10`
    /// - `batch = 1` (spawn up to `max_workers` in one round)
    /// - `max_idle_time = 60s`, `max_stopped_time = 60s`
    /// - `watch_interval = 100ms`, `idle_poll_interval = 250ms`
    fn default() -> Self {
        Self {
            max_workers: 10,
            batch: 1,
            max_idle_time: Duration::from_secs(60),
            max_stopped_time: Duration::from_secs(60),
            watch_interval: Duration::from_millis(100),
            idle_poll_interval: Duration::from_millis(250),
        }
    }
}

/// Retry and timeout policy applied to jobs that leave a knob unset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobDefaults {
    /// Maximum attempts per job (`0` is treated as `1`).
    pub max_attempts: u32,
    /// Base delay before a retry.
    pub retry_delay: Duration,
    /// Cap of the retry delay.
    pub retry_max_delay: Duration,
    /// Delay added per failed attempt.
    pub retry_delay_step: Duration,
    /// Per-attempt execute time limit (`0s` = none).
    pub max_execute_time_per_attempt: Duration,
    /// Limit across all attempts (`0s` = none).
    pub max_execute_time_total: Duration,
    /// Jitter applied to retry delays.
    pub jitter: JitterPolicy,
}

impl JobDefaults {
    /// Default per-attempt timeout as an `Option` (`None` = no timeout).
    #[inline]
    pub fn attempt_timeout(&self) -> Option<Duration> {
        non_zero(self.max_execute_time_per_attempt)
    }

    /// Default total timeout as an `Option` (`None` = no timeout).
    #[inline]
    pub fn total_timeout(&self) -> Option<Duration> {
        non_zero(self.max_execute_time_total)
    }

    /// Default retry backoff.
    pub fn backoff(&self) -> RetryBackoff {
        RetryBackoff {
            delay: self.retry_delay,
            step: self.retry_delay_step,
            max: self.retry_max_delay,
            jitter: self.jitter,
        }
    }
}

impl Default for JobDefaults {
    /// - `max_attempts = 3`
    /// - retry: `delay = 100ms`, `step = 100ms`, `max = 30s`, no jitter
    /// - no per-attempt or total timeout
    fn default() -> Self {
        let backoff = RetryBackoff::default();
        Self {
            max_attempts: 3,
            retry_delay: backoff.delay,
            retry_max_delay: backoff.max,
            retry_delay_step: backoff.step,
            max_execute_time_per_attempt: Duration::ZERO,
            max_execute_time_total: Duration::ZERO,
            jitter: backoff.jitter,
        }
    }
}

/// Full pool configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolConfig {
    /// Worker spawn and reclaim settings.
    pub worker: WorkerConfig,
    /// Job policy defaults.
    pub job: JobDefaults,
}

/// One configuration knob, applied at pool construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolOption {
    MaxWorkers(usize),
    WorkerBatch(usize),
    WorkerMaxIdleTime(Duration),
    WorkerMaxStoppedTime(Duration),
    WorkerWatchInterval(Duration),
    WorkerIdlePollInterval(Duration),
    JobMaxAttempts(u32),
    JobRetryDelay(Duration),
    JobRetryMaxDelay(Duration),
    JobRetryDelayStep(Duration),
    JobMaxExecuteTimePerAttempt(Duration),
    JobMaxExecuteTimeTotal(Duration),
    JobRetryJitter(JitterPolicy),
}

impl PoolConfig {
    /// Applies `options` in order over the defaults.
    pub fn from_options(options: impl IntoIterator<Item = PoolOption>) -> Self {
        let mut cfg = Self::default();
        for opt in options {
            cfg.apply(opt);
        }
        cfg
    }

    /// Applies a single option.
    pub fn apply(&mut self, option: PoolOption) {
        match option {
            PoolOption::MaxWorkers(n) => self.worker.max_workers = n.max(1),
            PoolOption::WorkerBatch(n) => self.worker.batch = n.max(1),
            PoolOption::WorkerMaxIdleTime(d) => self.worker.max_idle_time = d,
            PoolOption::WorkerMaxStoppedTime(d) => self.worker.max_stopped_time = d,
            PoolOption::WorkerWatchInterval(d) => self.worker.watch_interval = d,
            PoolOption::WorkerIdlePollInterval(d) => self.worker.idle_poll_interval = d,
            PoolOption::JobMaxAttempts(n) => self.job.max_attempts = n.max(1),
            PoolOption::JobRetryDelay(d) => self.job.retry_delay = d,
            PoolOption::JobRetryMaxDelay(d) => self.job.retry_max_delay = d,
            PoolOption::JobRetryDelayStep(d) => self.job.retry_delay_step = d,
            PoolOption::JobMaxExecuteTimePerAttempt(d) => {
                self.job.max_execute_time_per_attempt = d
            }
            PoolOption::JobMaxExecuteTimeTotal(d) => self.job.max_execute_time_total = d,
            PoolOption::JobRetryJitter(j) => self.job.jitter = j,
        }
    }
}

/// `None` for zero durations.
#[inline]
pub(crate) fn non_zero(d: Duration) -> Option<Duration> {
    if d.is_zero() { None } else { Some(d) }
}
