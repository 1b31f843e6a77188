//! # Job contract.
//!
//! A [`Job`] is a unit of work with its own retry/timeout policy and an async
//! [`handle`](Job::handle) method. Every policy knob returns `Option`: `None`
//! defers to the pool's [`JobDefaults`](crate::JobDefaults).
//!
//! `handle` receives a [`CancellationToken`] that is cancelled when the
//! attempt times out. The attempt's future is dropped at that point as well;
//! the token lets jobs that spawn their own work (threads, child tasks) stop it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;

/// Shared handle to a job.
pub type JobRef = Arc<dyn Job>;

/// # Asynchronous unit of work with retry and timeout policy.
///
/// Only [`handle`](Job::handle) is required.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use jobvisor::{Job, JobError};
///
/// struct SendMail { to: String }
///
/// #[async_trait]
/// impl Job for SendMail {
///     fn name(&self) -> &str { "send-mail" }
///
///     fn max_attempts(&self) -> Option<u32> { Some(5) }
///
///     fn max_execute_time(&self) -> Option<Duration> { Some(Duration::from_secs(10)) }
///
///     async fn handle(&self, ctx: CancellationToken) -> Result<(), JobError> {
///         if ctx.is_cancelled() {
///             return Err(JobError::fail("cancelled"));
///         }
///         // deliver to self.to ...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Whether failed attempts may be retried at all.
    fn retryable(&self) -> bool {
        true
    }

    /// Whether this particular error should be retried.
    ///
    /// Defaults to [`JobError::is_retryable`].
    fn should_retry(&self, err: &JobError) -> bool {
        err.is_retryable()
    }

    /// Maximum number of attempts (`0` is treated as `1`).
    fn max_attempts(&self) -> Option<u32> {
        None
    }

    /// Base delay before a retry.
    fn retry_delay(&self) -> Option<Duration> {
        None
    }

    /// Cap of the retry delay.
    fn retry_max_delay(&self) -> Option<Duration> {
        None
    }

    /// Delay added per failed attempt.
    fn retry_delay_step(&self) -> Option<Duration> {
        None
    }

    /// Per-attempt execute time limit (`0` = no limit).
    fn max_execute_time(&self) -> Option<Duration> {
        None
    }

    /// Limit on the time across all attempts, backoff included (`0` = no limit).
    fn max_execute_time_total(&self) -> Option<Duration> {
        None
    }

    /// Executes one attempt.
    async fn handle(&self, ctx: CancellationToken) -> Result<(), JobError>;
}
