//! # Function-backed job (`JobFn`)
//!
//! [`JobFn`] wraps a closure `F: Fn(CancellationToken) -> Fut`, producing a
//! fresh future per attempt. Policy overrides are set with the `with_*`
//! builders; anything left unset defers to the pool defaults.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use jobvisor::{Job, JobError, JobFn, JobRef};
//!
//! let job: JobRef = JobFn::new("resize", |_ctx: CancellationToken| async move {
//!     Ok::<_, JobError>(())
//! })
//! .with_max_attempts(5)
//! .with_retry_delay(Duration::from_millis(10))
//! .into_ref();
//!
//! assert_eq!(job.name(), "resize");
//! assert_eq!(job.max_attempts(), Some(5));
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;
use crate::jobs::job::{Job, JobRef};

/// Optional per-job policy values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Overrides {
    not_retryable: bool,
    max_attempts: Option<u32>,
    retry_delay: Option<Duration>,
    retry_max_delay: Option<Duration>,
    retry_delay_step: Option<Duration>,
    max_execute_time: Option<Duration>,
    max_execute_time_total: Option<Duration>,
}

/// Function-backed job implementation.
pub struct JobFn<F> {
    name: Cow<'static, str>,
    f: F,
    overrides: Overrides,
}

impl<F> JobFn<F> {
    /// Creates a new function-backed job.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            overrides: Overrides::default(),
        }
    }

    /// Creates the job and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }

    /// Disables retries for this job.
    pub fn not_retryable(mut self) -> Self {
        self.overrides.not_retryable = true;
        self
    }

    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.overrides.max_attempts = Some(n);
        self
    }

    pub fn with_retry_delay(mut self, d: Duration) -> Self {
        self.overrides.retry_delay = Some(d);
        self
    }

    pub fn with_retry_max_delay(mut self, d: Duration) -> Self {
        self.overrides.retry_max_delay = Some(d);
        self
    }

    pub fn with_retry_delay_step(mut self, d: Duration) -> Self {
        self.overrides.retry_delay_step = Some(d);
        self
    }

    /// Per-attempt execute time limit.
    pub fn with_max_execute_time(mut self, d: Duration) -> Self {
        self.overrides.max_execute_time = Some(d);
        self
    }

    /// Limit across all attempts.
    pub fn with_max_execute_time_total(mut self, d: Duration) -> Self {
        self.overrides.max_execute_time_total = Some(d);
        self
    }
}

impl<F, Fut> JobFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    /// Finishes building and returns the job as a [`JobRef`].
    pub fn into_ref(self) -> JobRef {
        Arc::new(self)
    }
}

impl<F> fmt::Debug for JobFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobFn")
            .field("name", &self.name)
            .field("overrides", &self.overrides)
            .finish()
    }
}

#[async_trait]
impl<F, Fut> Job for JobFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn retryable(&self) -> bool {
        !self.overrides.not_retryable
    }

    fn max_attempts(&self) -> Option<u32> {
        self.overrides.max_attempts
    }

    fn retry_delay(&self) -> Option<Duration> {
        self.overrides.retry_delay
    }

    fn retry_max_delay(&self) -> Option<Duration> {
        self.overrides.retry_max_delay
    }

    fn retry_delay_step(&self) -> Option<Duration> {
        self.overrides.retry_delay_step
    }

    fn max_execute_time(&self) -> Option<Duration> {
        self.overrides.max_execute_time
    }

    fn max_execute_time_total(&self) -> Option<Duration> {
        self.overrides.max_execute_time_total
    }

    async fn handle(&self, ctx: CancellationToken) -> Result<(), JobError> {
        (self.f)(ctx).await
    }
}
