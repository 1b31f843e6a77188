//! # Effective execution policy of a job.
//!
//! [`JobSpec`] is what a worker actually runs a job under: the job's own
//! overrides where it has them, the pool's [`JobDefaults`] everywhere else.
//!
//! ## Rules
//! - `None` from a [`Job`] knob → pool default.
//! - `max_attempts = 0` → `1`.
//! - zero timeouts → no timeout.
//! - `retryable() == false` → a single attempt, whatever `max_attempts` says.

use std::time::Duration;

use crate::core::config::{JobDefaults, non_zero};
use crate::jobs::job::Job;
use crate::policies::RetryBackoff;

/// Resolved retry/timeout policy for one job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobSpec {
    /// Whether failed attempts may be retried.
    pub retryable: bool,
    /// Maximum attempts (at least 1).
    pub max_attempts: u32,
    /// Delay between attempts.
    pub backoff: RetryBackoff,
    /// Per-attempt limit (`None` = no limit).
    pub attempt_timeout: Option<Duration>,
    /// Limit across all attempts (`None` = no limit).
    pub total_timeout: Option<Duration>,
}

impl JobSpec {
    /// Resolves `job`'s overrides against `defaults`.
    pub fn resolve<J: Job + ?Sized>(job: &J, defaults: &JobDefaults) -> Self {
        let base = defaults.backoff();
        Self {
            retryable: job.retryable(),
            max_attempts: job.max_attempts().unwrap_or(defaults.max_attempts).max(1),
            backoff: RetryBackoff {
                delay: job.retry_delay().unwrap_or(base.delay),
                step: job.retry_delay_step().unwrap_or(base.step),
                max: job.retry_max_delay().unwrap_or(base.max),
                jitter: base.jitter,
            },
            attempt_timeout: job
                .max_execute_time()
                .map_or(defaults.attempt_timeout(), non_zero),
            total_timeout: job
                .max_execute_time_total()
                .map_or(defaults.total_timeout(), non_zero),
        }
    }

    /// True if another attempt is allowed after `attempt` (1-based) failed.
    #[inline]
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        self.retryable && attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;
    use crate::jobs::JobFn;
    use tokio_util::sync::CancellationToken;

    async fn noop(_ctx: CancellationToken) -> Result<(), JobError> {
        Ok(())
    }

    #[test]
    fn test_unset_knobs_use_defaults() {
        let defaults = JobDefaults {
            max_execute_time_per_attempt: Duration::from_secs(2),
            ..JobDefaults::default()
        };
        let job = JobFn::new("plain", noop);
        let spec = JobSpec::resolve(&job, &defaults);

        assert!(spec.retryable);
        assert_eq!(spec.max_attempts, 3);
        assert_eq!(spec.backoff, defaults.backoff());
        assert_eq!(spec.attempt_timeout, Some(Duration::from_secs(2)));
        assert_eq!(spec.total_timeout, None);
    }

    #[test]
    fn test_overrides_win() {
        let defaults = JobDefaults::default();
        let job = JobFn::new("tuned", noop)
            .with_max_attempts(0)
            .with_retry_delay(Duration::ZERO)
            .with_retry_delay_step(Duration::from_millis(7))
            .with_retry_max_delay(Duration::from_millis(20))
            .with_max_execute_time(Duration::from_millis(50))
            .with_max_execute_time_total(Duration::from_secs(1));
        let spec = JobSpec::resolve(&job, &defaults);

        assert_eq!(spec.max_attempts, 1);
        assert_eq!(spec.backoff.delay, Duration::ZERO);
        assert_eq!(spec.backoff.step, Duration::from_millis(7));
        assert_eq!(spec.backoff.max, Duration::from_millis(20));
        assert_eq!(spec.attempt_timeout, Some(Duration::from_millis(50)));
        assert_eq!(spec.total_timeout, Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_zero_override_disables_default_timeout() {
        let defaults = JobDefaults {
            max_execute_time_per_attempt: Duration::from_secs(2),
            ..JobDefaults::default()
        };
        let job = JobFn::new("unbounded", noop).with_max_execute_time(Duration::ZERO);
        assert_eq!(JobSpec::resolve(&job, &defaults).attempt_timeout, None);
    }

    #[test]
    fn test_not_retryable_allows_no_retry() {
        let job = JobFn::new("once", noop).not_retryable();
        let spec = JobSpec::resolve(&job, &JobDefaults::default());
        assert!(!spec.allows_retry_after(1));

        let job = JobFn::new("thrice", noop).with_max_attempts(3);
        let spec = JobSpec::resolve(&job, &JobDefaults::default());
        assert!(spec.allows_retry_after(2));
        assert!(!spec.allows_retry_after(3));
    }
}
