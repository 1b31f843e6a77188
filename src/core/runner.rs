//! # Runs one job to completion: attempts, timeouts, retries.
//!
//! [`run_job`] drives every attempt of a single job on the calling task and
//! reports the outcome through lifecycle events on the pool's [`EventBus`].
//!
//! ## Event flow
//! ```text
//! BeforeHandle
//!   └─► attempt 1 ── Ok ──────────────────────────► AfterHandle   (true)
//!          │
//!          └─ Err ─┬─ retry allowed ─► RetryHandle ─► sleep(backoff) ─► attempt 2 ...
//!                  └─ otherwise ────────────────────► FailedHandle  (false)
//! ```
//!
//! ## Rules
//! - Attempts run **sequentially**; the attempt counter starts at 1.
//! - Each attempt runs under `min(per-attempt timeout, remaining total time)`.
//! - On timeout the attempt's token is cancelled and its future dropped.
//! - A panic inside `handle` becomes [`JobError::Panicked`].
//! - Crossing the total deadline fails the job whatever the retry policy says.
//! - Exactly one terminal event (`AfterHandle` or `FailedHandle`) per job.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::config::JobDefaults;
use crate::error::JobError;
use crate::events::{AfterHandle, BeforeHandle, Event, EventBus, FailedHandle, RetryHandle};
use crate::jobs::{Job, JobRef, JobSpec};

/// Runs `job` until it succeeds or runs out of attempts.
///
/// `parent` is the pool's root token: each attempt gets a child of it, so
/// releasing the pool signals in-flight jobs.
///
/// Returns `true` on success.
pub(crate) async fn run_job(
    job: &JobRef,
    defaults: &JobDefaults,
    bus: &EventBus,
    parent: &CancellationToken,
) -> bool {
    let spec = JobSpec::resolve(job.as_ref(), defaults);
    let deadline = spec.total_timeout.map(|total| Instant::now() + total);

    publish(bus, &BeforeHandle { job: job.clone() });

    let mut attempt: u32 = 1;
    loop {
        let left = remaining(deadline);
        let res = if left == Some(Duration::ZERO) {
            Err(total_timeout(&spec))
        } else {
            run_attempt(job.as_ref(), shortest(spec.attempt_timeout, left), parent).await
        };

        let err = match res {
            Ok(()) => {
                debug!(job = job.name(), attempt, "job handled");
                publish(bus, &AfterHandle { job: job.clone() });
                return true;
            }
            Err(err) => err,
        };

        let expired = remaining(deadline) == Some(Duration::ZERO);
        let err = if expired { total_timeout(&spec) } else { err };

        if expired || !spec.allows_retry_after(attempt) || !job.should_retry(&err) {
            warn!(job = job.name(), attempt, error = %err, "job failed");
            publish(
                bus,
                &FailedHandle {
                    job: job.clone(),
                    error: err,
                },
            );
            return false;
        }

        let delay = spec.backoff.next(attempt);
        warn!(job = job.name(), attempt, error = %err, ?delay, "job attempt failed, retrying");
        publish(
            bus,
            &RetryHandle {
                job: job.clone(),
                attempt,
                error: err,
            },
        );

        if !delay.is_zero() {
            time::sleep(delay).await;
        }
        attempt += 1;
    }
}

/// Executes one attempt of `job` with an optional time limit.
async fn run_attempt(
    job: &dyn Job,
    limit: Option<Duration>,
    parent: &CancellationToken,
) -> Result<(), JobError> {
    let child = parent.child_token();
    let ctx = child.clone();
    // The future is built inside the guard so a panic before its first poll is caught too.
    let attempt = AssertUnwindSafe(async move { job.handle(ctx).await }).catch_unwind();

    let caught = match limit {
        Some(dur) => match time::timeout(dur, attempt).await {
            Ok(caught) => caught,
            Err(_elapsed) => {
                child.cancel();
                return Err(JobError::Timeout { timeout: dur });
            }
        },
        None => attempt.await,
    };

    caught.unwrap_or_else(|payload| Err(JobError::from_panic(&*payload)))
}

/// Dispatches a lifecycle event; failures are logged and swallowed.
pub(crate) fn publish(bus: &EventBus, event: &dyn Event) {
    if let Err(err) = bus.dispatch(event, None) {
        warn!(topic = event.topic(), error = %err, label = err.as_label(), "event dispatch failed");
    }
}

/// Time left until `deadline`, saturating at zero.
fn remaining(deadline: Option<Instant>) -> Option<Duration> {
    deadline.map(|d| d.saturating_duration_since(Instant::now()))
}

fn shortest(a: Option<Duration>, b: Option<Duration>) -> Option<Duration> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn total_timeout(spec: &JobSpec) -> JobError {
    JobError::Timeout {
        timeout: spec.total_timeout.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{TOPIC_AFTER_HANDLE, TOPIC_FAILED_HANDLE, TOPIC_RETRY_HANDLE, clause};
    use crate::jobs::JobFn;
    use parking_lot::Mutex;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Bus recording every lifecycle event as `(topic, attempt)`.
    fn recording_bus() -> (EventBus, Arc<Mutex<Vec<(String, Option<u32>)>>>) {
        let bus = EventBus::with_lifecycle_topics();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for topic in bus.list_topics() {
            let seen = Arc::clone(&seen);
            bus.on_topic(
                &topic,
                clause(move |ev| {
                    let attempt = ev.downcast_ref::<RetryHandle>().map(|r| r.attempt);
                    seen.lock().push((ev.topic().to_string(), attempt));
                    true
                }),
            )
            .unwrap();
        }
        (bus, seen)
    }

    fn fast_defaults(max_attempts: u32) -> JobDefaults {
        JobDefaults {
            max_attempts,
            retry_delay: Duration::ZERO,
            retry_delay_step: Duration::ZERO,
            ..JobDefaults::default()
        }
    }

    fn terminal(seen: &[(String, Option<u32>)]) -> Vec<&str> {
        seen.iter()
            .map(|(t, _)| t.as_str())
            .filter(|t| *t != "before-handle")
            .collect()
    }

    #[tokio::test]
    async fn test_success_on_third_attempt() {
        let (bus, seen) = recording_bus();
        let calls = Arc::new(AtomicU32::new(0));
        let job: JobRef = {
            let calls = Arc::clone(&calls);
            JobFn::arc("flaky", move |_ctx: CancellationToken| {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(JobError::fail("not yet"))
                    } else {
                        Ok(())
                    }
                }
            })
        };

        let ok = run_job(&job, &fast_defaults(5), &bus, &CancellationToken::new()).await;
        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let seen = seen.lock();
        assert_eq!(
            terminal(&seen),
            [TOPIC_RETRY_HANDLE, TOPIC_RETRY_HANDLE, TOPIC_AFTER_HANDLE]
        );
        assert_eq!(seen[1].1, Some(1));
        assert_eq!(seen[2].1, Some(2));
    }

    #[tokio::test]
    async fn test_exhausted_attempts_fail_once() {
        let (bus, seen) = recording_bus();
        let job: JobRef = JobFn::arc("always", |_ctx: CancellationToken| async {
            Err::<(), _>(JobError::fail("boom"))
        });

        let ok = run_job(&job, &fast_defaults(3), &bus, &CancellationToken::new()).await;
        assert!(!ok);
        assert_eq!(
            terminal(&seen.lock()),
            [TOPIC_RETRY_HANDLE, TOPIC_RETRY_HANDLE, TOPIC_FAILED_HANDLE]
        );
    }

    #[tokio::test]
    async fn test_not_retryable_fails_without_retry() {
        let (bus, seen) = recording_bus();
        let job: JobRef = Arc::new(
            JobFn::new("once", |_ctx: CancellationToken| async {
                Err::<(), _>(JobError::fail("boom"))
            })
            .not_retryable(),
        );

        assert!(!run_job(&job, &fast_defaults(5), &bus, &CancellationToken::new()).await);
        assert_eq!(terminal(&seen.lock()), [TOPIC_FAILED_HANDLE]);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let (bus, seen) = recording_bus();
        let job: JobRef = JobFn::arc("fatal", |_ctx: CancellationToken| async {
            Err::<(), _>(JobError::fatal("bad input"))
        });

        assert!(!run_job(&job, &fast_defaults(5), &bus, &CancellationToken::new()).await);
        assert_eq!(terminal(&seen.lock()), [TOPIC_FAILED_HANDLE]);
    }

    #[tokio::test]
    async fn test_panic_becomes_error() {
        let bus = EventBus::with_lifecycle_topics();
        let errors = Arc::new(Mutex::new(Vec::new()));
        {
            let errors = Arc::clone(&errors);
            bus.on_topic(
                TOPIC_FAILED_HANDLE,
                clause(move |ev| {
                    if let Some(f) = ev.downcast_ref::<FailedHandle>() {
                        errors.lock().push(f.error.clone());
                    }
                    true
                }),
            )
            .unwrap();
        }
        let job: JobRef = JobFn::arc("panics", |_ctx: CancellationToken| async {
            if true {
                panic!("kaboom");
            }
            Ok::<(), JobError>(())
        });

        assert!(!run_job(&job, &fast_defaults(1), &bus, &CancellationToken::new()).await);
        assert_eq!(
            *errors.lock(),
            [JobError::Panicked {
                info: "kaboom".into()
            }]
        );
    }

    /// Implements `handle` by hand and panics before any future exists.
    struct EagerPanic;

    impl Job for EagerPanic {
        fn name(&self) -> &str {
            "eager"
        }

        fn handle<'life0, 'async_trait>(
            &'life0 self,
            _ctx: CancellationToken,
        ) -> Pin<Box<dyn Future<Output = Result<(), JobError>> + Send + 'async_trait>>
        where
            'life0: 'async_trait,
            Self: 'async_trait,
        {
            panic!("eager panic");
        }
    }

    #[tokio::test]
    async fn test_panic_while_building_future_becomes_error() {
        let (bus, seen) = recording_bus();
        let errors = Arc::new(Mutex::new(Vec::new()));
        {
            let errors = Arc::clone(&errors);
            bus.on_topic(
                TOPIC_FAILED_HANDLE,
                clause(move |ev| {
                    if let Some(f) = ev.downcast_ref::<FailedHandle>() {
                        errors.lock().push(f.error.clone());
                    }
                    true
                }),
            )
            .unwrap();
        }
        let job: JobRef = Arc::new(EagerPanic);

        assert!(!run_job(&job, &fast_defaults(2), &bus, &CancellationToken::new()).await);
        assert_eq!(
            terminal(&seen.lock()),
            [TOPIC_RETRY_HANDLE, TOPIC_FAILED_HANDLE]
        );
        assert_eq!(
            *errors.lock(),
            [JobError::Panicked {
                info: "eager panic".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_attempt_timeout_cancels_token_and_retries() {
        let (bus, seen) = recording_bus();
        let cancelled = Arc::new(AtomicU32::new(0));
        let job: JobRef = {
            let cancelled = Arc::clone(&cancelled);
            Arc::new(
                JobFn::new("slow", move |ctx: CancellationToken| {
                    let cancelled = Arc::clone(&cancelled);
                    async move {
                        let watcher = ctx.clone();
                        tokio::spawn(async move {
                            watcher.cancelled().await;
                            cancelled.fetch_add(1, Ordering::SeqCst);
                        });
                        time::sleep(Duration::from_secs(5)).await;
                        Ok(())
                    }
                })
                .with_max_attempts(2)
                .with_max_execute_time(Duration::from_millis(20)),
            )
        };

        assert!(!run_job(&job, &fast_defaults(3), &bus, &CancellationToken::new()).await);
        assert_eq!(
            terminal(&seen.lock()),
            [TOPIC_RETRY_HANDLE, TOPIC_FAILED_HANDLE]
        );
        time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cancelled.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_total_deadline_is_fatal() {
        let (bus, seen) = recording_bus();
        let job: JobRef = Arc::new(
            JobFn::new("slow", |_ctx: CancellationToken| async {
                time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .with_max_attempts(10)
            .with_max_execute_time_total(Duration::from_millis(30)),
        );

        let started = Instant::now();
        assert!(!run_job(&job, &fast_defaults(10), &bus, &CancellationToken::new()).await);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(terminal(&seen.lock()), [TOPIC_FAILED_HANDLE]);
    }

    #[test]
    fn test_shortest() {
        let ms = Duration::from_millis;
        assert_eq!(shortest(Some(ms(5)), Some(ms(3))), Some(ms(3)));
        assert_eq!(shortest(None, Some(ms(3))), Some(ms(3)));
        assert_eq!(shortest(Some(ms(5)), None), Some(ms(5)));
        assert_eq!(shortest(None, None), None);
    }
}
