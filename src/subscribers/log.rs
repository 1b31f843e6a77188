//! # Tracing subscriber for pool lifecycle events.
//!
//! [`LogWriter`] attaches one clause per lifecycle topic and re-emits each
//! event through [`tracing`]. Pair it with any `tracing` subscriber
//! (`tracing-subscriber`'s `fmt` layer in the demos).
//!
//! ## Output (fmt layer)
//! ```text
//! DEBUG jobvisor::subscribers::log: job started job="send-mail"
//!  WARN jobvisor::subscribers::log: job retry scheduled job="send-mail" attempt=1 error=execution failed: smtp down
//! DEBUG jobvisor::subscribers::log: job done job="send-mail"
//! ERROR jobvisor::subscribers::log: job failed job="send-mail" error=fatal error (no retry): bad address label="job_fatal"
//! TRACE jobvisor::subscribers::log: progress total=3 pending=0 executing=0 completed=3 success=2 failed=1
//! ```
//!
//! ## Example
//! ```rust
//! use jobvisor::{EventBus, LogWriter};
//!
//! let bus = EventBus::with_lifecycle_topics();
//! bus.subscribe(&LogWriter::new()).unwrap();
//! ```

use tracing::{debug, error, trace, warn};

use crate::events::{
    AfterHandle, BeforeHandle, Clause, FailedHandle, ProgressUpdated, RetryHandle, Subscriber,
    TOPIC_AFTER_HANDLE, TOPIC_BEFORE_HANDLE, TOPIC_FAILED_HANDLE, TOPIC_PROGRESS_UPDATED,
    TOPIC_RETRY_HANDLE, clause,
};

/// Logs every lifecycle event. Never stops propagation.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter {
    progress: bool,
}

impl LogWriter {
    /// Logs job events; progress updates are skipped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also logs [`ProgressUpdated`] (at `trace`).
    pub fn with_progress(mut self) -> Self {
        self.progress = true;
        self
    }
}

impl Subscriber for LogWriter {
    fn subscriptions(&self) -> Vec<(String, Vec<Clause>)> {
        let mut subs: Vec<(String, Vec<Clause>)> = vec![
            (
                TOPIC_BEFORE_HANDLE.into(),
                vec![clause(|ev| {
                    if let Some(e) = ev.downcast_ref::<BeforeHandle>() {
                        debug!(job = e.job.name(), "job started");
                    }
                    true
                })],
            ),
            (
                TOPIC_AFTER_HANDLE.into(),
                vec![clause(|ev| {
                    if let Some(e) = ev.downcast_ref::<AfterHandle>() {
                        debug!(job = e.job.name(), "job done");
                    }
                    true
                })],
            ),
            (
                TOPIC_RETRY_HANDLE.into(),
                vec![clause(|ev| {
                    if let Some(e) = ev.downcast_ref::<RetryHandle>() {
                        warn!(job = e.job.name(), attempt = e.attempt, error = %e.error, "job retry scheduled");
                    }
                    true
                })],
            ),
            (
                TOPIC_FAILED_HANDLE.into(),
                vec![clause(|ev| {
                    if let Some(e) = ev.downcast_ref::<FailedHandle>() {
                        error!(job = e.job.name(), error = %e.error, label = e.error.as_label(), "job failed");
                    }
                    true
                })],
            ),
        ];

        if self.progress {
            subs.push((
                TOPIC_PROGRESS_UPDATED.into(),
                vec![clause(|ev| {
                    if let Some(ProgressUpdated { progress: p }) = ev.downcast_ref::<ProgressUpdated>() {
                        trace!(
                            total = p.total,
                            pending = p.pending,
                            executing = p.executing,
                            completed = p.completed,
                            success = p.success,
                            failed = p.failed,
                            "progress"
                        );
                    }
                    true
                })],
            ));
        }
        subs
    }
}
