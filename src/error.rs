//! Error types used by jobvisor pools, jobs and the event bus.
//!
//! This module defines three error enums:
//!
//! - [`JobError`]: errors raised by individual job attempts.
//! - [`PoolError`]: registration conflicts in the [`WorkerPoolManager`](crate::WorkerPoolManager).
//! - [`EventBusError`]: topic registration and dispatch failures on the [`EventBus`](crate::EventBus).
//!
//! All types provide `as_label` for logging/metrics. Job errors never escape a
//! worker: they are turned into lifecycle events and driver counter updates.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by job execution.
///
/// Returned by [`Job::handle`](crate::Job::handle) or synthesized by the worker
/// (timeouts, panics). Some errors are retryable (`Fail`, `Timeout`,
/// `Panicked`), `Fatal` is not.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Attempt failed but may succeed if retried.
    #[error("execution failed: {reason}")]
    Fail {
        /// The underlying error message.
        reason: String,
    },

    /// Non-recoverable error (never retried by the default policy).
    #[error("fatal error (no retry): {reason}")]
    Fatal {
        /// The underlying error message.
        reason: String,
    },

    /// Execution exceeded its per-attempt or total execute time.
    #[error("job execute timeout after {timeout:?}")]
    Timeout {
        /// The limit that was exceeded.
        timeout: Duration,
    },

    /// Reserved for signaling a per-attempt-only timeout separately from
    /// [`JobError::Timeout`]. Workers do not produce it today.
    #[error("job attempt timeout after {timeout:?}")]
    AttemptTimeout {
        /// The per-attempt limit that was exceeded.
        timeout: Duration,
    },

    /// `handle()` panicked; the payload is rendered into `info`.
    #[error("job panicked: {info}")]
    Panicked {
        /// Panic message, or `"unknown panic"` when it is not a string.
        info: String,
    },
}

impl JobError {
    /// Shorthand for [`JobError::Fail`].
    pub fn fail(reason: impl Into<String>) -> Self {
        JobError::Fail {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`JobError::Fatal`].
    pub fn fatal(reason: impl Into<String>) -> Self {
        JobError::Fatal {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use jobvisor::JobError;
    /// use std::time::Duration;
    ///
    /// let err = JobError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "job_execute_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            JobError::Fail { .. } => "job_failed",
            JobError::Fatal { .. } => "job_fatal",
            JobError::Timeout { .. } => "job_execute_timeout",
            JobError::AttemptTimeout { .. } => "job_attempt_timeout",
            JobError::Panicked { .. } => "job_unknown_err_panic",
        }
    }

    /// Indicates whether the error type is safe to retry.
    ///
    /// Returns `false` only for [`JobError::Fatal`].
    ///
    /// # Example
    /// ```
    /// use jobvisor::JobError;
    ///
    /// assert!(JobError::fail("boom").is_retryable());
    /// assert!(!JobError::fatal("nope").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        !matches!(self, JobError::Fatal { .. })
    }

    /// Converts a caught panic payload into [`JobError::Panicked`].
    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        JobError::Panicked {
            info: panic_info(payload),
        }
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_info(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// # Registration errors of the worker pool manager.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Another pool is already registered under this name.
    #[error("worker pool name \"{name}\" exists")]
    NameExists {
        /// The conflicting name.
        name: String,
    },

    /// This exact pool instance is already registered under another name.
    #[error("worker pool instance exists as \"{name}\"")]
    InstanceExists {
        /// The name the instance is registered under.
        name: String,
    },
}

impl PoolError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PoolError::NameExists { .. } => "pool_name_exists",
            PoolError::InstanceExists { .. } => "pool_instance_exists",
        }
    }
}

/// # Errors produced by the event bus.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    /// `add_event` was called for a topic that is already registered.
    #[error("topic \"{topic}\" exists")]
    TopicExists {
        /// The duplicate topic.
        topic: String,
    },

    /// A listener or subscriber referenced an unregistered topic.
    #[error("topic \"{topic}\" not found")]
    TopicNotFound {
        /// The missing topic.
        topic: String,
    },

    /// An event was dispatched on an unregistered topic.
    #[error("event \"{topic}\" not found")]
    EventNotFound {
        /// The topic of the dispatched event.
        topic: String,
    },
}

impl EventBusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventBusError::TopicExists { .. } => "bus_topic_exists",
            EventBusError::TopicNotFound { .. } => "bus_topic_not_found",
            EventBusError::EventNotFound { .. } => "bus_event_not_found",
        }
    }
}
