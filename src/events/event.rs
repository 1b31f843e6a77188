//! # Events routed by the [`EventBus`](crate::EventBus).
//!
//! An [`Event`] is any payload that knows its topic. The bus routes a
//! dispatched event to the listeners registered for that topic; listeners
//! recover the concrete payload with [`downcast_ref`](trait.Event.html#method.downcast_ref).
//!
//! Topics are registered through an [`EventSpec`] descriptor before anything
//! can listen on them or dispatch to them.
//!
//! ## Lifecycle events emitted by workers and pools
//! ```text
//! topic              payload
//! ---------------------------------------------------------------
//! before-handle      BeforeHandle   { job }
//! after-handle       AfterHandle    { job }
//! failed-handle      FailedHandle   { job, error }
//! retry-handle       RetryHandle    { job, attempt, error }
//! progress-updated   ProgressUpdated{ progress }
//! ```
//!
//! ## Example
//! ```rust
//! use jobvisor::{Event, EventSpec};
//!
//! struct Deployed { version: u32 }
//!
//! impl Event for Deployed {
//!     fn topic(&self) -> &str { "deployed" }
//! }
//!
//! let ev: &dyn Event = &Deployed { version: 7 };
//! assert_eq!(ev.topic(), "deployed");
//! assert_eq!(ev.downcast_ref::<Deployed>().map(|d| d.version), Some(7));
//! assert_eq!(EventSpec::new("deployed").topic(), "deployed");
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::drivers::Progress;
use crate::error::JobError;
use crate::jobs::JobRef;

/// Topic of [`BeforeHandle`].
pub const TOPIC_BEFORE_HANDLE: &str = "before-handle";
/// Topic of [`AfterHandle`].
pub const TOPIC_AFTER_HANDLE: &str = "after-handle";
/// Topic of [`FailedHandle`].
pub const TOPIC_FAILED_HANDLE: &str = "failed-handle";
/// Topic of [`RetryHandle`].
pub const TOPIC_RETRY_HANDLE: &str = "retry-handle";
/// Topic of [`ProgressUpdated`].
pub const TOPIC_PROGRESS_UPDATED: &str = "progress-updated";

/// Every topic a worker pool publishes to.
pub const LIFECYCLE_TOPICS: [&str; 5] = [
    TOPIC_BEFORE_HANDLE,
    TOPIC_AFTER_HANDLE,
    TOPIC_FAILED_HANDLE,
    TOPIC_RETRY_HANDLE,
    TOPIC_PROGRESS_UPDATED,
];

/// Object-safe access to `Any` for any `'static` type.
pub trait AsAny: Any {
    /// Returns `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A payload routed by topic.
pub trait Event: AsAny + Send + Sync + 'static {
    /// Topic this event is routed to.
    fn topic(&self) -> &str;
}

impl dyn Event {
    /// Returns the concrete payload if it is a `T`.
    pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Returns `true` if the payload is a `T`.
    pub fn is<T: Event>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// Registered topic descriptor.
///
/// Cheap to clone. The bus keys registrations by [`EventSpec::topic`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EventSpec {
    topic: Arc<str>,
    description: Option<Arc<str>>,
}

impl EventSpec {
    /// Creates a descriptor for `topic`.
    pub fn new(topic: impl Into<Arc<str>>) -> Self {
        Self {
            topic: topic.into(),
            description: None,
        }
    }

    /// Attaches a human-readable description.
    #[inline]
    pub fn with_description(mut self, description: impl Into<Arc<str>>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Topic name.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Optional description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Descriptors for every lifecycle topic a pool emits.
    pub fn lifecycle() -> Vec<EventSpec> {
        vec![
            EventSpec::new(TOPIC_BEFORE_HANDLE).with_description("job picked up by a worker"),
            EventSpec::new(TOPIC_AFTER_HANDLE).with_description("job handled successfully"),
            EventSpec::new(TOPIC_FAILED_HANDLE).with_description("job failed permanently"),
            EventSpec::new(TOPIC_RETRY_HANDLE).with_description("job attempt failed, retry scheduled"),
            EventSpec::new(TOPIC_PROGRESS_UPDATED).with_description("driver counters changed"),
        ]
    }
}

/// A worker picked up `job` and is about to run its first attempt.
#[derive(Clone)]
pub struct BeforeHandle {
    /// The job being handled.
    pub job: JobRef,
}

/// `job` completed successfully.
#[derive(Clone)]
pub struct AfterHandle {
    /// The job that succeeded.
    pub job: JobRef,
}

/// `job` failed and will not be retried.
#[derive(Clone)]
pub struct FailedHandle {
    /// The job that failed.
    pub job: JobRef,
    /// Error of the last attempt.
    pub error: JobError,
}

/// Attempt `attempt` of `job` failed; another attempt follows after backoff.
#[derive(Clone)]
pub struct RetryHandle {
    /// The job being retried.
    pub job: JobRef,
    /// Number of the attempt that failed (1-based).
    pub attempt: u32,
    /// Error of the failed attempt.
    pub error: JobError,
}

/// Driver counters changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressUpdated {
    /// Counter snapshot taken after the change.
    pub progress: Progress,
}

impl Event for BeforeHandle {
    fn topic(&self) -> &str {
        TOPIC_BEFORE_HANDLE
    }
}

impl Event for AfterHandle {
    fn topic(&self) -> &str {
        TOPIC_AFTER_HANDLE
    }
}

impl Event for FailedHandle {
    fn topic(&self) -> &str {
        TOPIC_FAILED_HANDLE
    }
}

impl Event for RetryHandle {
    fn topic(&self) -> &str {
        TOPIC_RETRY_HANDLE
    }
}

impl Event for ProgressUpdated {
    fn topic(&self) -> &str {
        TOPIC_PROGRESS_UPDATED
    }
}

impl fmt::Debug for BeforeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeforeHandle")
            .field("job", &self.job.name())
            .finish()
    }
}

impl fmt::Debug for AfterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AfterHandle")
            .field("job", &self.job.name())
            .finish()
    }
}

impl fmt::Debug for FailedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailedHandle")
            .field("job", &self.job.name())
            .field("error", &self.error)
            .finish()
    }
}

impl fmt::Debug for RetryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryHandle")
            .field("job", &self.job.name())
            .field("attempt", &self.attempt)
            .field("error", &self.error)
            .finish()
    }
}
