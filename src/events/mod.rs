//! Events: topic registry, listener contracts and lifecycle payloads.
//!
//! This module groups the event **data model** and the **bus** that routes
//! events to listeners by topic.
//!
//! ## Contents
//! - [`EventBus`] topic registry with synchronous, ordered dispatch
//! - [`Event`], [`EventSpec`] payload contract and topic descriptor
//! - [`Listener`], [`Subscriber`], [`Clause`] listener contracts
//! - [`BeforeHandle`], [`AfterHandle`], [`FailedHandle`], [`RetryHandle`],
//!   [`ProgressUpdated`] lifecycle payloads emitted by workers and pools
//!
//! ## Quick reference
//! - **Publishers**: `core::runner::run_job` (job lifecycle) and the pool's
//!   progress forwarder (`progress-updated`).
//! - **Consumers**: anything registered on the bus, e.g. [`LogWriter`](crate::LogWriter).

mod bus;
mod event;
mod listener;

pub use bus::EventBus;
pub use event::{
    AfterHandle, AsAny, BeforeHandle, Event, EventSpec, FailedHandle, LIFECYCLE_TOPICS,
    ProgressUpdated, RetryHandle, TOPIC_AFTER_HANDLE, TOPIC_BEFORE_HANDLE, TOPIC_FAILED_HANDLE,
    TOPIC_PROGRESS_UPDATED, TOPIC_RETRY_HANDLE,
};
pub use listener::{Clause, InitData, Listener, Subscriber, clause};
