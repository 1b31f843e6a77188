//! # Built-in bus subscribers.
//!
//! A [`Subscriber`](crate::Subscriber) bundles clauses for several topics and
//! is registered in one step with [`EventBus::subscribe`](crate::EventBus::subscribe).
//!
//! ## Implementing custom subscribers
//! ```rust
//! use jobvisor::{Clause, FailedHandle, Subscriber, TOPIC_FAILED_HANDLE, clause};
//!
//! struct FailureAlert;
//!
//! impl Subscriber for FailureAlert {
//!     fn subscriptions(&self) -> Vec<(String, Vec<Clause>)> {
//!         vec![(
//!             TOPIC_FAILED_HANDLE.to_string(),
//!             vec![clause(|ev| {
//!                 if let Some(f) = ev.downcast_ref::<FailedHandle>() {
//!                     eprintln!("alert: {} failed: {}", f.job.name(), f.error);
//!                 }
//!                 true
//!             })],
//!         )]
//!     }
//! }
//! ```

mod log;

pub use log::LogWriter;
