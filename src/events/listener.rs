//! # Listener contracts of the event bus.
//!
//! Two kinds of listeners can be attached to a topic:
//!
//! - a [`Clause`]: a plain callback, shared by every dispatch;
//! - a [`Listener`]: a stateful factory. Each dispatch calls
//!   [`Listener::instantiate`] with the dispatch's init data and runs the
//!   returned instance, so per-dispatch state never leaks between dispatches.
//!
//! A [`Subscriber`] bundles clauses for several topics and is registered
//! atomically with [`EventBus::subscribe`](crate::EventBus::subscribe).
//!
//! Every listener returns a `bool`: `false` stops propagation to the
//! listeners that follow it for that dispatch.

use std::any::Any;
use std::sync::Arc;

use super::event::Event;

/// Opaque data handed to [`Listener::instantiate`] on every dispatch.
pub type InitData = Arc<dyn Any + Send + Sync>;

/// Plain callback listener. Returning `false` stops propagation.
pub type Clause = Arc<dyn Fn(&dyn Event) -> bool + Send + Sync>;

/// Wraps a closure into a [`Clause`].
pub fn clause<F>(f: F) -> Clause
where
    F: Fn(&dyn Event) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Stateful listener.
///
/// The registered value acts as a factory: the bus never calls
/// [`handle`](Listener::handle) on it directly, only on instances returned by
/// [`instantiate`](Listener::instantiate).
///
/// # Example
/// ```
/// use jobvisor::{Event, InitData, Listener};
///
/// struct Counter { seen: usize }
///
/// impl Listener for Counter {
///     fn instantiate(&self, _init: Option<&InitData>) -> Box<dyn Listener> {
///         Box::new(Counter { seen: 0 })
///     }
///
///     fn handle(&mut self, _event: &dyn Event) -> bool {
///         self.seen += 1;
///         true
///     }
/// }
/// ```
pub trait Listener: Send + Sync + 'static {
    /// Creates the instance that handles one dispatch.
    fn instantiate(&self, init: Option<&InitData>) -> Box<dyn Listener>;

    /// Handles the event. Returning `false` stops propagation.
    fn handle(&mut self, event: &dyn Event) -> bool;
}

/// A bundle of `{topic → clauses}` registered in one step.
pub trait Subscriber: Send + Sync {
    /// Topics and the clauses to attach to each of them.
    fn subscriptions(&self) -> Vec<(String, Vec<Clause>)>;
}
