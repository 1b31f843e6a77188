//! # Topic-keyed event bus.
//!
//! [`EventBus`] is a registry of topics. Each topic owns a chain of listeners;
//! dispatching an event runs that chain synchronously on the caller's task.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                       per topic chain:
//!   Worker 1 ──┐                            ┌─► Listener::instantiate(init).handle(ev)  (stateful, in order)
//!   Worker N ──┼──► dispatch(&ev, init) ────┤
//!   Pool     ──┘   (topic lookup)           └─► clause(ev)                              (plain, in order)
//!                                                 any `false` stops the chain
//! ```
//!
//! ## Rules
//! - **Explicit topics**: listening on or dispatching to an unregistered topic fails.
//! - **Loud duplicates**: [`EventBus::add_event`] rejects an existing topic;
//!   [`EventBus::ensure_event`] is the idempotent lookup-or-register path.
//! - **Atomic subscribe**: a [`Subscriber`] is registered completely or not at all.
//! - **Lock scope**: registration takes the write lock; dispatch snapshots the
//!   chain under the read lock and runs listeners after releasing it, so a
//!   listener may register or dispatch without deadlocking.
//! - **Keep listeners fast**: they run inline on the publisher (often a worker).
//! - **Contained panics**: a panicking listener is logged and counts as `true`;
//!   it never unwinds into the publisher.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use super::event::{Event, EventSpec};
use super::listener::{Clause, InitData, Listener, Subscriber};
use crate::error::{EventBusError, panic_info};

/// Listener chain of one topic.
struct TopicEntry {
    spec: EventSpec,
    listeners: Vec<Arc<dyn Listener>>,
    clauses: Vec<Clause>,
}

impl TopicEntry {
    fn new(spec: EventSpec) -> Self {
        Self {
            spec,
            listeners: Vec::new(),
            clauses: Vec::new(),
        }
    }
}

/// Topic registry with synchronous dispatch.
///
/// Construct one explicitly and share it (`Arc<EventBus>`) with the pools
/// that should publish to it.
#[derive(Default)]
pub struct EventBus {
    topics: RwLock<HashMap<String, TopicEntry>>,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bus with every lifecycle topic a worker pool emits registered.
    pub fn with_lifecycle_topics() -> Self {
        let bus = Self::new();
        bus.ensure_lifecycle_topics();
        bus
    }

    /// Registers every lifecycle topic that is still missing.
    pub fn ensure_lifecycle_topics(&self) {
        for spec in EventSpec::lifecycle() {
            self.ensure_event(spec);
        }
    }

    /// Registers a topic.
    ///
    /// # Errors
    /// [`EventBusError::TopicExists`] if the topic is already registered.
    pub fn add_event(&self, spec: EventSpec) -> Result<EventSpec, EventBusError> {
        let mut topics = self.topics.write();
        if topics.contains_key(spec.topic()) {
            return Err(EventBusError::TopicExists {
                topic: spec.topic().to_string(),
            });
        }
        topics.insert(spec.topic().to_string(), TopicEntry::new(spec.clone()));
        Ok(spec)
    }

    /// Returns the registered descriptor for `spec`'s topic, registering it first if absent.
    pub fn ensure_event(&self, spec: EventSpec) -> EventSpec {
        let mut topics = self.topics.write();
        topics
            .entry(spec.topic().to_string())
            .or_insert_with(|| TopicEntry::new(spec))
            .spec
            .clone()
    }

    /// Returns the descriptor registered for `topic`.
    pub fn get_event(&self, topic: &str) -> Option<EventSpec> {
        self.topics.read().get(topic).map(|e| e.spec.clone())
    }

    /// True if `topic` is registered.
    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics.read().contains_key(topic)
    }

    /// Removes the topic of `spec` together with its listeners.
    pub fn delete_event(&self, spec: &EventSpec) -> bool {
        self.delete_topic(spec.topic())
    }

    /// Removes `topic` together with its listeners. Returns `false` if it was not registered.
    pub fn delete_topic(&self, topic: &str) -> bool {
        self.topics.write().remove(topic).is_some()
    }

    /// Registered descriptors, sorted by topic.
    pub fn list_events(&self) -> Vec<EventSpec> {
        let topics = self.topics.read();
        let mut specs: Vec<EventSpec> = topics.values().map(|e| e.spec.clone()).collect();
        specs.sort_unstable_by(|a, b| a.topic().cmp(b.topic()));
        specs
    }

    /// Registered topic names, sorted.
    pub fn list_topics(&self) -> Vec<String> {
        let topics = self.topics.read();
        let mut names: Vec<String> = topics.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Appends a plain callback to the topic of `spec`.
    ///
    /// # Errors
    /// [`EventBusError::TopicNotFound`] if the topic is not registered.
    pub fn on_event(&self, spec: &EventSpec, clause: Clause) -> Result<(), EventBusError> {
        self.on_topic(spec.topic(), clause)
    }

    /// Appends a plain callback to `topic`.
    ///
    /// # Errors
    /// [`EventBusError::TopicNotFound`] if the topic is not registered.
    pub fn on_topic(&self, topic: &str, clause: Clause) -> Result<(), EventBusError> {
        let mut topics = self.topics.write();
        let entry = topics.get_mut(topic).ok_or_else(|| topic_not_found(topic))?;
        entry.clauses.push(clause);
        Ok(())
    }

    /// Appends a stateful listener to the topic of `spec`.
    ///
    /// # Errors
    /// [`EventBusError::TopicNotFound`] if the topic is not registered.
    pub fn listen(&self, spec: &EventSpec, listener: Arc<dyn Listener>) -> Result<(), EventBusError> {
        self.listen_topic(spec.topic(), listener)
    }

    /// Appends a stateful listener to `topic`.
    ///
    /// # Errors
    /// [`EventBusError::TopicNotFound`] if the topic is not registered.
    pub fn listen_topic(&self, topic: &str, listener: Arc<dyn Listener>) -> Result<(), EventBusError> {
        let mut topics = self.topics.write();
        let entry = topics.get_mut(topic).ok_or_else(|| topic_not_found(topic))?;
        entry.listeners.push(listener);
        Ok(())
    }

    /// Registers every clause the subscriber declares.
    ///
    /// All topics are validated before anything is attached.
    ///
    /// # Errors
    /// [`EventBusError::TopicNotFound`] naming the first unknown topic; nothing is registered.
    pub fn subscribe(&self, subscriber: &dyn Subscriber) -> Result<(), EventBusError> {
        let subscriptions = subscriber.subscriptions();
        let mut topics = self.topics.write();

        if let Some((missing, _)) = subscriptions
            .iter()
            .find(|(topic, _)| !topics.contains_key(topic.as_str()))
        {
            return Err(topic_not_found(missing));
        }

        for (topic, clauses) in subscriptions {
            if let Some(entry) = topics.get_mut(topic.as_str()) {
                entry.clauses.extend(clauses);
            }
        }
        Ok(())
    }

    /// Dispatches `event` to its topic's listener chain.
    ///
    /// Stateful listeners are instantiated with `init` and run first, then
    /// clauses, each group in registration order. The first listener returning
    /// `false` ends the dispatch.
    ///
    /// # Errors
    /// [`EventBusError::EventNotFound`] if the event's topic is not registered.
    pub fn dispatch(&self, event: &dyn Event, init: Option<&InitData>) -> Result<(), EventBusError> {
        let (listeners, clauses) = {
            let topics = self.topics.read();
            let entry = topics
                .get(event.topic())
                .ok_or_else(|| EventBusError::EventNotFound {
                    topic: event.topic().to_string(),
                })?;
            (entry.listeners.clone(), entry.clauses.clone())
        };

        let mut instances: Vec<Box<dyn Listener>> =
            listeners.iter().map(|l| l.instantiate(init)).collect();

        for instance in instances.iter_mut() {
            if !guarded(event, || instance.handle(event)) {
                return Ok(());
            }
        }
        for clause in &clauses {
            if !guarded(event, || clause(event)) {
                return Ok(());
            }
        }
        Ok(())
    }
}

/// Runs one link of a chain; a panicking link is logged and the chain goes on.
fn guarded(event: &dyn Event, link: impl FnOnce() -> bool) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(link)) {
        Ok(pass) => pass,
        Err(payload) => {
            warn!(
                topic = event.topic(),
                info = %panic_info(&*payload),
                "event listener panicked"
            );
            true
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("topics", &self.list_topics())
            .finish()
    }
}

fn topic_not_found(topic: &str) -> EventBusError {
    EventBusError::TopicNotFound {
        topic: topic.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::listener::clause;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Ping(&'static str);

    impl Event for Ping {
        fn topic(&self) -> &str {
            self.0
        }
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str, pass: bool) -> Clause {
        let log = Arc::clone(log);
        clause(move |_ev| {
            log.lock().push(tag.to_string());
            pass
        })
    }

    #[test]
    fn test_duplicate_add_fails_but_ensure_is_idempotent() {
        let bus = EventBus::new();
        let first = bus
            .add_event(EventSpec::new("ping").with_description("first"))
            .unwrap();
        assert_eq!(
            bus.add_event(EventSpec::new("ping")),
            Err(EventBusError::TopicExists {
                topic: "ping".into()
            })
        );
        let again = bus.ensure_event(EventSpec::new("ping").with_description("second"));
        assert_eq!(again, first);
        assert_eq!(bus.list_topics(), vec!["ping".to_string()]);
    }

    #[test]
    fn test_listening_requires_registered_topic() {
        let bus = EventBus::new();
        let err = bus.on_topic("nope", clause(|_| true)).unwrap_err();
        assert_eq!(
            err,
            EventBusError::TopicNotFound {
                topic: "nope".into()
            }
        );
        let err = bus.dispatch(&Ping("nope"), None).unwrap_err();
        assert_eq!(
            err,
            EventBusError::EventNotFound {
                topic: "nope".into()
            }
        );
    }

    #[test]
    fn test_delete_and_list() {
        let bus = EventBus::new();
        let b = bus.add_event(EventSpec::new("b")).unwrap();
        bus.add_event(EventSpec::new("a")).unwrap();
        assert_eq!(
            bus.list_events()
                .iter()
                .map(|s| s.topic().to_string())
                .collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert!(bus.delete_event(&b));
        assert!(!bus.delete_event(&b));
        assert!(bus.delete_topic("a"));
        assert!(bus.list_topics().is_empty());
    }

    #[test]
    fn test_false_stops_propagation() {
        let bus = EventBus::new();
        let spec = bus.add_event(EventSpec::new("ping")).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.on_event(&spec, recorder(&log, "first", true)).unwrap();
        bus.on_event(&spec, recorder(&log, "second", false)).unwrap();
        bus.on_event(&spec, recorder(&log, "third", true)).unwrap();

        bus.dispatch(&Ping("ping"), None).unwrap();
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[test]
    fn test_panicking_clause_does_not_unwind_dispatch() {
        let bus = EventBus::new();
        let spec = bus.add_event(EventSpec::new("ping")).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.on_event(&spec, recorder(&log, "before", true)).unwrap();
        bus.on_event(&spec, clause(|_| panic!("listener blew up")))
            .unwrap();
        bus.on_event(&spec, recorder(&log, "after", true)).unwrap();

        assert!(bus.dispatch(&Ping("ping"), None).is_ok());
        assert!(bus.dispatch(&Ping("ping"), None).is_ok());
        assert_eq!(*log.lock(), vec!["before", "after", "before", "after"]);
    }

    struct Greeter {
        log: Arc<Mutex<Vec<String>>>,
        greeting: String,
    }

    impl Listener for Greeter {
        fn instantiate(&self, init: Option<&InitData>) -> Box<dyn Listener> {
            let greeting = init
                .and_then(|d| d.downcast_ref::<String>())
                .cloned()
                .unwrap_or_else(|| "hello".to_string());
            Box::new(Greeter {
                log: Arc::clone(&self.log),
                greeting,
            })
        }

        fn handle(&mut self, event: &dyn Event) -> bool {
            self.log
                .lock()
                .push(format!("{} {}", self.greeting, event.topic()));
            true
        }
    }

    #[test]
    fn test_stateful_listeners_run_first_with_init_data() {
        let bus = EventBus::new();
        let spec = bus.add_event(EventSpec::new("ping")).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.on_event(&spec, recorder(&log, "clause", true)).unwrap();
        bus.listen(
            &spec,
            Arc::new(Greeter {
                log: Arc::clone(&log),
                greeting: String::new(),
            }),
        )
        .unwrap();

        let init: InitData = Arc::new("hi".to_string());
        bus.dispatch(&Ping("ping"), Some(&init)).unwrap();
        bus.dispatch(&Ping("ping"), None).unwrap();

        assert_eq!(
            *log.lock(),
            vec!["hi ping", "clause", "hello ping", "clause"]
        );
    }

    struct Pair(Arc<AtomicUsize>, &'static str);

    impl Subscriber for Pair {
        fn subscriptions(&self) -> Vec<(String, Vec<Clause>)> {
            let hits = Arc::clone(&self.0);
            vec![
                (
                    "a".to_string(),
                    vec![clause(move |_| {
                        hits.fetch_add(1, Ordering::SeqCst);
                        true
                    })],
                ),
                (self.1.to_string(), vec![clause(|_| true)]),
            ]
        }
    }

    #[test]
    fn test_subscribe_is_atomic() {
        let bus = EventBus::new();
        bus.add_event(EventSpec::new("a")).unwrap();
        bus.add_event(EventSpec::new("b")).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let err = bus.subscribe(&Pair(Arc::clone(&hits), "missing")).unwrap_err();
        assert_eq!(
            err,
            EventBusError::TopicNotFound {
                topic: "missing".into()
            }
        );
        bus.dispatch(&Ping("a"), None).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        bus.subscribe(&Pair(Arc::clone(&hits), "b")).unwrap();
        bus.dispatch(&Ping("a"), None).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_may_register_during_dispatch() {
        let bus = Arc::new(EventBus::new());
        let spec = bus.add_event(EventSpec::new("ping")).unwrap();
        let inner = Arc::clone(&bus);
        bus.on_event(
            &spec,
            clause(move |_| {
                inner.ensure_event(EventSpec::new("late"));
                true
            }),
        )
        .unwrap();

        bus.dispatch(&Ping("ping"), None).unwrap();
        assert!(bus.has_topic("late"));
    }

    #[test]
    fn test_concurrent_dispatch() {
        let bus = Arc::new(EventBus::new());
        let spec = bus.add_event(EventSpec::new("ping")).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        bus.on_event(
            &spec,
            clause(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }),
        )
        .unwrap();

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let bus = Arc::clone(&bus);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        bus.dispatch(&Ping("ping"), None).unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 800);
    }
}
