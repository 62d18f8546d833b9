// ABOUTME: Process-wide event bus broadcasting lifecycle and progress events.
// ABOUTME: Synchronous in-order delivery to currently-registered subscribers, no buffering.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;

/// An ephemeral event delivered at-most-once per currently-registered subscriber.
#[derive(Debug, Clone)]
pub struct Event {
    /// Event name, e.g. "spawn".
    pub name: String,
    /// Arbitrary JSON payload.
    pub payload: Value,
}

/// Trait for receiving events from the bus.
///
/// Return `Err` to report a delivery failure; the bus logs it and continues
/// delivering to the remaining subscribers. A failing subscriber is never
/// removed from the bus.
pub trait Subscriber: Send + Sync {
    fn on_event(&self, event: &Event) -> Result<(), anyhow::Error>;
}

/// Blanket adapter so plain closures can subscribe.
impl<F> Subscriber for F
where
    F: Fn(&Event) -> Result<(), anyhow::Error> + Send + Sync,
{
    fn on_event(&self, event: &Event) -> Result<(), anyhow::Error> {
        self(event)
    }
}

/// Identifier returned by `subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Process-scoped pub/sub bus.
///
/// One instance per process, constructed at startup and passed by `Arc` to
/// every emitter and subscriber. `emit` delivers synchronously in
/// registration order; there is no buffering or replay, so a subscriber
/// registered after an event misses it. Late observers needing current state
/// should poll the record store instead.
pub struct EventBus {
    subscribers: RwLock<Vec<(u64, Arc<dyn Subscriber>)>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create a new bus with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a new bus wrapped in Arc for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a subscriber. Returns an id usable with `unsubscribe`.
    pub fn subscribe(&self, subscriber: impl Subscriber + 'static) -> SubscriptionId {
        self.subscribe_arc(Arc::new(subscriber))
    }

    /// Register a subscriber from an Arc.
    pub fn subscribe_arc(&self, subscriber: Arc<dyn Subscriber>) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers
            .write()
            .unwrap()
            .push((id, subscriber));
        SubscriptionId(id)
    }

    /// Remove a subscriber. Returns true if it was still registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.write().unwrap();
        let before = subs.len();
        subs.retain(|(sub_id, _)| *sub_id != id.0);
        subs.len() != before
    }

    /// Deliver an event to every currently-registered subscriber, in
    /// registration order.
    ///
    /// Delivery iterates a snapshot of the subscriber list, so subscribe and
    /// unsubscribe may happen concurrently with emission. A subscriber error
    /// is logged and never propagated.
    pub fn emit(&self, name: impl Into<String>, payload: Value) {
        let event = Event {
            name: name.into(),
            payload,
        };

        let snapshot: Vec<(u64, Arc<dyn Subscriber>)> = self
            .subscribers
            .read()
            .unwrap()
            .clone();

        for (id, subscriber) in snapshot {
            if let Err(e) = subscriber.on_event(&event) {
                tracing::warn!(
                    subscriber_id = id,
                    event = %event.name,
                    error = %e,
                    "event subscriber failed"
                );
            }
        }
    }

    /// Number of currently-registered subscribers.
    pub fn connection_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap()
            .len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
