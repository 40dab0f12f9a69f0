//! Generic publish/subscribe event bus with a wildcard sink.
//!
//! Both the kernel runtime and the agent manager need the same shape of
//! event fan-out: subscribers register against a named event type, and a
//! separate set of wildcard subscribers receive every event wrapped in an
//! envelope. This crate supplies one generic implementation so neither layer
//! reinvents it.

#![warn(missing_docs, clippy::pedantic)]

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Implemented by event payload types that can be published on an
/// [`EventBus`]. `event_type` names the channel the event is delivered on in
/// addition to the wildcard channel.
pub trait BusEvent: Clone + Send + Sync + 'static {
    /// Returns the stable name of this event's channel, e.g. `"execute_result"`
    /// or `"AGENT_CREATED"`.
    fn event_type(&self) -> &'static str;
}

/// Envelope delivered to wildcard subscribers: the event's type tag paired
/// with the event payload itself.
#[derive(Clone)]
pub struct Envelope<E> {
    /// The event's own `event_type()`.
    pub event_type: &'static str,
    /// The event payload.
    pub data: E,
}

impl<E: fmt::Debug> fmt::Debug for Envelope<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("event_type", &self.event_type)
            .field("data", &self.data)
            .finish()
    }
}

/// A registered handler. Handlers run synchronously on the publishing thread
/// and must not block indefinitely.
pub type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A registered wildcard handler.
pub type WildcardHandler<E> = Arc<dyn Fn(&Envelope<E>) + Send + Sync>;

/// Token returned by `on`/`on_wildcard`, usable to unsubscribe later.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SubscriptionId(u64);

struct Typed<E> {
    id: SubscriptionId,
    handler: Handler<E>,
}

struct Wildcard<E> {
    id: SubscriptionId,
    handler: WildcardHandler<E>,
}

struct Inner<E> {
    by_type: HashMap<&'static str, Vec<Typed<E>>>,
    wildcard: Vec<Wildcard<E>>,
    next_id: u64,
}

impl<E> Default for Inner<E> {
    fn default() -> Self {
        Self {
            by_type: HashMap::new(),
            wildcard: Vec::new(),
            next_id: 0,
        }
    }
}

/// Publish/subscribe event bus generic over any [`BusEvent`] payload.
///
/// Cloning an `EventBus` shares the same subscriber state (it is a thin
/// `Arc` handle), matching the convention used by the registry types in this
/// workspace.
pub struct EventBus<E: BusEvent> {
    inner: Arc<RwLock<Inner<E>>>,
    max_listeners: usize,
}

impl<E: BusEvent> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            max_listeners: self.max_listeners,
        }
    }
}

impl<E: BusEvent> EventBus<E> {
    /// Creates a bus that warns once a channel's listener count exceeds
    /// `max_listeners`. This is a soft cap: subscription still succeeds.
    #[must_use]
    pub fn new(max_listeners: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            max_listeners,
        }
    }

    /// Subscribes `handler` to events whose `event_type()` equals `event_type`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned by a prior panicking handler.
    pub fn on(
        &self,
        event_type: &'static str,
        handler: impl Fn(&E) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut inner = self.inner.write().expect("event bus lock poisoned");
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        let bucket = inner.by_type.entry(event_type).or_default();
        bucket.push(Typed {
            id,
            handler: Arc::new(handler),
        });
        if bucket.len() > self.max_listeners {
            tracing::warn!(
                event_type,
                listeners = bucket.len(),
                max_listeners = self.max_listeners,
                "event bus listener cap exceeded"
            );
        }
        id
    }

    /// Subscribes `handler` to every event published on this bus, wrapped in
    /// an [`Envelope`].
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned by a prior panicking handler.
    pub fn on_wildcard(
        &self,
        handler: impl Fn(&Envelope<E>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut inner = self.inner.write().expect("event bus lock poisoned");
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.wildcard.push(Wildcard {
            id,
            handler: Arc::new(handler),
        });
        if inner.wildcard.len() > self.max_listeners {
            tracing::warn!(
                listeners = inner.wildcard.len(),
                max_listeners = self.max_listeners,
                "event bus wildcard listener cap exceeded"
            );
        }
        id
    }

    /// Removes a previously registered subscription, typed or wildcard.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned by a prior panicking handler.
    pub fn off(&self, id: SubscriptionId) {
        let mut inner = self.inner.write().expect("event bus lock poisoned");
        for bucket in inner.by_type.values_mut() {
            bucket.retain(|h| h.id != id);
        }
        inner.wildcard.retain(|h| h.id != id);
    }

    /// Publishes `event` to its typed subscribers, then to every wildcard
    /// subscriber, in that order. Delivery is synchronous: this call does
    /// not return until every handler has run.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned by a prior panicking handler.
    pub fn publish(&self, event: E) {
        let event_type = event.event_type();
        let (typed, wildcard) = {
            let inner = self.inner.read().expect("event bus lock poisoned");
            let typed = inner
                .by_type
                .get(event_type)
                .map(|bucket| bucket.iter().map(|h| Arc::clone(&h.handler)).collect())
                .unwrap_or_else(Vec::new);
            let wildcard = inner
                .wildcard
                .iter()
                .map(|h| Arc::clone(&h.handler))
                .collect::<Vec<_>>();
            (typed, wildcard)
        };

        for handler in &typed {
            handler(&event);
        }

        if !wildcard.is_empty() {
            let envelope = Envelope {
                event_type,
                data: event,
            };
            for handler in &wildcard {
                handler(&envelope);
            }
        }
    }

    /// Returns the number of listeners subscribed to `event_type`, not
    /// counting wildcard subscribers.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned by a prior panicking handler.
    #[must_use]
    pub fn listener_count(&self, event_type: &str) -> usize {
        let inner = self.inner.read().expect("event bus lock poisoned");
        inner.by_type.get(event_type).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Clone, Debug)]
    struct Ping(u32);

    impl BusEvent for Ping {
        fn event_type(&self) -> &'static str {
            "ping"
        }
    }

    #[test]
    fn typed_subscriber_receives_matching_events() {
        let bus: EventBus<Ping> = EventBus::new(10);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        bus.on("ping", move |event: &Ping| {
            seen_clone.fetch_add(event.0 as usize, Ordering::SeqCst);
        });

        bus.publish(Ping(1));
        bus.publish(Ping(2));

        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn wildcard_subscriber_receives_envelope() {
        let bus: EventBus<Ping> = EventBus::new(10);
        let seen_type = Arc::new(RwLock::new(String::new()));
        let seen_type_clone = Arc::clone(&seen_type);
        bus.on_wildcard(move |envelope: &Envelope<Ping>| {
            *seen_type_clone.write().unwrap() = envelope.event_type.to_owned();
        });

        bus.publish(Ping(7));

        assert_eq!(*seen_type.read().unwrap(), "ping");
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus: EventBus<Ping> = EventBus::new(10);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let id = bus.on("ping", move |_: &Ping| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(Ping(1));
        bus.off(id);
        bus.publish(Ping(1));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exceeding_listener_cap_does_not_fail_subscription() {
        let bus: EventBus<Ping> = EventBus::new(2);
        for _ in 0..5 {
            bus.on("ping", |_: &Ping| {});
        }
        assert_eq!(bus.listener_count("ping"), 5);
    }
}
