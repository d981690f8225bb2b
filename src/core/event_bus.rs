//! Namespaced pub/sub event bus for decoupled component communication.
//!
//! Every component (widget, cell, grid) owns its own bus instance, scoped to
//! a string namespace such as `widget:<id>`. Publishing on one bus never
//! reaches subscribers of another; cross-component visibility only happens
//! through forwarding taps installed explicitly by the owning container
//! (see `entities::cell`).
//!
//! Delivery is synchronous and in subscription order. A snapshot of the
//! subscriber list is taken before iterating, so callbacks may subscribe,
//! cancel, or publish reentrantly without invalidating the walk.
//! Once-subscribers are removed at snapshot time of the first publish that
//! carries their payload type, so they fire at most once even when a
//! callback publishes the same event again.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use log::warn;

/// Type-erased fallible callback
type Callback = Arc<dyn Fn(&dyn Any) -> anyhow::Result<()> + Send + Sync>;

struct Entry {
    token: u64,
    once: bool,
    type_id: TypeId,
    callback: Callback,
}

struct Inner {
    namespace: String,
    subscribers: RwLock<HashMap<String, Vec<Entry>>>,
    next_token: AtomicU64,
}

/// Namespaced pub/sub bus.
///
/// Cloning yields another handle to the same subscriber table. Buses are
/// always constructed explicitly and handed to the components that need
/// them; there is no process-wide instance.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                namespace: namespace.into(),
                subscribers: RwLock::new(HashMap::new()),
                next_token: AtomicU64::new(1),
            }),
        }
    }

    /// Namespace this bus is scoped to
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Subscribe to `event`. The callback fires on every publish of a
    /// payload of type `E` until the returned handle is cancelled.
    ///
    /// A publish under the same name with a different payload type skips
    /// the callback.
    pub fn subscribe<E, F>(&self, event: &str, callback: F) -> Subscription
    where
        E: Any + Send + Sync,
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe_impl(event, callback, false)
    }

    /// Subscribe for a single delivery. The entry leaves the table before
    /// the callback runs, so a reentrant publish cannot fire it twice. Only
    /// a publish carrying payload type `E` consumes the entry; mismatched
    /// publishes under the same name leave it in place.
    pub fn subscribe_once<E, F>(&self, event: &str, callback: F) -> Subscription
    where
        E: Any + Send + Sync,
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe_impl(event, callback, true)
    }

    fn subscribe_impl<E, F>(&self, event: &str, callback: F, once: bool) -> Subscription
    where
        E: Any + Send + Sync,
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        let wrapped: Callback = Arc::new(move |any: &dyn Any| match any.downcast_ref::<E>() {
            Some(payload) => callback(payload),
            None => Ok(()),
        });
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(event.to_string())
            .or_default()
            .push(Entry {
                token,
                once,
                type_id: TypeId::of::<E>(),
                callback: wrapped,
            });
        Subscription {
            bus: Arc::downgrade(&self.inner),
            event: event.to_string(),
            token,
        }
    }

    /// Publish `payload` to every subscriber of `event`, synchronously, in
    /// subscription order. A failing subscriber is logged and skipped;
    /// delivery continues to the rest. Subscribers registered for a
    /// different payload type are left untouched.
    pub fn publish<E: Any + Send + Sync>(&self, event: &str, payload: &E) {
        let wanted = TypeId::of::<E>();
        // Snapshot under the lock; matching once-entries leave the live
        // table here.
        let snapshot: Vec<Callback> = {
            let mut map = self
                .inner
                .subscribers
                .write()
                .unwrap_or_else(|e| e.into_inner());
            match map.get_mut(event) {
                Some(entries) => {
                    let snap = entries
                        .iter()
                        .filter(|e| e.type_id == wanted)
                        .map(|e| Arc::clone(&e.callback))
                        .collect();
                    entries.retain(|e| !(e.once && e.type_id == wanted));
                    if entries.is_empty() {
                        map.remove(event);
                    }
                    snap
                }
                None => return,
            }
        };

        for callback in snapshot {
            if let Err(err) = callback(payload) {
                warn!(
                    "[{}] subscriber error on '{}': {:#}",
                    self.inner.namespace, event, err
                );
            }
        }
    }

    /// True if at least one subscriber is registered for `event`
    pub fn has_subscribers(&self, event: &str) -> bool {
        self.subscriber_count(event) > 0
    }

    /// Number of live subscribers for `event`
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(event)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let events = self
            .inner
            .subscribers
            .read()
            .map(|map| map.len())
            .unwrap_or(0);
        f.debug_struct("EventBus")
            .field("namespace", &self.inner.namespace)
            .field("events", &events)
            .finish()
    }
}

/// Cancellation handle returned by [`EventBus::subscribe`] and
/// [`EventBus::subscribe_once`].
///
/// Dropping the handle does not unsubscribe; call [`Subscription::cancel`].
/// The handle holds only a weak reference, so a forgotten handle never
/// keeps a dead bus alive.
#[must_use = "dropping a Subscription does not unsubscribe; call cancel()"]
pub struct Subscription {
    bus: Weak<Inner>,
    event: String,
    token: u64,
}

impl Subscription {
    /// Remove the subscriber from the bus. No-op when the bus is gone or
    /// the entry was already drained (once-subscriptions after delivery).
    pub fn cancel(self) {
        let Some(inner) = self.bus.upgrade() else {
            return;
        };
        let mut map = inner.subscribers.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entries) = map.get_mut(&self.event) {
            entries.retain(|e| e.token != self.token);
            if entries.is_empty() {
                map.remove(&self.event);
            }
        }
    }

    /// True while the subscriber is still attached to the bus
    pub fn is_active(&self) -> bool {
        let Some(inner) = self.bus.upgrade() else {
            return false;
        };
        let map = inner.subscribers.read().unwrap_or_else(|e| e.into_inner());
        map.get(&self.event)
            .map(|entries| entries.iter().any(|e| e.token == self.token))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicI32;

    #[derive(Clone, Debug, PartialEq)]
    struct TestEvent {
        value: i32,
    }

    #[test]
    fn test_subscribe_and_publish() {
        let bus = EventBus::new("test");
        let counter = Arc::new(AtomicI32::new(0));
        let counter_clone = Arc::clone(&counter);

        let sub = bus.subscribe::<TestEvent, _>("ping", move |e| {
            counter_clone.fetch_add(e.value, Ordering::SeqCst);
            Ok(())
        });

        bus.publish("ping", &TestEvent { value: 3 });
        bus.publish("ping", &TestEvent { value: 4 });

        assert_eq!(counter.load(Ordering::SeqCst), 7);
        sub.cancel();
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new("test");
        // must not panic
        bus.publish("nobody-home", &TestEvent { value: 1 });
        assert!(!bus.has_subscribers("nobody-home"));
    }

    #[test]
    fn test_delivery_in_subscription_order() {
        let bus = EventBus::new("test");
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = Arc::clone(&order);
        let s1 = bus.subscribe::<TestEvent, _>("seq", move |_| {
            o1.lock().unwrap().push(1);
            Ok(())
        });
        let o2 = Arc::clone(&order);
        let s2 = bus.subscribe::<TestEvent, _>("seq", move |_| {
            o2.lock().unwrap().push(2);
            Ok(())
        });

        bus.publish("seq", &TestEvent { value: 0 });
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
        s1.cancel();
        s2.cancel();
    }

    #[test]
    fn test_namespace_isolation() {
        let bus_a = EventBus::new("widget:a");
        let bus_b = EventBus::new("widget:b");
        let counter = Arc::new(AtomicI32::new(0));
        let counter_clone = Arc::clone(&counter);

        let sub = bus_b.subscribe::<TestEvent, _>("ping", move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus_a.publish("ping", &TestEvent { value: 1 });
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        bus_b.publish("ping", &TestEvent { value: 1 });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        sub.cancel();
    }

    #[test]
    fn test_once_fires_exactly_once() {
        let bus = EventBus::new("test");
        let counter = Arc::new(AtomicI32::new(0));
        let counter_clone = Arc::clone(&counter);

        let sub = bus.subscribe_once::<TestEvent, _>("ping", move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish("ping", &TestEvent { value: 1 });
        bus.publish("ping", &TestEvent { value: 2 });

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!sub.is_active());
        sub.cancel();
    }

    #[test]
    fn test_once_survives_reentrant_publish() {
        let bus = EventBus::new("test");
        let counter = Arc::new(AtomicI32::new(0));
        let counter_clone = Arc::clone(&counter);
        let bus_clone = bus.clone();

        // the callback republishes the same event; the entry is already
        // drained, so this must not recurse
        let sub = bus.subscribe_once::<TestEvent, _>("ping", move |e| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            if e.value == 0 {
                bus_clone.publish("ping", &TestEvent { value: 1 });
            }
            Ok(())
        });

        bus.publish("ping", &TestEvent { value: 0 });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        sub.cancel();
    }

    #[test]
    fn test_once_ignores_mismatched_payload_type() {
        let bus = EventBus::new("test");
        let counter = Arc::new(AtomicI32::new(0));
        let counter_clone = Arc::clone(&counter);

        let sub = bus.subscribe_once::<TestEvent, _>("ping", move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        // a publish of the wrong payload type neither fires nor consumes it
        bus.publish("ping", &42_i32);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(sub.is_active());

        bus.publish("ping", &TestEvent { value: 1 });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!sub.is_active());
        sub.cancel();
    }

    #[test]
    fn test_cancel_stops_delivery() {
        let bus = EventBus::new("test");
        let counter = Arc::new(AtomicI32::new(0));
        let counter_clone = Arc::clone(&counter);

        let sub = bus.subscribe::<TestEvent, _>("ping", move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(sub.is_active());
        assert_eq!(bus.subscriber_count("ping"), 1);

        sub.cancel();
        assert_eq!(bus.subscriber_count("ping"), 0);

        bus.publish("ping", &TestEvent { value: 1 });
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failing_subscriber_does_not_stop_delivery() {
        let bus = EventBus::new("test");
        let counter = Arc::new(AtomicI32::new(0));
        let counter_clone = Arc::clone(&counter);

        let s1 = bus.subscribe::<TestEvent, _>("ping", |_| Err(anyhow::anyhow!("boom")));
        let s2 = bus.subscribe::<TestEvent, _>("ping", move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish("ping", &TestEvent { value: 1 });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        s1.cancel();
        s2.cancel();
    }

    #[test]
    fn test_payload_type_mismatch_is_skipped() {
        let bus = EventBus::new("test");
        let counter = Arc::new(AtomicI32::new(0));
        let counter_clone = Arc::clone(&counter);

        let sub = bus.subscribe::<TestEvent, _>("ping", move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish("ping", &42_i32);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        sub.cancel();
    }

    #[test]
    fn test_subscribe_during_publish_fires_next_round() {
        let bus = EventBus::new("test");
        let counter = Arc::new(AtomicI32::new(0));
        let late_subs = Arc::new(Mutex::new(Vec::new()));

        let bus_clone = bus.clone();
        let counter_clone = Arc::clone(&counter);
        let late_clone = Arc::clone(&late_subs);
        let sub = bus.subscribe::<TestEvent, _>("ping", move |_| {
            let c = Arc::clone(&counter_clone);
            let late = bus_clone.subscribe::<TestEvent, _>("ping", move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            late_clone.lock().unwrap().push(late);
            Ok(())
        });

        // first publish installs the late subscriber but must not call it
        bus.publish("ping", &TestEvent { value: 1 });
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        // second publish reaches it
        bus.publish("ping", &TestEvent { value: 2 });
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        sub.cancel();
        for s in late_subs.lock().unwrap().drain(..) {
            s.cancel();
        }
    }

    #[test]
    fn test_namespace_accessor() {
        let bus = EventBus::new("grid:main");
        assert_eq!(bus.namespace(), "grid:main");
    }
}
