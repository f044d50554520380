//! In-process publish/subscribe keyed by string topic.
//!
//! The bus stands in for the browser's `window` event dispatch: every
//! execution context owns one, listeners register per event name, and
//! [`EventBus::dispatch`] delivers synchronously, in registration order,
//! before returning.

use core::fmt;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::error::Result;
use crate::events::Event;

/// Callback invoked for every event dispatched on a subscribed topic.
pub type Listener = dyn Fn(&Event) -> Result<()>;

/// An ordered set of callbacks that tolerates mutation during iteration.
///
/// Removing an entry while a snapshot is being walked marks it dead, so a
/// callback removed mid-dispatch is never invoked afterwards.
pub(crate) struct Registry<F: ?Sized> {
    entries: RefCell<Vec<Rc<Entry<F>>>>,
    next_id: Cell<u64>,
}

pub(crate) struct Entry<F: ?Sized> {
    id: u64,
    live: Cell<bool>,
    callback: Box<F>,
}

impl<F: ?Sized> Entry<F> {
    pub(crate) fn is_live(&self) -> bool {
        self.live.get()
    }

    pub(crate) fn callback(&self) -> &F {
        &self.callback
    }
}

impl<F: ?Sized> Registry<F> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    pub(crate) fn insert(&self, callback: Box<F>) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().push(Rc::new(Entry {
            id,
            live: Cell::new(true),
            callback,
        }));
        id
    }

    /// Unregister `id`, handing the entry back so the caller can drop it
    /// once no borrows are held.
    pub(crate) fn remove(&self, id: u64) -> Option<Rc<Entry<F>>> {
        let mut entries = self.entries.borrow_mut();
        let index = entries.iter().position(|entry| entry.id == id)?;
        let entry = entries.remove(index);
        entry.live.set(false);
        Some(entry)
    }

    pub(crate) fn snapshot(&self) -> Vec<Rc<Entry<F>>> {
        self.entries.borrow().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<F: ?Sized> Default for Registry<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a registered callback. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Unsubscribe now. Equivalent to dropping the handle.
    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// A single-threaded event bus.
///
/// Cloning yields another handle to the same bus.
///
/// # Example
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use webstorage_sync::{Event, EventBus};
///
/// let bus = EventBus::new();
/// let seen = Rc::new(Cell::new(0));
///
/// let counter = seen.clone();
/// let sub = bus.subscribe("ping", move |_| {
///     counter.set(counter.get() + 1);
///     Ok(())
/// });
///
/// bus.dispatch(&Event::other("ping")).unwrap();
/// drop(sub);
/// bus.dispatch(&Event::other("ping")).unwrap();
/// assert_eq!(seen.get(), 1);
/// ```
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    topics: RefCell<HashMap<String, Rc<Registry<Listener>>>>,
}

/// A non-owning handle to an [`EventBus`].
#[derive(Clone, Default)]
pub struct WeakBus {
    inner: Weak<BusInner>,
}

impl WeakBus {
    /// Recover the bus if it is still alive.
    pub fn upgrade(&self) -> Option<EventBus> {
        self.inner.upgrade().map(|inner| EventBus { inner })
    }
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for events named `topic`.
    pub fn subscribe(
        &self,
        topic: impl Into<String>,
        listener: impl Fn(&Event) -> Result<()> + 'static,
    ) -> Subscription {
        let topic = topic.into();
        let registry = self
            .inner
            .topics
            .borrow_mut()
            .entry(topic.clone())
            .or_default()
            .clone();
        let id = registry.insert(Box::new(listener));
        tracing::trace!(topic = %topic, id, "listener added");

        let bus = self.downgrade();
        Subscription::new(move || {
            if let Some(bus) = bus.upgrade() {
                bus.remove(&topic, id);
            }
        })
    }

    fn remove(&self, topic: &str, id: u64) {
        let removed = {
            let mut topics = self.inner.topics.borrow_mut();
            let Some(registry) = topics.get(topic).cloned() else {
                return;
            };
            let removed = registry.remove(id);
            if registry.is_empty() {
                topics.remove(topic);
            }
            removed
        };
        // Dropping the callback may run arbitrary destructors.
        drop(removed);
        tracing::trace!(topic, id, "listener removed");
    }

    /// Deliver `event` to every listener of its name.
    ///
    /// All live listeners run even if one fails; the first failure is
    /// returned and later ones are logged.
    pub fn dispatch(&self, event: &Event) -> Result<()> {
        let registry = self.inner.topics.borrow().get(event.name()).cloned();
        let Some(registry) = registry else {
            tracing::trace!(topic = event.name(), "no listeners");
            return Ok(());
        };

        let mut first_error = None;
        for entry in registry.snapshot() {
            if !entry.is_live() {
                continue;
            }
            if let Err(err) = (entry.callback())(event) {
                if first_error.is_none() {
                    first_error = Some(err);
                } else {
                    tracing::error!(topic = event.name(), error = %err, "listener failed");
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Number of listeners currently registered for `topic`.
    #[must_use]
    pub fn listener_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .borrow()
            .get(topic)
            .map_or(0, |registry| registry.len())
    }

    /// A handle that does not keep the bus alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakBus {
        WeakBus {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether both handles refer to the same bus.
    #[must_use]
    pub fn ptr_eq(&self, other: &EventBus) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topics = self.inner.topics.borrow();
        f.debug_struct("EventBus")
            .field("topics", &topics.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn counter(bus: &EventBus, topic: &str) -> (Rc<Cell<u32>>, Subscription) {
        let hits = Rc::new(Cell::new(0));
        let seen = hits.clone();
        let sub = bus.subscribe(topic, move |_| {
            seen.set(seen.get() + 1);
            Ok(())
        });
        (hits, sub)
    }

    #[test]
    fn delivers_only_to_matching_topic() {
        let bus = EventBus::new();
        let (foo, _a) = counter(&bus, "foo");
        let (bar, _b) = counter(&bus, "bar");

        bus.dispatch(&Event::other("foo")).unwrap();
        assert_eq!(foo.get(), 1);
        assert_eq!(bar.get(), 0);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let bus = EventBus::new();
        let (hits, sub) = counter(&bus, "foo");
        assert_eq!(bus.listener_count("foo"), 1);

        drop(sub);
        assert_eq!(bus.listener_count("foo"), 0);
        bus.dispatch(&Event::other("foo")).unwrap();
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn listener_removed_mid_dispatch_is_skipped() {
        let bus = EventBus::new();
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::default();

        let slot = victim.clone();
        let _killer = bus.subscribe("foo", move |_| {
            slot.borrow_mut().take();
            Ok(())
        });
        let (hits, sub) = counter(&bus, "foo");
        *victim.borrow_mut() = Some(sub);

        bus.dispatch(&Event::other("foo")).unwrap();
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn failure_does_not_stop_delivery() {
        let bus = EventBus::new();
        let _failing = bus.subscribe("foo", |_| Err(Error::NotAString { key: "k".into() }));
        let (hits, _ok) = counter(&bus, "foo");

        let result = bus.dispatch(&Event::other("foo"));
        assert!(matches!(result, Err(Error::NotAString { .. })));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn reentrant_dispatch_is_allowed() {
        let bus = EventBus::new();
        let (inner_hits, _inner) = counter(&bus, "inner");

        let relay = bus.clone();
        let _outer = bus.subscribe("outer", move |_| relay.dispatch(&Event::other("inner")));

        bus.dispatch(&Event::other("outer")).unwrap();
        assert_eq!(inner_hits.get(), 1);
    }

    #[test]
    fn subscription_outliving_bus_is_harmless() {
        let bus = EventBus::new();
        let (_hits, sub) = counter(&bus, "foo");
        drop(bus);
        sub.unsubscribe();
    }
}
