use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::area::{AreaId, StorageArea};
use crate::bus::{EventBus, WeakBus};
use crate::error::BackendError;
use crate::events::{Event, StorageChange};

/// In-memory storage area.
///
/// Entries live in a `BTreeMap` shared by every view created with
/// [`MemoryStorage::attach`]. Each attached view plays the part of one tab's
/// `localStorage` object: a write through any view raises a
/// [`StorageChange`] on the bus of every *other* attached view, just as a
/// browser only notifies the tabs that did not make the change.
///
/// # Example
///
/// ```
/// use webstorage_sync::{MemoryStorage, StorageArea};
///
/// let storage = MemoryStorage::with_entries([("foo", "bar")]);
/// assert_eq!(storage.get_item("foo").as_deref(), Some("bar"));
///
/// storage.set_item("foo", "baz").unwrap();
/// assert_eq!(storage.get_item("foo").as_deref(), Some("baz"));
/// ```
#[derive(Clone)]
pub struct MemoryStorage {
    id: AreaId,
    shared: Rc<Shared>,
}

struct Shared {
    entries: RefCell<BTreeMap<String, String>>,
    views: RefCell<Vec<View>>,
    /// Maximum total size of keys plus values, in bytes.
    quota: Cell<Option<usize>>,
}

struct View {
    area: AreaId,
    bus: WeakBus,
}

impl MemoryStorage {
    /// Create an empty, unattached area.
    pub fn new() -> Self {
        Self {
            id: AreaId::unique(),
            shared: Rc::new(Shared {
                entries: RefCell::new(BTreeMap::new()),
                views: RefCell::new(Vec::new()),
                quota: Cell::new(None),
            }),
        }
    }

    /// Create an area pre-populated with `entries`.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let storage = Self::new();
        storage
            .shared
            .entries
            .borrow_mut()
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        storage
    }

    /// Open a new view on the same entries for the context owning `bus`.
    ///
    /// The view has its own [`AreaId`]; changes made through other views are
    /// reported on `bus` with that id.
    pub fn attach(&self, bus: &EventBus) -> MemoryStorage {
        let view = MemoryStorage {
            id: AreaId::unique(),
            shared: self.shared.clone(),
        };
        self.shared.views.borrow_mut().push(View {
            area: view.id,
            bus: bus.downgrade(),
        });
        view
    }

    /// Limit the total size of stored keys and values. `None` removes the limit.
    pub fn set_quota(&self, bytes: Option<usize>) {
        self.shared.quota.set(bytes);
    }

    /// All stored keys, in enumeration order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.shared.entries.borrow().keys().cloned().collect()
    }

    /// Whether `other` shares this area's entries.
    #[must_use]
    pub fn shares_entries_with(&self, other: &MemoryStorage) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    fn used_bytes_with(&self, key: &str, value: &str) -> usize {
        self.shared
            .entries
            .borrow()
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum::<usize>()
            + key.len()
            + value.len()
    }

    /// Report a change to every other attached view.
    fn broadcast(&self, key: Option<&str>, old_value: Option<String>, new_value: Option<String>) {
        let targets: Vec<(AreaId, EventBus)> = {
            let mut views = self.shared.views.borrow_mut();
            views.retain(|view| view.bus.upgrade().is_some());
            views
                .iter()
                .filter(|view| view.area != self.id)
                .filter_map(|view| view.bus.upgrade().map(|bus| (view.area, bus)))
                .collect()
        };

        for (area, bus) in targets {
            let change = StorageChange {
                key: key.map(str::to_owned),
                old_value: old_value.clone(),
                new_value: new_value.clone(),
                storage_area: Some(area),
            };
            // A failure belongs to the receiving context, not to the writer.
            if let Err(err) = bus.dispatch(&Event::Storage(change)) {
                tracing::error!(%area, error = %err, "storage change listener failed");
            }
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageArea for MemoryStorage {
    fn id(&self) -> AreaId {
        self.id
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.shared.entries.borrow().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), BackendError> {
        if let Some(quota) = self.shared.quota.get() {
            if self.used_bytes_with(key, value) > quota {
                return Err(BackendError(format!(
                    "QuotaExceededError: setting the value of '{key}' exceeded the quota"
                )));
            }
        }

        let old = self
            .shared
            .entries
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
        if old.as_deref() != Some(value) {
            self.broadcast(Some(key), old, Some(value.to_owned()));
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) {
        let old = self.shared.entries.borrow_mut().remove(key);
        if old.is_some() {
            self.broadcast(Some(key), old, None);
        }
    }

    fn clear(&self) {
        let had_entries = {
            let mut entries = self.shared.entries.borrow_mut();
            let had_entries = !entries.is_empty();
            entries.clear();
            had_entries
        };
        if had_entries {
            self.broadcast(None, None, None);
        }
    }

    fn length(&self) -> usize {
        self.shared.entries.borrow().len()
    }

    fn key(&self, index: usize) -> Option<String> {
        self.shared.entries.borrow().keys().nth(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_operations() {
        let storage = MemoryStorage::new();
        assert!(storage.is_empty());

        storage.set_item("b", "2").unwrap();
        storage.set_item("a", "1").unwrap();
        assert_eq!(storage.length(), 2);
        assert_eq!(storage.key(0).as_deref(), Some("a"));
        assert_eq!(storage.key(2), None);

        storage.remove_item("a");
        assert_eq!(storage.get_item("a"), None);
        assert_eq!(storage.keys(), vec!["b".to_string()]);

        storage.clear();
        assert!(storage.is_empty());
    }

    #[test]
    fn views_share_entries_but_not_identity() {
        let origin = MemoryStorage::new();
        let bus = EventBus::new();
        let tab = origin.attach(&bus);

        origin.set_item("foo", "bar").unwrap();
        assert_eq!(tab.get_item("foo").as_deref(), Some("bar"));
        assert_ne!(tab.id(), origin.id());
        assert!(tab.shares_entries_with(&origin));
    }

    #[test]
    fn writes_notify_other_views_only() {
        let origin = MemoryStorage::new();
        let bus_a = EventBus::new();
        let bus_b = EventBus::new();
        let tab_a = origin.attach(&bus_a);
        let tab_b = origin.attach(&bus_b);

        let seen_a = Rc::new(RefCell::new(Vec::new()));
        let seen_b = Rc::new(RefCell::new(Vec::new()));
        let log_a = seen_a.clone();
        let _a = bus_a.subscribe(crate::events::STORAGE_EVENT, move |event| {
            if let Event::Storage(change) = event {
                log_a.borrow_mut().push(change.clone());
            }
            Ok(())
        });
        let log_b = seen_b.clone();
        let _b = bus_b.subscribe(crate::events::STORAGE_EVENT, move |event| {
            if let Event::Storage(change) = event {
                log_b.borrow_mut().push(change.clone());
            }
            Ok(())
        });

        tab_a.set_item("foo", "bar").unwrap();

        assert!(seen_a.borrow().is_empty());
        assert_eq!(
            *seen_b.borrow(),
            vec![StorageChange::new(tab_b.id(), "foo", None, Some("bar".into()))]
        );
    }

    #[test]
    fn unchanged_writes_are_silent() {
        let origin = MemoryStorage::with_entries([("foo", "bar")]);
        let bus = EventBus::new();
        let _tab = origin.attach(&bus);

        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let _sub = bus.subscribe(crate::events::STORAGE_EVENT, move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        });

        origin.set_item("foo", "bar").unwrap();
        origin.remove_item("missing");
        assert_eq!(hits.get(), 0);

        origin.clear();
        assert_eq!(hits.get(), 1);
        origin.clear();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn quota_rejects_oversized_writes() {
        let storage = MemoryStorage::new();
        storage.set_quota(Some(8));

        storage.set_item("k", "1234").unwrap();
        let err = storage.set_item("k2", "123456").unwrap_err();
        assert!(err.0.starts_with("QuotaExceededError"));
        assert_eq!(storage.get_item("k2"), None);

        // Replacing an existing key only counts the new value.
        storage.set_item("k", "1234567").unwrap();
    }
}
