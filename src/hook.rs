//! The storage synchronization hook.
//!
//! A [`WebStorage`] binds one `(provider, key)` pair to a reactive value.
//! While active it listens on two channels of its context's bus:
//!
//! ```text
//!   set_item / remove_item (any binding, same context)
//!        │ 1. update notification ──────────────► every binding of (provider, key)
//!        │ 2. write to provider.storage()
//!        ▼
//!   storage area ──(other context writes)──► "storage" change ──► bindings whose
//!                                                                 area and key match
//! ```
//!
//! Both channels end in the same state update, which replaces the exposed
//! [`HookResult`] only when the value actually differs.

use core::fmt;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::bus::{Registry, Subscription};
use crate::codec::Codec;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::events::{self, Event, STORAGE_EVENT};
use crate::options::HookOptions;
use crate::provider::{StorageProvider, WindowStorageProvider};
use crate::reconcile;
use crate::value::{or_fallback, StorageItem, StorageValue};

/// Everything a mutator needs: which key, where, in which format, and which
/// bus to announce on.
struct Binding {
    provider: Rc<dyn StorageProvider>,
    key: String,
    codec: Codec,
    context: Context,
}

impl Binding {
    fn update_topic(&self) -> String {
        events::update_event_name(self.provider.name(), &self.key)
    }

    /// Announce first, then persist if a backend is reachable.
    ///
    /// A failing listener does not stop the write. Write errors take
    /// precedence over listener errors.
    fn write<T: StorageItem>(&self, value: StorageValue<T>) -> Result<()> {
        let event = events::update_event(self.provider.name(), &self.key, value.clone());
        let announced = self.context.bus().dispatch(&event);
        self.persist(value.as_ref()).and(announced)
    }

    fn persist<T: StorageItem>(&self, value: Option<&T>) -> Result<()> {
        let Some(area) = self.provider.storage() else {
            tracing::debug!(provider = self.provider.name(), key = %self.key, "no backend; update kept in memory");
            return Ok(());
        };

        match value {
            Some(value) => {
                let raw = self.codec.encode(&self.key, value)?;
                area.set_item(&self.key, &raw).map_err(|source| Error::Backend {
                    key: self.key.clone(),
                    source,
                })
            }
            None => {
                area.remove_item(&self.key);
                Ok(())
            }
        }
    }
}

/// A snapshot of a binding: its value plus the two mutators.
///
/// Snapshots are immutable. The binding hands out the same `Rc` until its
/// value changes, so `Rc::ptr_eq` tells consumers whether anything happened.
pub struct HookResult<T> {
    value: StorageValue<T>,
    binding: Rc<Binding>,
}

impl<T: StorageItem> HookResult<T> {
    /// The value, or `None` when absent and no fallback is configured.
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// The value as a [`StorageValue`].
    #[must_use]
    pub fn storage_value(&self) -> &StorageValue<T> {
        &self.value
    }

    /// Store `value` under the bound key and announce it.
    ///
    /// The announcement happens even when the backend is unreachable, so
    /// bindings keep working as in-memory cells.
    pub fn set_item(&self, value: T) -> Result<()> {
        self.binding.write(Some(value))
    }

    /// Delete the bound key and announce the removal.
    pub fn remove_item(&self) -> Result<()> {
        self.binding.write::<T>(None)
    }
}

impl<T: fmt::Debug> fmt::Debug for HookResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookResult")
            .field("key", &self.binding.key)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

type Watcher<T> = dyn Fn(&Rc<HookResult<T>>);

struct HookState<T: StorageItem> {
    binding: Rc<Binding>,
    fallback: StorageValue<T>,
    snapshot: RefCell<Rc<HookResult<T>>>,
    subscriptions: RefCell<Vec<Subscription>>,
    watchers: Registry<Watcher<T>>,
}

impl<T: StorageItem> HookState<T> {
    fn current(&self) -> Rc<HookResult<T>> {
        self.snapshot.borrow().clone()
    }

    /// Install `value`, producing a new snapshot only if it differs.
    fn replace(&self, value: StorageValue<T>) -> bool {
        let next = {
            let mut snapshot = self.snapshot.borrow_mut();
            if snapshot.value == value {
                return false;
            }
            let next = Rc::new(HookResult {
                value,
                binding: self.binding.clone(),
            });
            *snapshot = next.clone();
            next
        };

        for watcher in self.watchers.snapshot() {
            if watcher.is_live() {
                (watcher.callback())(&next);
            }
        }
        true
    }

    fn read_item(&self) -> Result<StorageValue<T>> {
        let binding = &self.binding;
        if !binding.context.can_use_dom() {
            return Ok(self.fallback.clone());
        }
        let Some(area) = binding.provider.storage() else {
            return Ok(self.fallback.clone());
        };
        match area.get_item(&binding.key) {
            Some(raw) if !raw.is_empty() => binding.codec.decode(&binding.key, &raw).map(Some),
            _ => Ok(self.fallback.clone()),
        }
    }

    fn on_update(&self, event: &Event) -> Result<()> {
        let binding = &self.binding;
        match reconcile::accept_update::<T>(event, binding.provider.name(), &binding.key) {
            Some(value) => {
                let changed = self.replace(or_fallback(value.clone(), &self.fallback));
                tracing::debug!(provider = binding.provider.name(), key = %binding.key, changed, "update accepted");
            }
            None => {
                tracing::debug!(topic = event.name(), "malformed update ignored");
            }
        }
        Ok(())
    }

    fn on_storage_change(&self, event: &Event) -> Result<()> {
        let Event::Storage(change) = event else {
            return Ok(());
        };
        let binding = &self.binding;
        let area = binding.provider.storage().map(|area| area.id());
        if !reconcile::targets(change, area, &binding.key) {
            return Ok(());
        }

        let incoming = reconcile::incoming_value(change, binding.codec, &binding.key, &self.fallback)?;
        if reconcile::is_redundant(&incoming, &self.current().value) {
            tracing::debug!(provider = binding.provider.name(), key = %binding.key, "storage change already reflected");
            return Ok(());
        }

        self.replace(incoming);
        tracing::debug!(provider = binding.provider.name(), key = %binding.key, "storage change adopted");
        Ok(())
    }
}

/// A reactive binding of one storage key.
///
/// Created inactive by [`WebStorage::bind`]; [`activate`](Self::activate)
/// reads the initial value and subscribes, [`deactivate`](Self::deactivate)
/// (or dropping the last handle) unsubscribes. Clones share the binding.
///
/// # Example
///
/// ```
/// use webstorage_sync::prelude::*;
///
/// let ctx = Context::builder()
///     .local_storage(MemoryStorage::with_entries([("foo", "bar")]))
///     .build();
///
/// let a = use_local_storage::<String>(&ctx, "foo", HookOptions::new()).unwrap();
/// let b = use_local_storage::<String>(&ctx, "foo", HookOptions::new()).unwrap();
/// assert_eq!(a.value().as_deref(), Some("bar"));
///
/// a.set_item("baz".to_string()).unwrap();
/// assert_eq!(b.value().as_deref(), Some("baz"));
/// ```
pub struct WebStorage<T: StorageItem> {
    state: Rc<HookState<T>>,
}

impl<T: StorageItem> Clone for WebStorage<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: StorageItem> WebStorage<T> {
    /// Bind `key` of `provider` within `context`. Nothing is read yet; the
    /// value is the fallback until the binding is activated.
    pub fn bind(
        context: &Context,
        provider: Rc<dyn StorageProvider>,
        key: impl Into<String>,
        options: HookOptions<T>,
    ) -> Self {
        let (parse, fallback) = options.into_parts();
        let binding = Rc::new(Binding {
            provider,
            key: key.into(),
            codec: Codec::for_parse(parse),
            context: context.clone(),
        });
        let snapshot = Rc::new(HookResult {
            value: fallback.clone(),
            binding: binding.clone(),
        });
        Self {
            state: Rc::new(HookState {
                binding,
                fallback,
                snapshot: RefCell::new(snapshot),
                subscriptions: RefCell::new(Vec::new()),
                watchers: Registry::new(),
            }),
        }
    }

    /// Read the initial value and start listening.
    ///
    /// Activating an active binding does nothing. A stored value that cannot
    /// be decoded fails activation and leaves the binding inactive.
    pub fn activate(&self) -> Result<Rc<HookResult<T>>> {
        if self.is_active() {
            return Ok(self.snapshot());
        }

        let initial = self.state.read_item()?;
        self.state.replace(initial);

        let bus = self.state.binding.context.bus();
        let weak = Rc::downgrade(&self.state);
        let updates = bus.subscribe(self.state.binding.update_topic(), move |event| {
            match weak.upgrade() {
                Some(state) => state.on_update(event),
                None => Ok(()),
            }
        });
        let weak = Rc::downgrade(&self.state);
        let changes = bus.subscribe(STORAGE_EVENT, move |event| match weak.upgrade() {
            Some(state) => state.on_storage_change(event),
            None => Ok(()),
        });
        *self.state.subscriptions.borrow_mut() = vec![updates, changes];

        tracing::debug!(provider = self.provider_name(), key = self.key(), "binding activated");
        Ok(self.snapshot())
    }

    /// Stop listening. The current snapshot stays readable.
    pub fn deactivate(&self) {
        let subscriptions = core::mem::take(&mut *self.state.subscriptions.borrow_mut());
        if !subscriptions.is_empty() {
            tracing::debug!(provider = self.provider_name(), key = self.key(), "binding deactivated");
        }
        drop(subscriptions);
    }

    /// Whether the binding is listening for notifications.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.state.subscriptions.borrow().is_empty()
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Rc<HookResult<T>> {
        self.state.current()
    }

    /// A copy of the current value.
    #[must_use]
    pub fn value(&self) -> StorageValue<T> {
        self.state.current().value.clone()
    }

    /// See [`HookResult::set_item`].
    pub fn set_item(&self, value: T) -> Result<()> {
        self.state.binding.write(Some(value))
    }

    /// See [`HookResult::remove_item`].
    pub fn remove_item(&self) -> Result<()> {
        self.state.binding.write::<T>(None)
    }

    /// Call `watcher` with every new snapshot.
    pub fn watch(&self, watcher: impl Fn(&Rc<HookResult<T>>) + 'static) -> Subscription {
        let id = self.state.watchers.insert(Box::new(watcher));
        let state: Weak<HookState<T>> = Rc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                let removed = state.watchers.remove(id);
                drop(removed);
            }
        })
    }

    /// The bound key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.state.binding.key
    }

    /// Name of the bound provider.
    #[must_use]
    pub fn provider_name(&self) -> &str {
        self.state.binding.provider.name()
    }
}

impl<T: StorageItem + fmt::Debug> fmt::Debug for WebStorage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebStorage")
            .field("provider", &self.provider_name())
            .field("key", &self.key())
            .field("active", &self.is_active())
            .field("value", &self.state.current().value)
            .finish()
    }
}

/// Bind and activate `key` of `provider`.
pub fn use_web_storage<T: StorageItem>(
    context: &Context,
    provider: Rc<dyn StorageProvider>,
    key: impl Into<String>,
    options: HookOptions<T>,
) -> Result<WebStorage<T>> {
    let hook = WebStorage::bind(context, provider, key, options);
    hook.activate()?;
    Ok(hook)
}

/// Bind and activate `key` of `context`'s local storage.
pub fn use_local_storage<T: StorageItem>(
    context: &Context,
    key: impl Into<String>,
    options: HookOptions<T>,
) -> Result<WebStorage<T>> {
    use_web_storage(context, Rc::new(WindowStorageProvider::local(context)), key, options)
}

/// Bind and activate `key` of `context`'s session storage.
pub fn use_session_storage<T: StorageItem>(
    context: &Context,
    key: impl Into<String>,
    options: HookOptions<T>,
) -> Result<WebStorage<T>> {
    use_web_storage(context, Rc::new(WindowStorageProvider::session(context)), key, options)
}
