//! Execution contexts.
//!
//! A [`Context`] plays the part of a browser tab: it owns the event bus
//! notifications travel on, answers whether an interactive document is
//! available, and hands out the local and session storage areas. Storage
//! areas are resolved on every request, never cached, so a permission change
//! is observed on the next access.

use core::fmt;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::area::{StorageArea, StorageKind};
use crate::bus::EventBus;
use crate::error::{AccessError, Result};
use crate::events::{Event, StorageChange};
use crate::memory::MemoryStorage;

/// Outcome of asking a context for a storage area.
///
/// `Ok(None)`: the platform has no such area. `Err`: access was refused.
pub type AreaAccess = core::result::Result<Option<Rc<dyn StorageArea>>, AccessError>;

/// Resolves a storage area on demand.
pub type AreaResolver = dyn Fn() -> AreaAccess;

/// One execution context (tab, window, or server render).
///
/// Cloning yields another handle to the same context.
#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

struct ContextInner {
    bus: EventBus,
    can_use_dom: Cell<bool>,
    local: Slot,
    session: Slot,
}

struct Slot {
    resolver: Option<Rc<AreaResolver>>,
    denied: RefCell<Option<String>>,
    /// Whether the last recorded access failed.
    failing: Cell<bool>,
}

impl Slot {
    fn resolve(&self, kind: StorageKind) -> AreaAccess {
        if let Some(message) = self.denied.borrow().as_ref() {
            return Err(AccessError::new(kind, message.clone()));
        }
        match &self.resolver {
            Some(resolver) => resolver(),
            None => Ok(None),
        }
    }
}

const DEFAULT_DENIAL: &str = "Access is denied for this document.";

thread_local! {
    static CURRENT: RefCell<Option<Context>> = const { RefCell::new(None) };
}

impl Context {
    /// Start building a context.
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// A non-interactive context: no document, no storage.
    pub fn server() -> Self {
        Self::builder().can_use_dom(false).build()
    }

    /// The context installed for this thread.
    ///
    /// Defaults to [`Context::browser`] when the `wasm` feature is enabled and
    /// a window exists, and to [`Context::server`] otherwise.
    pub fn current() -> Self {
        CURRENT.with(|current| {
            current
                .borrow_mut()
                .get_or_insert_with(Self::detect)
                .clone()
        })
    }

    /// Replace the context returned by [`Context::current`] on this thread.
    pub fn set_current(context: Context) {
        CURRENT.with(|current| *current.borrow_mut() = Some(context));
    }

    #[cfg(feature = "wasm")]
    fn detect() -> Self {
        if web_sys::window().is_some() {
            Self::browser()
        } else {
            Self::server()
        }
    }

    #[cfg(not(feature = "wasm"))]
    fn detect() -> Self {
        Self::server()
    }

    /// The bus notifications for this context travel on.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Whether an interactive document is available.
    #[must_use]
    pub fn can_use_dom(&self) -> bool {
        self.inner.can_use_dom.get()
    }

    /// Override the document capability.
    pub fn set_can_use_dom(&self, available: bool) {
        self.inner.can_use_dom.set(available);
    }

    /// Resolve the storage area of `kind`.
    ///
    /// `Ok(None)` means the platform has no such area; `Err` means access
    /// was refused.
    pub fn storage(&self, kind: StorageKind) -> AreaAccess {
        self.slot(kind).resolve(kind)
    }

    /// Shorthand for `storage(StorageKind::Local)`.
    pub fn local_storage(&self) -> AreaAccess {
        self.storage(StorageKind::Local)
    }

    /// Shorthand for `storage(StorageKind::Session)`.
    pub fn session_storage(&self) -> AreaAccess {
        self.storage(StorageKind::Session)
    }

    /// Make access to `kind` fail (or succeed again), as a browser does when
    /// the user tightens privacy settings.
    pub fn deny_storage(&self, kind: StorageKind, denied: bool) {
        let message = denied.then(|| DEFAULT_DENIAL.to_owned());
        *self.slot(kind).denied.borrow_mut() = message;
    }

    /// Deliver a cross-context storage change to this context.
    ///
    /// Decode failures raised by bindings surface here.
    pub fn dispatch_storage_change(&self, change: StorageChange) -> Result<()> {
        self.inner.bus.dispatch(&Event::Storage(change))
    }

    /// Record the outcome of an access to `kind`.
    ///
    /// Returns `true` only for the first failure after a success (or after
    /// the context was built).
    pub(crate) fn record_access(&self, kind: StorageKind, failed: bool) -> bool {
        let was_failing = self.slot(kind).failing.replace(failed);
        failed && !was_failing
    }

    fn slot(&self, kind: StorageKind) -> &Slot {
        match kind {
            StorageKind::Local => &self.inner.local,
            StorageKind::Session => &self.inner.session,
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("can_use_dom", &self.can_use_dom())
            .field("local", &self.inner.local.resolver.is_some())
            .field("session", &self.inner.session.resolver.is_some())
            .finish()
    }
}

enum AreaSource {
    Fixed(Rc<dyn StorageArea>),
    Shared(MemoryStorage),
    Resolver(Rc<AreaResolver>),
}

/// Builder for [`Context`].
///
/// # Example
///
/// ```
/// use webstorage_sync::{Context, MemoryStorage};
///
/// // Two tabs of the same origin.
/// let origin = MemoryStorage::new();
/// let tab_a = Context::builder().shared_local_storage(&origin).build();
/// let tab_b = Context::builder().shared_local_storage(&origin).build();
///
/// assert!(tab_a.can_use_dom());
/// assert!(tab_b.local_storage().unwrap().is_some());
/// ```
pub struct ContextBuilder {
    bus: Option<EventBus>,
    can_use_dom: bool,
    local: Option<AreaSource>,
    session: Option<AreaSource>,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            bus: None,
            can_use_dom: true,
            local: None,
            session: None,
        }
    }
}

impl ContextBuilder {
    /// Use an existing bus instead of a fresh one.
    pub fn bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Whether an interactive document is available. Defaults to `true`.
    pub fn can_use_dom(mut self, available: bool) -> Self {
        self.can_use_dom = available;
        self
    }

    /// Serve `area` as local storage.
    pub fn local_storage(mut self, area: impl StorageArea + 'static) -> Self {
        self.local = Some(AreaSource::Fixed(Rc::new(area)));
        self
    }

    /// Serve `area` as session storage.
    pub fn session_storage(mut self, area: impl StorageArea + 'static) -> Self {
        self.session = Some(AreaSource::Fixed(Rc::new(area)));
        self
    }

    /// Serve a view of `origin` as local storage, receiving change
    /// notifications for writes made through other views.
    pub fn shared_local_storage(mut self, origin: &MemoryStorage) -> Self {
        self.local = Some(AreaSource::Shared(origin.clone()));
        self
    }

    /// Resolve local storage through `resolver` on every access.
    pub fn local_resolver(
        mut self,
        resolver: impl Fn() -> AreaAccess + 'static,
    ) -> Self {
        self.local = Some(AreaSource::Resolver(Rc::new(resolver)));
        self
    }

    /// Resolve session storage through `resolver` on every access.
    pub fn session_resolver(
        mut self,
        resolver: impl Fn() -> AreaAccess + 'static,
    ) -> Self {
        self.session = Some(AreaSource::Resolver(Rc::new(resolver)));
        self
    }

    /// Finish the context.
    pub fn build(self) -> Context {
        let bus = self.bus.unwrap_or_default();
        let local = Self::slot(self.local, &bus);
        let session = Self::slot(self.session, &bus);
        Context {
            inner: Rc::new(ContextInner {
                bus,
                can_use_dom: Cell::new(self.can_use_dom),
                local,
                session,
            }),
        }
    }

    fn slot(source: Option<AreaSource>, bus: &EventBus) -> Slot {
        let resolver = source.map(|source| match source {
            AreaSource::Fixed(area) => Self::fixed(area),
            AreaSource::Shared(origin) => Self::fixed(Rc::new(origin.attach(bus))),
            AreaSource::Resolver(resolver) => resolver,
        });
        Slot {
            resolver,
            denied: RefCell::new(None),
            failing: Cell::new(false),
        }
    }

    fn fixed(area: Rc<dyn StorageArea>) -> Rc<AreaResolver> {
        Rc::new(move || -> AreaAccess { Ok(Some(area.clone())) })
    }
}
