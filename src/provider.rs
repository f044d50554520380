//! Storage providers.
//!
//! A provider pairs a process-unique name with a way to reach a storage
//! area. The area is looked up again on every call to
//! [`StorageProvider::storage`]; availability may change while a binding is
//! alive and must never be decided once and remembered.

use std::cell::RefCell;
use std::rc::Rc;

use crate::area::{StorageArea, StorageKind};
use crate::context::Context;
use crate::events;

/// Name of the provider backed by the context's local storage.
pub const LOCAL_STORAGE: &str = "local-storage";

/// Name of the provider backed by the context's session storage.
pub const SESSION_STORAGE: &str = "session-storage";

/// Where a binding reads and writes its values.
pub trait StorageProvider {
    /// Identifies the backend; two providers with the same name are assumed
    /// to talk to the same data.
    fn name(&self) -> &str;

    /// The backend, if it can be reached right now.
    ///
    /// Implementations must not fail: an inaccessible backend is `None`.
    fn storage(&self) -> Option<Rc<dyn StorageArea>>;
}

/// Provider for one of a [`Context`]'s built-in storage areas.
///
/// Access failures resolve to `None`. The first failure after a successful
/// access is logged and reported on the context's bus as an error
/// notification (see [`events::error_event_name`]); repeated failures are
/// not reported again until access has recovered.
#[derive(Debug, Clone)]
pub struct WindowStorageProvider {
    kind: StorageKind,
    context: Context,
}

impl WindowStorageProvider {
    /// Provider for `context`'s local storage.
    pub fn local(context: &Context) -> Self {
        Self {
            kind: StorageKind::Local,
            context: context.clone(),
        }
    }

    /// Provider for `context`'s session storage.
    pub fn session(context: &Context) -> Self {
        Self {
            kind: StorageKind::Session,
            context: context.clone(),
        }
    }

    /// Which area this provider resolves.
    #[must_use]
    pub fn kind(&self) -> StorageKind {
        self.kind
    }
}

impl StorageProvider for WindowStorageProvider {
    fn name(&self) -> &str {
        match self.kind {
            StorageKind::Local => LOCAL_STORAGE,
            StorageKind::Session => SESSION_STORAGE,
        }
    }

    fn storage(&self) -> Option<Rc<dyn StorageArea>> {
        match self.context.storage(self.kind) {
            Ok(area) => {
                self.context.record_access(self.kind, false);
                area
            }
            Err(error) => {
                if !self.context.record_access(self.kind, true) {
                    tracing::trace!(provider = self.name(), %error, "storage still not accessible");
                    return None;
                }
                tracing::warn!(provider = self.name(), %error, "storage is not accessible");
                let event = events::error_event(self.name(), error);
                if let Err(err) = self.context.bus().dispatch(&event) {
                    tracing::error!(provider = self.name(), error = %err, "error listener failed");
                }
                None
            }
        }
    }
}

/// A provider over an arbitrary storage area that can be swapped or
/// withdrawn at any time.
pub struct MemoryProvider {
    name: String,
    area: RefCell<Option<Rc<dyn StorageArea>>>,
}

impl MemoryProvider {
    /// Provider named `name` serving `area`.
    pub fn new(name: impl Into<String>, area: impl StorageArea + 'static) -> Self {
        Self {
            name: name.into(),
            area: RefCell::new(Some(Rc::new(area))),
        }
    }

    /// Provider named `name` with no backend.
    pub fn unavailable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            area: RefCell::new(None),
        }
    }

    /// Replace (or withdraw) the backend.
    pub fn set_storage(&self, area: Option<Rc<dyn StorageArea>>) {
        *self.area.borrow_mut() = area;
    }
}

impl StorageProvider for MemoryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn storage(&self) -> Option<Rc<dyn StorageArea>> {
        self.area.borrow().clone()
    }
}
