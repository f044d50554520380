//! Browser backing for [`Context`], over `window.localStorage`,
//! `window.sessionStorage` and the window's `storage` event.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Storage, StorageEvent, Window};

use crate::area::{AreaId, StorageArea, StorageKind};
use crate::bus::WeakBus;
use crate::context::{AreaAccess, Context};
use crate::error::{AccessError, BackendError};
use crate::events::{Event, StorageChange};

/// A `Storage` object of the current window.
#[derive(Debug, Clone)]
pub struct WebStorageArea {
    storage: Storage,
    kind: StorageKind,
}

impl WebStorageArea {
    /// Resolve the area of `kind` from the current window.
    ///
    /// `Ok(None)` outside a window; `Err` when the browser refuses access.
    pub fn resolve(kind: StorageKind) -> AreaAccess {
        let Some(window) = web_sys::window() else {
            return Ok(None);
        };
        let storage = match kind {
            StorageKind::Local => window.local_storage(),
            StorageKind::Session => window.session_storage(),
        }
        .map_err(|err| AccessError::new(kind, describe(&err)))?;

        Ok(storage.map(|storage| Rc::new(WebStorageArea { storage, kind }) as Rc<dyn StorageArea>))
    }
}

impl StorageArea for WebStorageArea {
    fn id(&self) -> AreaId {
        self.kind.area_id()
    }

    fn get_item(&self, key: &str) -> Option<String> {
        match self.storage.get_item(key) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(area = %self.kind, key, error = %describe(&err), "read failed");
                None
            }
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), BackendError> {
        self.storage
            .set_item(key, value)
            .map_err(|err| BackendError(describe(&err)))
    }

    fn remove_item(&self, key: &str) {
        if let Err(err) = self.storage.remove_item(key) {
            tracing::warn!(area = %self.kind, key, error = %describe(&err), "remove failed");
        }
    }

    fn clear(&self) {
        if let Err(err) = self.storage.clear() {
            tracing::warn!(area = %self.kind, error = %describe(&err), "clear failed");
        }
    }

    fn length(&self) -> usize {
        self.storage.length().map_or(0, |len| len as usize)
    }

    fn key(&self, index: usize) -> Option<String> {
        let index = u32::try_from(index).ok()?;
        self.storage.key(index).ok().flatten()
    }
}

thread_local! {
    static BROWSER: RefCell<Option<Context>> = const { RefCell::new(None) };
}

impl Context {
    /// The context of the current browser window.
    ///
    /// Storage is resolved through the window on every access, and the
    /// window's `storage` events are forwarded onto the context's bus. The
    /// window is bridged once per thread: every call returns the same
    /// context.
    pub fn browser() -> Self {
        BROWSER.with(|browser| browser.borrow_mut().get_or_insert_with(connect_window).clone())
    }
}

fn connect_window() -> Context {
    let window = web_sys::window();
    let can_use_dom = window.as_ref().and_then(Window::document).is_some();
    let context = Context::builder()
        .can_use_dom(can_use_dom)
        .local_resolver(|| WebStorageArea::resolve(StorageKind::Local))
        .session_resolver(|| WebStorageArea::resolve(StorageKind::Session))
        .build();

    if let Some(window) = window {
        if let Err(err) = forward_storage_events(&window, context.bus().downgrade()) {
            tracing::warn!(error = %describe(&err), "cannot listen for storage events");
        }
    }
    context
}

/// Re-dispatch the window's `storage` events as [`StorageChange`]s.
///
/// A decode failure inside a binding is thrown back to the page.
fn forward_storage_events(window: &Window, bus: WeakBus) -> Result<(), JsValue> {
    let listener = Closure::<dyn FnMut(StorageEvent)>::new(move |event: StorageEvent| {
        let Some(bus) = bus.upgrade() else {
            return;
        };
        let change = StorageChange {
            key: event.key(),
            old_value: event.old_value(),
            new_value: event.new_value(),
            storage_area: event.storage_area().map(|area| area_of(&area)),
        };
        if let Err(err) = bus.dispatch(&Event::Storage(change)) {
            wasm_bindgen::throw_str(&err.to_string());
        }
    });
    window.add_event_listener_with_callback("storage", listener.as_ref().unchecked_ref())?;
    // the context it feeds is kept for the life of the thread
    listener.forget();
    Ok(())
}

fn area_of(storage: &Storage) -> AreaId {
    let Some(window) = web_sys::window() else {
        return AreaId::DETACHED;
    };
    if window.local_storage().ok().flatten().as_ref() == Some(storage) {
        AreaId::LOCAL
    } else if window.session_storage().ok().flatten().as_ref() == Some(storage) {
        AreaId::SESSION
    } else {
        AreaId::DETACHED
    }
}

fn describe(err: &JsValue) -> String {
    err.as_string()
        .or_else(|| err.dyn_ref::<js_sys::Error>().map(|e| String::from(e.message())))
        .unwrap_or_else(|| format!("{err:?}"))
}
