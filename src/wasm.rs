//! WebAssembly bindings for webstorage-sync.
//!
//! Enable with the `wasm` feature:
//!
//! ```toml
//! [dependencies]
//! webstorage-sync = { version = "0.1", features = ["wasm"] }
//! ```
//!
//! Bindings run against [`Context::current`], which is the browser window
//! when one exists. Values cross the boundary as JSON.

use serde_json::Value;
use wasm_bindgen::prelude::*;

use crate::bus::Subscription;
use crate::context::Context;
use crate::hook::{use_local_storage, use_session_storage, WebStorage};
use crate::options::HookOptions;

/// A synchronized storage key for use from JavaScript.
#[wasm_bindgen(js_name = WebStorageBinding)]
pub struct WasmWebStorage {
    inner: WebStorage<Value>,
    watchers: Vec<Subscription>,
}

#[wasm_bindgen(js_class = WebStorageBinding)]
impl WasmWebStorage {
    /// Bind `key` of `localStorage`.
    pub fn local(key: &str, parse: bool, fallback: JsValue) -> Result<WasmWebStorage, JsError> {
        let inner = use_local_storage(&Context::current(), key, options(parse, fallback)?)?;
        Ok(Self::wrap(inner))
    }

    /// Bind `key` of `sessionStorage`.
    pub fn session(key: &str, parse: bool, fallback: JsValue) -> Result<WasmWebStorage, JsError> {
        let inner = use_session_storage(&Context::current(), key, options(parse, fallback)?)?;
        Ok(Self::wrap(inner))
    }

    /// The bound key.
    #[wasm_bindgen(getter)]
    pub fn key(&self) -> String {
        self.inner.key().to_owned()
    }

    /// The current value, or `null`.
    pub fn value(&self) -> Result<JsValue, JsError> {
        to_js(self.inner.value().as_ref())
    }

    /// Store a value and notify every binding of the same key.
    #[wasm_bindgen(js_name = setItem)]
    pub fn set_item(&self, value: JsValue) -> Result<(), JsError> {
        self.inner.set_item(from_js(&value)?)?;
        Ok(())
    }

    /// Delete the key and notify every binding of it.
    #[wasm_bindgen(js_name = removeItem)]
    pub fn remove_item(&self) -> Result<(), JsError> {
        self.inner.remove_item()?;
        Ok(())
    }

    /// Call `callback` with the new value whenever it changes.
    #[wasm_bindgen(js_name = onChange)]
    pub fn on_change(&mut self, callback: js_sys::Function) {
        let subscription = self.inner.watch(move |snapshot| {
            let result = to_js(snapshot.value())
                .map_err(JsValue::from)
                .and_then(|value| callback.call1(&JsValue::NULL, &value));
            if let Err(err) = result {
                tracing::warn!(error = ?err, "change callback failed");
            }
        });
        self.watchers.push(subscription);
    }

    /// Stop listening and drop every callback.
    pub fn dispose(&mut self) {
        self.watchers.clear();
        self.inner.deactivate();
    }
}

impl WasmWebStorage {
    fn wrap(inner: WebStorage<Value>) -> Self {
        Self {
            inner,
            watchers: Vec::new(),
        }
    }
}

fn options(parse: bool, fallback: JsValue) -> Result<HookOptions<Value>, JsError> {
    let options = HookOptions::new().parse(parse);
    if fallback.is_undefined() || fallback.is_null() {
        return Ok(options);
    }
    Ok(options.fallback(from_js(&fallback)?))
}

fn to_js(value: Option<&Value>) -> Result<JsValue, JsError> {
    match value {
        None => Ok(JsValue::NULL),
        Some(value) => {
            let text = serde_json::to_string(value)?;
            js_sys::JSON::parse(&text).map_err(|_| JsError::new("value is not valid JSON"))
        }
    }
}

fn from_js(value: &JsValue) -> Result<Value, JsError> {
    if let Some(text) = value.as_string() {
        return Ok(Value::String(text));
    }
    let text = js_sys::JSON::stringify(value)
        .ok()
        .and_then(|text| text.as_string())
        .ok_or_else(|| JsError::new("value cannot be represented as JSON"))?;
    Ok(serde_json::from_str(&text)?)
}
