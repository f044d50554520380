//! # webstorage-sync
//!
//! Reactive bindings to browser-style key/value storage.
//!
//! A binding ties one key of one storage provider to a value that stays
//! consistent with every other binding of the same key: in the same context
//! through update notifications on the context's [`EventBus`], and across
//! contexts (tabs) through the platform's `storage` change events.
//!
//! ## Quick Start
//!
//! ```
//! use webstorage_sync::prelude::*;
//!
//! // Two tabs of the same origin.
//! let origin = MemoryStorage::new();
//! let tab_a = Context::builder().shared_local_storage(&origin).build();
//! let tab_b = Context::builder().shared_local_storage(&origin).build();
//!
//! let theme_a = use_local_storage(&tab_a, "theme", HookOptions::new().fallback("light".to_string())).unwrap();
//! let theme_b = use_local_storage(&tab_b, "theme", HookOptions::new().fallback("light".to_string())).unwrap();
//! assert_eq!(theme_b.value().as_deref(), Some("light"));
//!
//! theme_a.set_item("dark".to_string()).unwrap();
//! assert_eq!(theme_b.value().as_deref(), Some("dark"));
//!
//! theme_a.remove_item().unwrap();
//! assert_eq!(theme_b.value().as_deref(), Some("light"));
//! ```
//!
//! ## Building Blocks
//!
//! - [`WebStorage`] / [`HookResult`] - the binding and its snapshots
//! - [`StorageProvider`] - where a binding's values live
//!   ([`WindowStorageProvider`], [`MemoryProvider`])
//! - [`StorageArea`] - the `Storage` interface ([`MemoryStorage`])
//! - [`Context`] - one tab: bus, document capability, storage areas
//! - [`EventBus`] - synchronous topic-based notifications
//! - [`HookOptions`] - JSON parsing and fallback values
//!
//! ## Notifications
//!
//! | Topic | Detail | Raised by |
//! |-------|--------|-----------|
//! | `webstorage:<provider>:update:<key>` | [`UpdateDetail`] | `set_item` / `remove_item` |
//! | `webstorage:<provider>:error` | [`ErrorDetail`] | refused storage access |
//! | `storage` | [`StorageChange`] | writes made in another context |
//!
//! ## Features
//!
//! - `wasm` - [`Context::browser`] over `window.localStorage` and
//!   `window.sessionStorage`, plus JavaScript bindings.

#![warn(missing_docs)]

mod area;
mod bus;
mod codec;
mod context;
mod error;
pub mod events;
mod hook;
mod memory;
mod options;
mod provider;
mod reconcile;
mod value;

#[cfg(feature = "wasm")]
mod web;

#[cfg(feature = "wasm")]
pub mod wasm;

pub mod prelude;

pub use area::{AreaId, StorageArea, StorageKind};
pub use bus::{EventBus, Listener, Subscription, WeakBus};
pub use codec::Codec;
pub use context::{AreaAccess, AreaResolver, Context, ContextBuilder};
pub use error::{AccessError, BackendError, Error, Result};
pub use events::{CustomEvent, ErrorDetail, Event, StorageChange, UpdateDetail};
pub use hook::{use_local_storage, use_session_storage, use_web_storage, HookResult, WebStorage};
pub use memory::MemoryStorage;
pub use options::HookOptions;
pub use provider::{MemoryProvider, StorageProvider, WindowStorageProvider, LOCAL_STORAGE, SESSION_STORAGE};
pub use value::{StorageItem, StorageValue};

#[cfg(feature = "wasm")]
pub use web::WebStorageArea;
