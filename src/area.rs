//! The key-value backend contract.
//!
//! A [`StorageArea`] is the Rust face of the Web Storage `Storage` object:
//! string keys, string values, and an identity that lets cross-tab change
//! notifications name the area they refer to.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// Identity of a storage area.
///
/// Two handles compare equal exactly when they refer to the same backing
/// object as seen from one execution context. Cross-tab notifications carry
/// the id of the *receiving* context's area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AreaId(u64);

impl AreaId {
    /// Never assigned to a live area; used for areas a context cannot identify.
    pub const DETACHED: AreaId = AreaId(0);
    /// The browser's `window.localStorage`.
    pub const LOCAL: AreaId = AreaId(1);
    /// The browser's `window.sessionStorage`.
    pub const SESSION: AreaId = AreaId(2);

    const FIRST_DYNAMIC: u64 = 16;

    /// Allocate a fresh, process-unique id.
    pub fn unique() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(AreaId::FIRST_DYNAMIC);
        AreaId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric id.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::DETACHED => f.write_str("area#detached"),
            Self::LOCAL => f.write_str("area#local"),
            Self::SESSION => f.write_str("area#session"),
            Self(n) => write!(f, "area#{n}"),
        }
    }
}

/// The two storage areas a browsing context exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageKind {
    /// Persistent, shared by every tab of the origin.
    Local,
    /// Scoped to one top-level browsing session.
    Session,
}

impl StorageKind {
    /// The well-known area id browsers use for this kind.
    #[must_use]
    pub fn area_id(self) -> AreaId {
        match self {
            Self::Local => AreaId::LOCAL,
            Self::Session => AreaId::SESSION,
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local storage"),
            Self::Session => f.write_str("session storage"),
        }
    }
}

/// A string key-value store with Web Storage semantics.
///
/// Methods take `&self`: an area is a shared handle, exactly like the
/// browser object, and implementations use interior mutability.
pub trait StorageArea {
    /// Identity used to match cross-tab change notifications.
    fn id(&self) -> AreaId;

    /// Read the value stored under `key`.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`.
    fn set_item(&self, key: &str, value: &str) -> Result<(), BackendError>;

    /// Delete `key`. Deleting a missing key is a no-op.
    fn remove_item(&self, key: &str);

    /// Delete every key.
    fn clear(&self);

    /// Number of stored keys.
    fn length(&self) -> usize;

    /// The key at position `index`, in the area's enumeration order.
    fn key(&self, index: usize) -> Option<String>;

    /// Whether the area holds no keys.
    fn is_empty(&self) -> bool {
        self.length() == 0
    }
}
