use serde::de::DeserializeOwned;
use serde::Serialize;

/// A stored value, or the absent marker.
///
/// A key that was never written, a key that was removed and an explicit
/// "null" are all the same state: `None`.
pub type StorageValue<T> = Option<T>;

/// Types that can be bound to a storage key.
///
/// Anything serde can round-trip works. In raw mode (`parse = false`) the
/// type must additionally deserialize from a plain string, which holds for
/// `String`, `serde_json::Value` and string-backed enums.
pub trait StorageItem: Serialize + DeserializeOwned + Clone + PartialEq + 'static {}

impl<T> StorageItem for T where T: Serialize + DeserializeOwned + Clone + PartialEq + 'static {}

/// Collapse an absent value onto the configured fallback.
pub(crate) fn or_fallback<T: Clone>(value: StorageValue<T>, fallback: &StorageValue<T>) -> StorageValue<T> {
    match value {
        Some(v) => Some(v),
        None => fallback.clone(),
    }
}
