//! Filters deciding which notifications a binding adopts.
//!
//! Both channels are shared by every binding in a context, so each binding
//! must pick out the traffic addressed to its own `(provider, key)` pair and
//! ignore the rest silently.

use crate::area::AreaId;
use crate::codec::Codec;
use crate::error::Result;
use crate::events::{as_update, update_event_name, Event, StorageChange};
use crate::value::{or_fallback, StorageValue};

/// The value carried by a well-formed update notification for
/// `(provider, key)`, or `None` if the event is not one.
#[must_use]
pub fn accept_update<'e, T: 'static>(
    event: &'e Event,
    provider: &str,
    key: &str,
) -> Option<&'e StorageValue<T>> {
    if event.name() != update_event_name(provider, key) {
        return None;
    }
    as_update::<T>(event).map(|detail| &detail.value)
}

/// Whether a storage change concerns `key` in the area the binding's
/// provider currently resolves to.
///
/// Area identities are compared as options: a binding whose provider has no
/// area only accepts changes that name no area either.
#[must_use]
pub fn targets(change: &StorageChange, area: Option<AreaId>, key: &str) -> bool {
    change.storage_area == area && change.key.as_deref() == Some(key)
}

/// The value a storage change asks the binding to adopt.
///
/// A removed key maps to the fallback. A present value goes through the
/// binding's codec; a decode failure is returned, not swallowed.
pub fn incoming_value<T>(
    change: &StorageChange,
    codec: Codec,
    key: &str,
    fallback: &StorageValue<T>,
) -> Result<StorageValue<T>>
where
    T: serde::de::DeserializeOwned + Clone,
{
    let decoded = match change.new_value.as_deref() {
        Some(raw) => Some(codec.decode(key, raw)?),
        None => None,
    };
    Ok(or_fallback(decoded, fallback))
}

/// Whether adopting `incoming` would leave the binding unchanged.
#[must_use]
pub fn is_redundant<T: PartialEq>(incoming: &StorageValue<T>, current: &StorageValue<T>) -> bool {
    incoming == current
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::error::Error;
    use crate::events::update_event;

    #[test]
    fn update_must_match_provider_and_key() {
        let event = update_event("mock-storage", "foo", Some(String::from("did it!")));

        assert_eq!(
            accept_update::<String>(&event, "mock-storage", "foo"),
            Some(&Some(String::from("did it!")))
        );
        assert_eq!(accept_update::<String>(&event, "mock-storage", "bar"), None);
        assert_eq!(accept_update::<String>(&event, "other-storage", "foo"), None);
    }

    #[test]
    fn update_with_wrong_shape_is_ignored() {
        let name = update_event_name("mock-storage", "foo");
        assert_eq!(accept_update::<String>(&Event::other(name.clone()), "mock-storage", "foo"), None);
        assert_eq!(accept_update::<String>(&Event::bare(name.clone()), "mock-storage", "foo"), None);
        assert_eq!(accept_update::<String>(&Event::custom(name, ()), "mock-storage", "foo"), None);
    }

    #[test]
    fn removal_update_is_accepted() {
        let event = update_event::<String>("mock-storage", "foo", None);
        assert_eq!(accept_update::<String>(&event, "mock-storage", "foo"), Some(&None));
    }

    #[test]
    fn change_must_match_area_and_key() {
        let area = AreaId::unique();
        let change = StorageChange::new(area, "foo", None, Some("1".into()));

        assert!(targets(&change, Some(area), "foo"));
        assert!(!targets(&change, Some(area), "bar"));
        assert!(!targets(&change, Some(AreaId::unique()), "foo"));
        assert!(!targets(&change, None, "foo"));
        assert!(!targets(&StorageChange::cleared(area), Some(area), "foo"));
    }

    #[test]
    fn incoming_value_decodes_or_falls_back() {
        let set = StorageChange::new(AreaId::LOCAL, "bar", None, Some(r#"{"baz":true}"#.into()));
        let removed = StorageChange::new(AreaId::LOCAL, "bar", Some("x".into()), None);

        let value: StorageValue<Value> = incoming_value(&set, Codec::Json, "bar", &None).unwrap();
        assert_eq!(value, Some(json!({ "baz": true })));

        let raw: StorageValue<String> = incoming_value(&set, Codec::Raw, "bar", &None).unwrap();
        assert_eq!(raw.as_deref(), Some(r#"{"baz":true}"#));

        let fallback = Some(String::from("fallback"));
        assert_eq!(incoming_value(&removed, Codec::Json, "bar", &fallback).unwrap(), fallback);
    }

    #[test]
    fn incoming_garbage_is_an_error() {
        let change = StorageChange::new(AreaId::LOCAL, "bar", None, Some("{nope".into()));
        let result = incoming_value::<Value>(&change, Codec::Json, "bar", &None);
        assert!(matches!(result, Err(Error::Decode { .. })));
    }

    #[test]
    fn equal_values_are_redundant() {
        assert!(is_redundant(&Some(json!({ "a": 1 })), &Some(json!({ "a": 1 }))));
        assert!(!is_redundant(&Some(json!({ "a": 1 })), &Some(json!({ "a": 2 }))));
        assert!(is_redundant::<Value>(&None, &None));
    }
}
