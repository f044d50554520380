//! Notifications exchanged over an [`EventBus`](crate::EventBus).
//!
//! Two channels feed a binding:
//!
//! - **Update notifications** fan out a write to every binding of the same
//!   `(provider, key)` pair inside one execution context. Their name is
//!   derived from the pair, so a listener only ever sees traffic for its own
//!   key:
//!
//!   ```text
//!   webstorage:<provider>:update:<key>   detail = UpdateDetail { value }
//!   ```
//!
//! - **Storage changes** are raised by the platform when another execution
//!   context writes to a shared storage area. They are all named
//!   [`STORAGE_EVENT`] and carry the identity of the area that changed.
//!
//! A third, informational notification reports providers that could not
//! reach their backend:
//!
//! ```text
//! webstorage:<provider>:error          detail = ErrorDetail { error }
//! ```

use core::any::Any;
use core::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::area::AreaId;
use crate::error::AccessError;
use crate::value::StorageValue;

/// Prefix shared by every notification name this crate emits.
pub const EVENT_PREFIX: &str = "webstorage";

/// Name of the platform's cross-context storage change notification.
pub const STORAGE_EVENT: &str = "storage";

/// Name of the update notification for `(provider, key)`.
///
/// ```
/// use webstorage_sync::events::update_event_name;
///
/// assert_eq!(update_event_name("local-storage", "theme"), "webstorage:local-storage:update:theme");
/// ```
#[must_use]
pub fn update_event_name(provider: &str, key: &str) -> String {
    format!("{EVENT_PREFIX}:{provider}:update:{key}")
}

/// Name of the error notification for `provider`.
#[must_use]
pub fn error_event_name(provider: &str) -> String {
    format!("{EVENT_PREFIX}:{provider}:error")
}

/// Anything that can travel over the bus.
#[derive(Debug, Clone)]
pub enum Event {
    /// An application-defined notification with an optional payload.
    Custom(CustomEvent),
    /// A storage area changed in another execution context.
    Storage(StorageChange),
    /// A notification that carries nothing this crate understands.
    Other(String),
}

impl Event {
    /// A custom notification carrying `detail`.
    pub fn custom(name: impl Into<String>, detail: impl Any) -> Self {
        Self::Custom(CustomEvent {
            name: name.into(),
            detail: Some(Rc::new(detail)),
        })
    }

    /// A custom notification with no payload at all.
    pub fn bare(name: impl Into<String>) -> Self {
        Self::Custom(CustomEvent {
            name: name.into(),
            detail: None,
        })
    }

    /// A foreign notification named `name`.
    pub fn other(name: impl Into<String>) -> Self {
        Self::Other(name.into())
    }

    /// The topic this notification is delivered on.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Custom(event) => &event.name,
            Self::Storage(_) => STORAGE_EVENT,
            Self::Other(name) => name,
        }
    }
}

/// A named notification with an optional, dynamically typed payload.
#[derive(Clone)]
pub struct CustomEvent {
    name: String,
    detail: Option<Rc<dyn Any>>,
}

impl CustomEvent {
    /// The notification name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The payload, if it is of type `D`.
    #[must_use]
    pub fn detail<D: Any>(&self) -> Option<&D> {
        self.detail.as_deref()?.downcast_ref::<D>()
    }
}

impl fmt::Debug for CustomEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomEvent")
            .field("name", &self.name)
            .field("has_detail", &self.detail.is_some())
            .finish()
    }
}

/// Payload of an update notification.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateDetail<T> {
    /// The value that was written, or `None` after a removal.
    pub value: StorageValue<T>,
}

/// Payload of an error notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorDetail {
    /// Why the provider could not reach its backend.
    pub error: AccessError,
}

/// Build the update notification for a write to `(provider, key)`.
pub fn update_event<T: 'static>(provider: &str, key: &str, value: StorageValue<T>) -> Event {
    Event::custom(update_event_name(provider, key), UpdateDetail { value })
}

/// Build the error notification for `provider`.
pub fn error_event(provider: &str, error: AccessError) -> Event {
    Event::custom(error_event_name(provider), ErrorDetail { error })
}

/// Recognize a well-formed update notification for value type `T`.
///
/// Returns `None` for foreign events, custom events without a payload and
/// payloads of any other shape. The name is not checked here.
#[must_use]
pub fn as_update<T: 'static>(event: &Event) -> Option<&UpdateDetail<T>> {
    match event {
        Event::Custom(custom) => custom.detail::<UpdateDetail<T>>(),
        _ => None,
    }
}

/// Recognize an error notification.
#[must_use]
pub fn as_error(event: &Event) -> Option<&ErrorDetail> {
    match event {
        Event::Custom(custom) => custom.detail::<ErrorDetail>(),
        _ => None,
    }
}

/// A change to a storage area made by another execution context.
///
/// Mirrors the platform `StorageEvent`: `key` is `None` when the area was
/// cleared, `old_value`/`new_value` are `None` when the key did not exist
/// before/after the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageChange {
    /// The key that changed.
    pub key: Option<String>,
    /// Raw value before the change.
    pub old_value: Option<String>,
    /// Raw value after the change.
    pub new_value: Option<String>,
    /// The receiving context's handle to the area that changed.
    pub storage_area: Option<AreaId>,
}

impl StorageChange {
    /// A change of `key` in `area`.
    pub fn new(
        area: AreaId,
        key: impl Into<String>,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        Self {
            key: Some(key.into()),
            old_value,
            new_value,
            storage_area: Some(area),
        }
    }

    /// The whole of `area` was cleared.
    #[must_use]
    pub fn cleared(area: AreaId) -> Self {
        Self {
            key: None,
            old_value: None,
            new_value: None,
            storage_area: Some(area),
        }
    }
}

impl From<StorageChange> for Event {
    fn from(change: StorageChange) -> Self {
        Self::Storage(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_names_are_scoped_by_provider_and_key() {
        assert_eq!(
            update_event_name("mock-storage", "foo"),
            "webstorage:mock-storage:update:foo"
        );
        assert_ne!(
            update_event_name("local-storage", "foo"),
            update_event_name("session-storage", "foo")
        );
        assert_eq!(error_event_name("local-storage"), "webstorage:local-storage:error");
    }

    #[test]
    fn update_event_round_trips_through_guard() {
        let event = update_event("mock-storage", "foo", Some(String::from("bar")));
        assert_eq!(event.name(), "webstorage:mock-storage:update:foo");

        let detail = as_update::<String>(&event).unwrap();
        assert_eq!(detail.value.as_deref(), Some("bar"));
    }

    #[test]
    fn guard_rejects_malformed_updates() {
        let name = update_event_name("mock-storage", "foo");

        // wrong kind of event
        assert!(as_update::<String>(&Event::other(name.clone())).is_none());
        // no payload
        assert!(as_update::<String>(&Event::bare(name.clone())).is_none());
        // payload without a value
        assert!(as_update::<String>(&Event::custom(name.clone(), ())).is_none());
        // payload for another value type
        assert!(as_update::<String>(&update_event::<i64>("mock-storage", "foo", Some(1))).is_none());
    }

    #[test]
    fn storage_changes_share_one_topic() {
        let event = Event::from(StorageChange::new(AreaId::LOCAL, "foo", None, Some("1".into())));
        assert_eq!(event.name(), STORAGE_EVENT);
        assert_eq!(Event::from(StorageChange::cleared(AreaId::LOCAL)).name(), STORAGE_EVENT);
    }

    #[test]
    fn error_event_carries_access_error() {
        let error = AccessError::new(crate::StorageKind::Local, "denied");
        let event = error_event("local-storage", error.clone());
        assert_eq!(as_error(&event).map(|d| &d.error), Some(&error));
        assert!(as_update::<String>(&event).is_none());
    }
}
