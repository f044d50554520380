//! Error types.
//!
//! Only two kinds of failure ever reach a caller: stored data that cannot be
//! decoded (treated as corrupt, never recovered) and a backend that refuses a
//! write. Backend *access* failures are absorbed by the providers and show up
//! as a missing storage area instead.

use crate::area::StorageKind;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors surfaced by hook reads, writes and notification handling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The stored value for `key` is not valid JSON for the requested type.
    #[error("failed to decode stored value for key `{key}`: {source}")]
    Decode {
        /// Storage key that held the malformed value.
        key: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The value could not be encoded as JSON.
    #[error("failed to encode value for key `{key}`: {source}")]
    Encode {
        /// Storage key being written.
        key: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A raw (non-parsing) binding read a string its value type cannot hold.
    #[error("stored string for key `{key}` cannot be used as the bound value type: {source}")]
    Cast {
        /// Storage key that was read.
        key: String,
        /// Underlying conversion error.
        #[source]
        source: serde_json::Error,
    },

    /// A raw (non-parsing) binding was asked to store a structured value.
    #[error("value for key `{key}` is not string-compatible; enable `parse` to store structured data")]
    NotAString {
        /// Storage key being written.
        key: String,
    },

    /// The backend rejected a write.
    #[error("storage backend rejected write to key `{key}`: {source}")]
    Backend {
        /// Storage key being written.
        key: String,
        /// Error reported by the backend.
        #[source]
        source: BackendError,
    },
}

/// A failure reported by a [`StorageArea`](crate::StorageArea) while writing.
///
/// Browsers raise these for exceeded quotas; the in-memory backend raises
/// them when a quota is configured.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct BackendError(pub String);

/// A storage area could not be obtained from the execution context.
///
/// This mirrors the `SecurityError` browsers throw when strict privacy
/// settings forbid first-party storage. Providers turn it into a missing
/// storage area; it never reaches hook callers as an [`Error`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("access to {kind} is denied: {message}")]
pub struct AccessError {
    /// Which storage area was requested.
    pub kind: StorageKind,
    /// Platform-provided reason.
    pub message: String,
}

impl AccessError {
    /// Build an access error for `kind`.
    pub fn new(kind: StorageKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
