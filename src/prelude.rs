//! Convenient re-exports for common usage.
//!
//! ```
//! use webstorage_sync::prelude::*;
//! ```

pub use crate::Context;
pub use crate::HookOptions;
pub use crate::HookResult;
pub use crate::MemoryProvider;
pub use crate::MemoryStorage;
pub use crate::StorageArea;
pub use crate::StorageProvider;
pub use crate::StorageValue;
pub use crate::WebStorage;
pub use crate::{use_local_storage, use_session_storage, use_web_storage};
