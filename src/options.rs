use crate::value::StorageValue;

/// How a binding treats its key.
///
/// # Example
///
/// ```
/// use webstorage_sync::HookOptions;
///
/// let options = HookOptions::new().parse(true).fallback(vec![1, 2, 3]);
/// assert!(options.parses());
/// assert_eq!(options.fallback_value(), &Some(vec![1, 2, 3]));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HookOptions<T> {
    parse: bool,
    fallback: StorageValue<T>,
}

impl<T> HookOptions<T> {
    /// Raw strings, no fallback.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parse: false,
            fallback: None,
        }
    }

    /// Decode stored strings as JSON on read and encode on write.
    #[must_use]
    pub fn parse(mut self, parse: bool) -> Self {
        self.parse = parse;
        self
    }

    /// Value reported while the key is missing or storage is out of reach.
    ///
    /// The fallback is never decoded, whatever `parse` says.
    #[must_use]
    pub fn fallback(mut self, fallback: T) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Whether JSON decoding is enabled.
    #[must_use]
    pub fn parses(&self) -> bool {
        self.parse
    }

    /// The configured fallback.
    #[must_use]
    pub fn fallback_value(&self) -> &StorageValue<T> {
        &self.fallback
    }

    pub(crate) fn into_parts(self) -> (bool, StorageValue<T>) {
        (self.parse, self.fallback)
    }
}

impl<T> Default for HookOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}
