//! Object Cache
//!
//! Parse-or-reuse memoizer for wire-level keys. Topic strings arrive on every
//! published message, so each distinct key is parsed once and the typed value
//! is cloned out on later hits.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;

/// Memoizes parsing of string keys into typed identifiers.
pub struct ObjectCache<T, E> {
    name: &'static str,
    parser: fn(&str) -> Result<T, E>,
    entries: Mutex<HashMap<String, T>>,
}

impl<T, E> fmt::Debug for ObjectCache<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCache")
            .field("name", &self.name)
            .field("len", &self.entries.lock().len())
            .finish()
    }
}

impl<T, E> ObjectCache<T, E>
where
    T: Clone,
{
    /// Create an empty cache using `parser` for misses.
    #[must_use]
    pub fn new(name: &'static str, parser: fn(&str) -> Result<T, E>) -> Self {
        Self {
            name,
            parser,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached value for `key`, parsing and storing it on a miss.
    ///
    /// # Errors
    ///
    /// Returns the parser's error; failed parses are not cached.
    pub fn get(&self, key: &str) -> Result<T, E> {
        if let Some(value) = self.entries.lock().get(key) {
            return Ok(value.clone());
        }

        let value = (self.parser)(key)?;
        self.entries
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| value.clone());

        Ok(value)
    }

    /// Cached keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
        tracing::debug!(cache = self.name, "Object cache cleared");
    }

    /// Cache name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}
