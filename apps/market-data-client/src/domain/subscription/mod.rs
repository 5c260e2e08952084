//! Subscription Handlers and Registry
//!
//! Domain types for tracking which handlers receive which market data.
//!
//! # Design
//!
//! The handler registry tracks, per subscription key:
//! - The ordered list of handlers (first registered, first invoked)
//! - Whether the key has any interest left (drives wire subscribe/unsubscribe)
//!
//! Multiple handlers may subscribe to the same key; the upstream topic stays
//! active until the last one is removed.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

// =============================================================================
// Handlers
// =============================================================================

/// Receives items of type `T` delivered by a data client.
pub trait Handler<T>: Send + Sync {
    /// Handle one delivered item.
    fn handle(&self, item: &T);
}

impl<T, F> Handler<T> for F
where
    F: Fn(&T) + Send + Sync,
{
    fn handle(&self, item: &T) {
        self(item);
    }
}

/// Shared reference to a handler. Identity is pointer identity, so callers
/// unsubscribe with a clone of the reference they subscribed with.
pub struct HandlerRef<T>(Arc<dyn Handler<T>>);

impl<T> HandlerRef<T> {
    /// Wrap a handler.
    pub fn new(handler: impl Handler<T> + 'static) -> Self {
        Self(Arc::new(handler))
    }

    /// Invoke the handler.
    pub fn call(&self, item: &T) {
        self.0.handle(item);
    }

    /// Whether both references point at the same handler.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl<T> Clone for HandlerRef<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> fmt::Debug for HandlerRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandlerRef")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

// =============================================================================
// Topics
// =============================================================================

/// Publish/subscribe channel a topic lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Quote ticks.
    Ticks,
    /// Bars.
    Bars,
    /// Instrument definitions.
    Instruments,
}

impl ChannelKind {
    /// All channel kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Ticks, Self::Bars, Self::Instruments]
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ticks => "ticks",
            Self::Bars => "bars",
            Self::Instruments => "instruments",
        }
    }
}

/// A wire topic on a specific channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    /// Channel carrying the topic.
    pub channel: ChannelKind,
    /// Canonical key string.
    pub key: String,
}

impl Topic {
    /// Create a topic.
    #[must_use]
    pub fn new(channel: ChannelKind, key: impl ToString) -> Self {
        Self {
            channel,
            key: key.to_string(),
        }
    }
}

/// How a topic's interest changed after a registry mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterestChange {
    /// Affected topic.
    pub topic: Topic,
    /// True when interest crossed zero (0→1 on add, 1→0 on remove).
    pub crossed_zero: bool,
}

// =============================================================================
// Handler Registry
// =============================================================================

/// Ordered handler lists keyed by subscription key.
pub struct HandlerRegistry<K, T> {
    entries: HashMap<K, Vec<HandlerRef<T>>>,
}

impl<K, T> Default for HandlerRegistry<K, T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K, T> fmt::Debug for HandlerRegistry<K, T>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v.len())))
            .finish()
    }
}

impl<K, T> HandlerRegistry<K, T>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler for a key.
    ///
    /// Returns `false` if this exact handler was already registered.
    pub fn add(&mut self, key: K, handler: HandlerRef<T>) -> bool {
        let handlers = self.entries.entry(key).or_default();
        if handlers.iter().any(|h| h.same_as(&handler)) {
            return false;
        }
        handlers.push(handler);
        true
    }

    /// Remove a handler for a key.
    ///
    /// Returns `false` if the handler was not registered. The key is dropped
    /// once its last handler is removed.
    pub fn remove(&mut self, key: &K, handler: &HandlerRef<T>) -> bool {
        let Some(handlers) = self.entries.get_mut(key) else {
            return false;
        };

        let before = handlers.len();
        handlers.retain(|h| !h.same_as(handler));
        let removed = handlers.len() != before;

        if handlers.is_empty() {
            self.entries.remove(key);
        }

        removed
    }

    /// Whether this exact handler is registered for the key.
    #[must_use]
    pub fn contains(&self, key: &K, handler: &HandlerRef<T>) -> bool {
        self.entries
            .get(key)
            .is_some_and(|handlers| handlers.iter().any(|h| h.same_as(handler)))
    }

    /// Snapshot of the handlers for a key, in registration order.
    #[must_use]
    pub fn handlers(&self, key: &K) -> Vec<HandlerRef<T>> {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    /// Number of handlers registered for a key.
    #[must_use]
    pub fn count(&self, key: &K) -> usize {
        self.entries.get(key).map_or(0, Vec::len)
    }

    /// Keys with at least one handler.
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        self.entries.keys().cloned().collect()
    }

    /// Number of keys with handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every handler.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;

    fn counting_handler(counter: &Arc<AtomicUsize>) -> HandlerRef<u32> {
        let counter = Arc::clone(counter);
        HandlerRef::new(move |_: &u32| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn add_new_key() {
        let mut registry = HandlerRegistry::<String, u32>::new();
        let counter = Arc::new(AtomicUsize::new(0));

        assert!(registry.add("AAPL".to_string(), counting_handler(&counter)));
        assert_eq!(registry.count(&"AAPL".to_string()), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_handler_ignored() {
        let mut registry = HandlerRegistry::<String, u32>::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(&counter);

        assert!(registry.add("AAPL".to_string(), handler.clone()));
        assert!(!registry.add("AAPL".to_string(), handler));
        assert_eq!(registry.count(&"AAPL".to_string()), 1);
    }

    #[test]
    fn handlers_preserve_registration_order() {
        let mut registry = HandlerRegistry::<String, u32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            registry.add(
                "EUR".to_string(),
                HandlerRef::new(move |_: &u32| log.lock().push(tag)),
            );
        }

        for handler in registry.handlers(&"EUR".to_string()) {
            handler.call(&1);
        }

        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn remove_last_handler_drops_key() {
        let mut registry = HandlerRegistry::<String, u32>::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(&counter);

        registry.add("AAPL".to_string(), handler.clone());
        assert!(registry.remove(&"AAPL".to_string(), &handler));
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_keeps_other_handlers() {
        let mut registry = HandlerRegistry::<String, u32>::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let first = counting_handler(&counter);
        let second = counting_handler(&counter);

        registry.add("AAPL".to_string(), first.clone());
        registry.add("AAPL".to_string(), second.clone());

        assert!(registry.remove(&"AAPL".to_string(), &first));
        assert!(registry.contains(&"AAPL".to_string(), &second));
        assert!(!registry.contains(&"AAPL".to_string(), &first));
    }

    #[test]
    fn remove_unknown_handler_no_changes() {
        let mut registry = HandlerRegistry::<String, u32>::new();
        let counter = Arc::new(AtomicUsize::new(0));

        registry.add("AAPL".to_string(), counting_handler(&counter));
        assert!(!registry.remove(&"AAPL".to_string(), &counting_handler(&counter)));
        assert!(!registry.remove(&"MSFT".to_string(), &counting_handler(&counter)));
        assert_eq!(registry.count(&"AAPL".to_string()), 1);
    }

    #[test]
    fn clones_share_identity() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(&counter);
        let clone = handler.clone();

        assert!(handler.same_as(&clone));
        assert!(!handler.same_as(&counting_handler(&counter)));
    }

    #[test]
    fn clear_removes_everything() {
        let mut registry = HandlerRegistry::<String, u32>::new();
        let counter = Arc::new(AtomicUsize::new(0));

        registry.add("AAPL".to_string(), counting_handler(&counter));
        registry.add("MSFT".to_string(), counting_handler(&counter));
        registry.clear();

        assert!(registry.is_empty());
        assert!(registry.handlers(&"AAPL".to_string()).is_empty());
    }

    #[test]
    fn channel_kind_labels() {
        assert_eq!(ChannelKind::all().len(), 3);
        assert_eq!(ChannelKind::Ticks.as_str(), "ticks");
        assert_eq!(ChannelKind::Bars.as_str(), "bars");
        assert_eq!(ChannelKind::Instruments.as_str(), "instruments");
    }
}
