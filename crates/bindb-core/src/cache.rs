//! Bounded, strictly-LRU read cache of parsed rows keyed by id (§4.5).

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::id::Id;
use crate::value::Row;

/// Default capacity used when a table doesn't specify one.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// A bounded LRU of parsed rows. `get`/`set` both promote the touched entry
/// to most-recently-used; eviction on overflow is O(1) amortized, delegated
/// to the `lru` crate's intrusive linked-list implementation.
pub struct ReadCache {
    inner: LruCache<Id, Row>,
}

impl ReadCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner: LruCache::new(capacity),
        }
    }

    /// Returns the cached row for `id`, promoting it to most-recently-used.
    /// A return of `None` means "absent from the cache" — distinct from a
    /// row whose columns happen to all be null, which is represented as
    /// `Some(row)` with `Value::Null` entries.
    pub fn get(&mut self, id: &Id) -> Option<&Row> {
        self.inner.get(id)
    }

    pub fn set(&mut self, id: Id, row: Row) {
        self.inner.put(id, row);
    }

    pub fn delete(&mut self, id: &Id) {
        self.inner.pop(id);
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn id(n: u8) -> Id {
        let mut bytes = [0u8; 12];
        bytes[11] = n;
        Id::from_bytes(bytes)
    }

    fn row(name: &str) -> Row {
        let mut r = Row::new();
        r.insert("name".into(), Value::Text(name.into()));
        r
    }

    #[test]
    fn missing_key_returns_none() {
        let mut cache = ReadCache::new(2);
        assert!(cache.get(&id(1)).is_none());
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut cache = ReadCache::new(2);
        cache.set(id(1), row("alice"));
        assert_eq!(cache.get(&id(1)), Some(&row("alice")));
    }

    #[test]
    fn evicts_least_recently_used_on_overflow() {
        let mut cache = ReadCache::new(2);
        cache.set(id(1), row("a"));
        cache.set(id(2), row("b"));
        // touch id(1) so id(2) becomes the LRU entry.
        cache.get(&id(1));
        cache.set(id(3), row("c"));
        assert!(cache.get(&id(2)).is_none());
        assert!(cache.get(&id(1)).is_some());
        assert!(cache.get(&id(3)).is_some());
    }

    #[test]
    fn delete_evicts_entry() {
        let mut cache = ReadCache::new(2);
        cache.set(id(1), row("a"));
        cache.delete(&id(1));
        assert!(cache.get(&id(1)).is_none());
    }
}
