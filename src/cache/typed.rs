//! Typed cache wrapper around Moka.

use std::hash::Hash;
use std::sync::Arc;

use moka::sync::Cache;

use super::CacheConfig;

/// A typed cache wrapper that provides a clean API over Moka.
///
/// Cloning is cheap and shares the same underlying cache.
pub struct TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<K, V>,
    name: Arc<str>,
}

// Manual Clone implementation that doesn't require K: Clone
impl<K, V> Clone for TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            name: Arc::clone(&self.name),
        }
    }
}

impl<K, V> TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a new typed cache with the given name and config.
    pub fn new(name: impl Into<Arc<str>>, config: CacheConfig) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_capacity);

        if let Some(ttl) = config.ttl {
            builder = builder.time_to_live(ttl);
        }

        if let Some(tti) = config.tti {
            builder = builder.time_to_idle(tti);
        }

        Self {
            inner: builder.build(),
            name: name.into(),
        }
    }

    /// Insert a key-value pair into the cache.
    pub fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value);
    }

    /// Get a value from the cache.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key)
    }

    /// Insert `value` only if `key` is absent or expired.
    ///
    /// Returns `true` when this call inserted. Concurrent callers for the same
    /// key are serialized by Moka, so exactly one of them sees `true`.
    pub fn insert_if_absent(&self, key: K, value: V) -> bool {
        self.inner.entry(key).or_insert(value).is_fresh()
    }
}

impl<K, V> std::fmt::Debug for TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedCache")
            .field("name", &self.name)
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn insert_if_absent_only_once() {
        let cache: TypedCache<String, ()> = TypedCache::new("t", CacheConfig::default());
        assert!(cache.insert_if_absent("a".into(), ()));
        assert!(!cache.insert_if_absent("a".into(), ()));
        assert!(cache.insert_if_absent("b".into(), ()));
    }

    #[test]
    fn insert_if_absent_after_expiry() {
        let cache: TypedCache<String, ()> =
            TypedCache::new("t", CacheConfig::message_ids(Duration::from_millis(50)));
        assert!(cache.insert_if_absent("a".into(), ()));
        std::thread::sleep(Duration::from_millis(120));
        assert!(cache.insert_if_absent("a".into(), ()));
    }
}
