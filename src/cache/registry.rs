//! Cache registry - Central management for all caches.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::{CacheConfig, TypedCache};

/// Central registry for named, typed caches.
///
/// Components look their caches up by name so that two components asking for
/// the same name share one cache.
#[derive(Clone, Default)]
pub struct CacheRegistry {
    caches: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

/// Internal cache entry storing type-erased cache.
struct CacheEntry {
    cache: Box<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl CacheRegistry {
    /// Create a new empty cache registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an existing cache or create a new one if it doesn't exist.
    ///
    /// # Panics
    /// Panics if a cache with the same name was registered with different types.
    pub fn get_or_create<K, V>(&self, name: &str, config: CacheConfig) -> TypedCache<K, V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let mut caches = self.caches.write();

        if let Some(existing) = caches.get(name) {
            return downcast(name, existing);
        }

        debug!("Creating cache: {}", name);
        let cache = TypedCache::<K, V>::new(name, config);
        caches.insert(
            name.to_string(),
            CacheEntry {
                cache: Box::new(cache.clone()),
                type_id: TypeId::of::<TypedCache<K, V>>(),
                type_name: std::any::type_name::<TypedCache<K, V>>(),
            },
        );

        cache
    }
}

fn downcast<K, V>(name: &str, entry: &CacheEntry) -> TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    match entry.cache.downcast_ref::<TypedCache<K, V>>() {
        Some(cache) if entry.type_id == TypeId::of::<TypedCache<K, V>>() => cache.clone(),
        _ => panic!(
            "Cache '{}' type mismatch: expected {}, got {}",
            name,
            std::any::type_name::<TypedCache<K, V>>(),
            entry.type_name
        ),
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let caches = self.caches.read();
        f.debug_struct("CacheRegistry")
            .field("cache_count", &caches.len())
            .field("cache_names", &caches.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_shares_cache() {
        let registry = CacheRegistry::new();
        let a: TypedCache<String, u32> = registry.get_or_create("ids", CacheConfig::default());
        a.insert("x".into(), 1);
        let b: TypedCache<String, u32> = registry.get_or_create("ids", CacheConfig::default());
        assert_eq!(b.get(&"x".to_string()), Some(1));
    }

    #[test]
    #[should_panic(expected = "type mismatch")]
    fn mismatched_types_panic() {
        let registry = CacheRegistry::new();
        let _: TypedCache<String, u32> = registry.get_or_create("ids", CacheConfig::default());
        let _: TypedCache<String, String> = registry.get_or_create("ids", CacheConfig::default());
    }
}
