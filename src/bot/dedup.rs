//! Message deduplication.
//!
//! The upstream transport delivers at least once; every message ID is marked
//! before handling so a redelivery is dropped.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::cache::{CacheConfig, CacheRegistry, TypedCache};
use crate::ratelimit::RateStore;

#[async_trait]
pub trait Deduplicator: Send + Sync {
    /// Mark `id` as seen. Returns `true` if it had already been seen.
    async fn check_and_mark(&self, id: &str) -> Result<bool>;
}

/// Process-local expiring set.
#[derive(Clone)]
pub struct MemoryDedup {
    seen: TypedCache<String, ()>,
}

impl MemoryDedup {
    pub fn new(cache: &CacheRegistry, window: Duration) -> Self {
        Self {
            seen: cache.get_or_create("message_ids", CacheConfig::message_ids(window)),
        }
    }
}

#[async_trait]
impl Deduplicator for MemoryDedup {
    async fn check_and_mark(&self, id: &str) -> Result<bool> {
        Ok(!self.seen.insert_if_absent(id.to_string(), ()))
    }
}

/// Expiring keys in the shared rate store, for multi-instance deployments.
pub struct SharedDedup {
    store: Arc<dyn RateStore>,
    window: Duration,
}

impl SharedDedup {
    pub fn new(store: Arc<dyn RateStore>, window: Duration) -> Self {
        Self { store, window }
    }
}

#[async_trait]
impl Deduplicator for SharedDedup {
    async fn check_and_mark(&self, id: &str) -> Result<bool> {
        self.store
            .check_and_mark(&format!("message_id:{id}"), self.window)
            .await
    }
}

/// Reports every message as new.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverSeen;

#[async_trait]
impl Deduplicator for NeverSeen {
    async fn check_and_mark(&self, _id: &str) -> Result<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::MemoryRateStore;

    #[tokio::test]
    async fn memory_dedup_marks_once() {
        let registry = CacheRegistry::new();
        let dedup = MemoryDedup::new(&registry, Duration::from_millis(100));

        assert!(!dedup.check_and_mark("m1").await.unwrap());
        assert!(dedup.check_and_mark("m1").await.unwrap());
        assert!(dedup.check_and_mark("m1").await.unwrap());
        assert!(!dedup.check_and_mark("m2").await.unwrap());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!dedup.check_and_mark("m1").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn shared_dedup_expires() {
        let store = Arc::new(MemoryRateStore::new());
        let dedup = SharedDedup::new(store, Duration::from_secs(300));

        assert!(!dedup.check_and_mark("m1").await.unwrap());
        assert!(dedup.check_and_mark("m1").await.unwrap());

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(!dedup.check_and_mark("m1").await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_callers_one_winner() {
        let registry = CacheRegistry::new();
        let dedup = Arc::new(MemoryDedup::new(&registry, Duration::from_secs(60)));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let dedup = dedup.clone();
                tokio::spawn(async move { dedup.check_and_mark("same").await.unwrap() })
            })
            .collect();

        let mut fresh = 0;
        for h in handles {
            if !h.await.unwrap() {
                fresh += 1;
            }
        }
        assert_eq!(fresh, 1);
    }

    #[tokio::test]
    async fn never_seen_is_always_new() {
        assert!(!NeverSeen.check_and_mark("x").await.unwrap());
        assert!(!NeverSeen.check_and_mark("x").await.unwrap());
    }
}
