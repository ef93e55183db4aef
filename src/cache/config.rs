//! Cache configuration.

use std::time::Duration;

/// Configuration for a cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_capacity: u64,

    /// Time-to-live for cache entries.
    pub ttl: Option<Duration>,

    /// Time-to-idle for cache entries.
    pub tti: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(Duration::from_secs(300)),
            tti: None,
        }
    }
}

impl CacheConfig {
    /// Seen-message ids. The TTL is the dedup window and must outlive the
    /// transport's redelivery delay.
    pub fn message_ids(window: Duration) -> Self {
        Self {
            max_capacity: 200_000,
            ttl: Some(window),
            tti: None,
        }
    }

    /// Parsed command bodies keyed by source text.
    /// Bodies are immutable values, so only idle entries are dropped.
    pub fn parse_trees() -> Self {
        Self {
            max_capacity: 20_000,
            ttl: None,
            tti: Some(Duration::from_secs(1800)), // 30 minutes idle
        }
    }

    /// Compiled autoreply and filter patterns keyed by pattern text.
    pub fn compiled_patterns() -> Self {
        Self {
            max_capacity: 5_000,
            ttl: None,
            tti: Some(Duration::from_secs(3600)), // 1 hour idle
        }
    }
}
