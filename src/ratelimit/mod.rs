//! Rate and counter store.
//!
//! Expiring marks, counters and sets used for cooldowns, link permits,
//! raffles, filter offenses and the repeat double-fire guard. Every operation
//! is one atomic step against the backing store.

mod channel;
mod memory;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

pub use channel::ChannelRates;
pub use memory::MemoryRateStore;

/// Contract of the external counter/set service.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Set `key`, expiring after `ttl`.
    async fn mark(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Whether `key` is set and unexpired.
    async fn is_marked(&self, key: &str) -> Result<bool>;

    /// Return whether `key` was already set; set it if not.
    async fn check_and_mark(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Return whether `key` was already set; in both cases (re)set its expiry to `ttl`.
    async fn check_and_refresh(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Return whether `key` was set, removing it.
    async fn check_and_delete(&self, key: &str) -> Result<bool>;

    /// Add one to the counter at `key` and return the new value.
    ///
    /// `ttl` applies only when the counter is created.
    async fn increment(&self, key: &str, ttl: Option<Duration>) -> Result<i64>;

    /// Add `member` to the set; returns whether it was new.
    async fn set_add(&self, key: &str, member: &str) -> Result<bool>;

    /// Remove and return a random member.
    async fn set_pop(&self, key: &str) -> Result<Option<String>>;

    async fn set_clear(&self, key: &str) -> Result<()>;

    async fn set_len(&self, key: &str) -> Result<i64>;
}
