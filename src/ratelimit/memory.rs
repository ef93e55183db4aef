//! Process-local rate store on DashMap.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rand::Rng;
use tokio::time::Instant;

use super::RateStore;

#[derive(Debug, Clone)]
enum Value {
    Mark,
    Counter(i64),
    Set(Vec<String>),
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires: Option<Instant>,
}

impl Slot {
    fn mark(ttl: Duration) -> Self {
        Self {
            value: Value::Mark,
            expires: Some(Instant::now() + ttl),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires.is_none_or(|at| at > now)
    }
}

/// In-memory [`RateStore`].
///
/// Each operation holds one map shard lock for its whole duration, which makes
/// it atomic with respect to every other operation on the same key.
#[derive(Debug, Default)]
pub struct MemoryRateStore {
    slots: DashMap<String, Slot>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.is_live(now));
        before.saturating_sub(self.slots.len())
    }

    fn with_set<T>(&self, key: &str, f: impl FnOnce(&mut Vec<String>) -> T) -> T {
        let now = Instant::now();
        let mut slot = self.slots.entry(key.to_string()).or_insert_with(|| Slot {
            value: Value::Set(Vec::new()),
            expires: None,
        });
        if !slot.is_live(now) || !matches!(slot.value, Value::Set(_)) {
            *slot = Slot {
                value: Value::Set(Vec::new()),
                expires: None,
            };
        }
        match &mut slot.value {
            Value::Set(members) => f(members),
            _ => unreachable!("slot was just reset to a set"),
        }
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    async fn mark(&self, key: &str, ttl: Duration) -> Result<()> {
        self.slots.insert(key.to_string(), Slot::mark(ttl));
        Ok(())
    }

    async fn is_marked(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        Ok(self.slots.get(key).is_some_and(|s| s.is_live(now)))
    }

    async fn check_and_mark(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut o) => {
                if o.get().is_live(now) {
                    Ok(true)
                } else {
                    o.insert(Slot::mark(ttl));
                    Ok(false)
                }
            }
            Entry::Vacant(v) => {
                v.insert(Slot::mark(ttl));
                Ok(false)
            }
        }
    }

    async fn check_and_refresh(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut o) => {
                let was_live = o.get().is_live(now);
                o.insert(Slot::mark(ttl));
                Ok(was_live)
            }
            Entry::Vacant(v) => {
                v.insert(Slot::mark(ttl));
                Ok(false)
            }
        }
    }

    async fn check_and_delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        Ok(self
            .slots
            .remove(key)
            .is_some_and(|(_, slot)| slot.is_live(now)))
    }

    async fn increment(&self, key: &str, ttl: Option<Duration>) -> Result<i64> {
        let now = Instant::now();
        let fresh = || Slot {
            value: Value::Counter(1),
            expires: ttl.map(|t| now + t),
        };

        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut o) => {
                let slot = o.get_mut();
                if slot.is_live(now)
                    && let Value::Counter(n) = &mut slot.value
                {
                    *n += 1;
                    return Ok(*n);
                }
                o.insert(fresh());
                Ok(1)
            }
            Entry::Vacant(v) => {
                v.insert(fresh());
                Ok(1)
            }
        }
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        Ok(self.with_set(key, |members| {
            if members.iter().any(|m| m == member) {
                false
            } else {
                members.push(member.to_string());
                true
            }
        }))
    }

    async fn set_pop(&self, key: &str) -> Result<Option<String>> {
        Ok(self.with_set(key, |members| {
            if members.is_empty() {
                return None;
            }
            let idx = rand::thread_rng().gen_range(0..members.len());
            Some(members.swap_remove(idx))
        }))
    }

    async fn set_clear(&self, key: &str) -> Result<()> {
        self.slots.remove(key);
        Ok(())
    }

    async fn set_len(&self, key: &str) -> Result<i64> {
        Ok(self.with_set(key, |members| members.len() as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    const TTL: Duration = Duration::from_secs(10);

    #[tokio::test(start_paused = true)]
    async fn check_and_mark_is_first_caller_wins() {
        let store = MemoryRateStore::new();
        assert!(!store.check_and_mark("k", TTL).await.unwrap());
        assert!(store.check_and_mark("k", TTL).await.unwrap());
        assert!(store.is_marked("k").await.unwrap());

        advance(TTL + Duration::from_millis(1)).await;
        assert!(!store.is_marked("k").await.unwrap());
        assert!(!store.check_and_mark("k", TTL).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn check_and_refresh_extends_expiry() {
        let store = MemoryRateStore::new();
        assert!(!store.check_and_refresh("cd", TTL).await.unwrap());

        advance(Duration::from_secs(8)).await;
        assert!(store.check_and_refresh("cd", TTL).await.unwrap());

        // Still live 8s later because the previous call refreshed it
        advance(Duration::from_secs(8)).await;
        assert!(store.is_marked("cd").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn permits_are_consumed_once() {
        let store = MemoryRateStore::new();
        store.mark("permit", TTL).await.unwrap();
        assert!(store.check_and_delete("permit").await.unwrap());
        assert!(!store.check_and_delete("permit").await.unwrap());

        store.mark("permit", TTL).await.unwrap();
        advance(TTL * 2).await;
        assert!(!store.check_and_delete("permit").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn counters_restart_after_expiry() {
        let store = MemoryRateStore::new();
        let hour = Some(Duration::from_secs(3600));
        assert_eq!(store.increment("n", hour).await.unwrap(), 1);
        assert_eq!(store.increment("n", hour).await.unwrap(), 2);

        advance(Duration::from_secs(3601)).await;
        assert_eq!(store.increment("n", hour).await.unwrap(), 1);
        assert_eq!(store.sweep(), 0);
    }

    #[tokio::test]
    async fn set_operations() {
        let store = MemoryRateStore::new();
        assert!(store.set_add("raffle", "a").await.unwrap());
        assert!(store.set_add("raffle", "b").await.unwrap());
        assert!(!store.set_add("raffle", "a").await.unwrap());
        assert_eq!(store.set_len("raffle").await.unwrap(), 2);

        let winner = store.set_pop("raffle").await.unwrap().unwrap();
        assert!(winner == "a" || winner == "b");
        assert_eq!(store.set_len("raffle").await.unwrap(), 1);

        store.set_clear("raffle").await.unwrap();
        assert_eq!(store.set_len("raffle").await.unwrap(), 0);
        assert_eq!(store.set_pop("raffle").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_expired_marks() {
        let store = MemoryRateStore::new();
        store.mark("a", TTL).await.unwrap();
        store.mark("b", TTL * 3).await.unwrap();
        advance(TTL * 2).await;
        assert_eq!(store.sweep(), 1);
    }
}
