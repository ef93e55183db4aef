//! Channel-scoped keys over a [`RateStore`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use super::RateStore;

const FILTER_OFFENSE_WINDOW: Duration = Duration::from_secs(3600);

/// Helper that builds every rate-store key for one channel.
#[derive(Clone)]
pub struct ChannelRates {
    store: Arc<dyn RateStore>,
    channel: String,
}

impl ChannelRates {
    pub fn new(store: Arc<dyn RateStore>, channel: &str) -> Self {
        Self {
            store,
            channel: channel.to_lowercase(),
        }
    }

    fn key(&self, parts: &[&str]) -> String {
        let mut key = format!("channel:{}", self.channel);
        for part in parts {
            key.push(':');
            key.push_str(part);
        }
        key
    }

    /// Shared command cooldown. Returns `true` when the channel is still cooling down.
    pub async fn command_cooldown(&self, ttl: Duration) -> Result<bool> {
        self.store.check_and_refresh(&self.key(&["cooldown", "any"]), ttl).await
    }

    /// Cooldown of one named feature (`roll`, ...).
    pub async fn feature_cooldown(&self, feature: &str, ttl: Duration) -> Result<bool> {
        self.store.check_and_mark(&self.key(&["cooldown", feature]), ttl).await
    }

    pub async fn autoreply_cooldown(&self, num: i64, ttl: Duration) -> Result<bool> {
        self.store
            .check_and_mark(&self.key(&["autoreply", &num.to_string()]), ttl)
            .await
    }

    /// Guard against two overlapping firings of the same repeat or schedule.
    pub async fn repeat_guard(&self, kind: &str, id: i64, ttl: Duration) -> Result<bool> {
        self.store
            .check_and_mark(&self.key(&[kind, &id.to_string()]), ttl)
            .await
    }

    pub async fn permit_link(&self, user: &str, ttl: Duration) -> Result<()> {
        self.store
            .mark(&self.key(&["permit", &user.to_lowercase()]), ttl)
            .await
    }

    pub async fn has_link_permit(&self, user: &str) -> Result<bool> {
        self.store
            .is_marked(&self.key(&["permit", &user.to_lowercase()]))
            .await
    }

    /// Consume a one-shot link permit.
    pub async fn use_link_permit(&self, user: &str) -> Result<bool> {
        self.store
            .check_and_delete(&self.key(&["permit", &user.to_lowercase()]))
            .await
    }

    /// Count a filter offense within the rolling hour.
    pub async fn filter_offense(&self, user: &str) -> Result<i64> {
        self.store
            .increment(
                &self.key(&["offense", &user.to_lowercase()]),
                Some(FILTER_OFFENSE_WINDOW),
            )
            .await
    }

    pub async fn raffle_add(&self, user: &str) -> Result<bool> {
        self.store.set_add(&self.key(&["raffle"]), &user.to_lowercase()).await
    }

    pub async fn raffle_winner(&self) -> Result<Option<String>> {
        self.store.set_pop(&self.key(&["raffle"])).await
    }

    pub async fn raffle_reset(&self) -> Result<()> {
        self.store.set_clear(&self.key(&["raffle"])).await
    }

    pub async fn raffle_count(&self) -> Result<i64> {
        self.store.set_len(&self.key(&["raffle"])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::MemoryRateStore;

    #[tokio::test]
    async fn keys_are_scoped_per_channel() {
        let store: Arc<dyn RateStore> = Arc::new(MemoryRateStore::new());
        let a = ChannelRates::new(store.clone(), "Alpha");
        let b = ChannelRates::new(store, "beta");

        let ttl = Duration::from_secs(5);
        assert!(!a.command_cooldown(ttl).await.unwrap());
        assert!(a.command_cooldown(ttl).await.unwrap());
        assert!(!b.command_cooldown(ttl).await.unwrap());

        a.permit_link("Someone", ttl).await.unwrap();
        assert!(!b.use_link_permit("someone").await.unwrap());
        assert!(a.use_link_permit("someone").await.unwrap());
    }

    #[tokio::test]
    async fn raffle_entries_are_unique() {
        let store: Arc<dyn RateStore> = Arc::new(MemoryRateStore::new());
        let rates = ChannelRates::new(store, "chan");
        assert!(rates.raffle_add("User").await.unwrap());
        assert!(!rates.raffle_add("user").await.unwrap());
        assert_eq!(rates.raffle_count().await.unwrap(), 1);
        assert_eq!(rates.raffle_winner().await.unwrap().as_deref(), Some("user"));
    }
}
