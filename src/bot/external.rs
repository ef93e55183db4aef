//! Contracts of the collaborators the engine talks to.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Outbound chat sender.
///
/// Moderation actions go through the same call as pseudo-commands such as
/// `/ban user` or `/timeout user 600`.
#[async_trait]
pub trait Sender: Send + Sync {
    async fn send_message(&self, origin: &str, target: &str, message: &str) -> Result<()>;
}

/// Told whenever a channel's active or bot assignment changes.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_channel_updates(&self, bot_name: &str) -> Result<()>;
}

/// Title and category of a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelInfo {
    pub status: String,
    pub game: String,
}

/// A live stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    pub started_at: DateTime<Utc>,
    pub viewers: i64,
    pub game: String,
    pub title: String,
}

/// Subset of the platform API used by builtins.
#[async_trait]
pub trait TwitchApi: Send + Sync {
    async fn user_id_by_name(&self, name: &str) -> Result<Option<i64>>;
    async fn channel_info(&self, twitch_id: i64) -> Result<ChannelInfo>;
    async fn set_channel_status(&self, twitch_id: i64, status: &str) -> Result<()>;
    async fn set_channel_game(&self, twitch_id: i64, game: &str) -> Result<()>;
    async fn current_stream(&self, twitch_id: i64) -> Result<Option<Stream>>;
    async fn chatters(&self, channel: &str) -> Result<Vec<String>>;
}

/// Platform API for deployments without credentials. Every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTwitchApi;

#[async_trait]
impl TwitchApi for NoTwitchApi {
    async fn user_id_by_name(&self, _name: &str) -> Result<Option<i64>> {
        anyhow::bail!("platform API not configured")
    }

    async fn channel_info(&self, _twitch_id: i64) -> Result<ChannelInfo> {
        anyhow::bail!("platform API not configured")
    }

    async fn set_channel_status(&self, _twitch_id: i64, _status: &str) -> Result<()> {
        anyhow::bail!("platform API not configured")
    }

    async fn set_channel_game(&self, _twitch_id: i64, _game: &str) -> Result<()> {
        anyhow::bail!("platform API not configured")
    }

    async fn current_stream(&self, _twitch_id: i64) -> Result<Option<Stream>> {
        anyhow::bail!("platform API not configured")
    }

    async fn chatters(&self, _channel: &str) -> Result<Vec<String>> {
        anyhow::bail!("platform API not configured")
    }
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_channel_updates(&self, bot_name: &str) -> Result<()> {
        tracing::info!("Channel assignments changed for bot {}", bot_name);
        Ok(())
    }
}
