//! In-process collaborators and a harness that drives the message pipeline.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::config::Config;
use crate::database::{Channel, CommandTarget, MemoryStore, Store};
use crate::permissions::AccessLevel;
use crate::ratelimit::MemoryRateStore;
use crate::repeat::RepeatHandle;

use super::dispatcher::{AppState, Services, handle_message};
use super::external::{ChannelInfo, Notifier, Sender, Stream, TwitchApi};
use super::message::{Badges, ChatMessage};

/// One outbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub origin: String,
    pub target: String,
    pub message: String,
}

/// Sender that keeps every line.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingSender {
    /// Drain everything sent so far.
    pub fn take(&self) -> Vec<Sent> {
        std::mem::take(&mut *self.sent.lock())
    }
}

#[async_trait]
impl Sender for RecordingSender {
    async fn send_message(&self, origin: &str, target: &str, message: &str) -> Result<()> {
        self.sent.lock().push(Sent {
            origin: origin.to_string(),
            target: target.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    bots: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_channel_updates(&self, bot_name: &str) -> Result<()> {
        self.bots.lock().push(bot_name.to_string());
        Ok(())
    }
}

/// Platform API answering from in-memory tables.
#[derive(Debug, Default)]
pub struct FakeTwitchApi {
    users: Mutex<HashMap<String, i64>>,
    info: Mutex<HashMap<i64, ChannelInfo>>,
    streams: Mutex<HashMap<i64, Stream>>,
    chatters: Mutex<HashMap<String, Vec<String>>>,
}

impl FakeTwitchApi {
    pub fn add_user(&self, name: &str, twitch_id: i64) {
        self.users.lock().insert(name.to_lowercase(), twitch_id);
    }

    pub fn set_stream(&self, twitch_id: i64, stream: Option<Stream>) {
        let mut streams = self.streams.lock();
        match stream {
            Some(stream) => streams.insert(twitch_id, stream),
            None => streams.remove(&twitch_id),
        };
    }

    pub fn set_chatters(&self, channel: &str, chatters: Vec<String>) {
        self.chatters.lock().insert(channel.to_string(), chatters);
    }
}

#[async_trait]
impl TwitchApi for FakeTwitchApi {
    async fn user_id_by_name(&self, name: &str) -> Result<Option<i64>> {
        Ok(self.users.lock().get(&name.to_lowercase()).copied())
    }

    async fn channel_info(&self, twitch_id: i64) -> Result<ChannelInfo> {
        Ok(self.info.lock().get(&twitch_id).cloned().unwrap_or_default())
    }

    async fn set_channel_status(&self, twitch_id: i64, status: &str) -> Result<()> {
        self.info.lock().entry(twitch_id).or_default().status = status.to_string();
        Ok(())
    }

    async fn set_channel_game(&self, twitch_id: i64, game: &str) -> Result<()> {
        self.info.lock().entry(twitch_id).or_default().game = game.to_string();
        Ok(())
    }

    async fn current_stream(&self, twitch_id: i64) -> Result<Option<Stream>> {
        Ok(self.streams.lock().get(&twitch_id).cloned())
    }

    async fn chatters(&self, channel: &str) -> Result<Vec<String>> {
        Ok(self.chatters.lock().get(channel).cloned().unwrap_or_default())
    }
}

/// Test configuration: bot `quill`, admin `admin`, no command cooldown.
pub fn test_config() -> Config {
    Config {
        bot_name: "quill".to_string(),
        admins: vec!["admin".to_string()],
        default_bullet: "[quill]".to_string(),
        default_cooldown: Duration::ZERO,
        ..Config::default()
    }
}

/// An [`AppState`] over in-memory collaborators.
pub struct Harness {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub rates: Arc<MemoryRateStore>,
    pub sender: Arc<RecordingSender>,
    pub notifier: Arc<RecordingNotifier>,
    pub twitch: Arc<FakeTwitchApi>,

    next_message: AtomicU64,
    user_ids: Mutex<HashMap<String, i64>>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(test_config(), RepeatHandle::detached())
    }

    pub fn with_config(config: Config, repeats: RepeatHandle) -> Self {
        let store = Arc::new(MemoryStore::new());
        let rates = Arc::new(MemoryRateStore::new());
        let sender = Arc::new(RecordingSender::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let twitch = Arc::new(FakeTwitchApi::default());

        let services = Services {
            store: store.clone(),
            rates: rates.clone(),
            sender: sender.clone(),
            notifier: notifier.clone(),
            twitch: twitch.clone(),
        };

        Self {
            state: AppState::new(config, services, repeats),
            store,
            rates,
            sender,
            notifier,
            twitch,
            next_message: AtomicU64::new(1),
            user_ids: Mutex::new(HashMap::new()),
        }
    }

    /// Insert an active channel with default settings.
    pub async fn channel(&self, name: &str, twitch_id: i64) -> Channel {
        self.channel_with(name, twitch_id, |_| {}).await
    }

    /// Insert an active channel after adjusting its settings.
    pub async fn channel_with(
        &self,
        name: &str,
        twitch_id: i64,
        adjust: impl FnOnce(&mut Channel),
    ) -> Channel {
        let mut channel = Channel::new(twitch_id, name, &self.state.config.bot_name);
        channel.prefix = self.state.config.default_prefix.clone();
        adjust(&mut channel);

        let mut tx = self.store.begin().await.unwrap();
        let channel = tx.insert_channel(channel).await.unwrap();
        tx.commit().await.unwrap();
        channel
    }

    /// Current stored state of `channel`.
    pub async fn load_channel(&self, channel: &Channel) -> Channel {
        let mut tx = self.store.begin().await.unwrap();
        let loaded = tx.channel_for_update(channel.id).await.unwrap();
        tx.rollback().await.unwrap();
        loaded.expect("channel exists")
    }

    pub async fn find_channel(&self, name: &str) -> Option<Channel> {
        let mut tx = self.store.begin().await.unwrap();
        let found = tx.channel_by_name(name).await.unwrap();
        tx.rollback().await.unwrap();
        found
    }

    /// Register a user with the platform API.
    pub fn twitch_user(&self, name: &str, twitch_id: i64) {
        self.twitch.add_user(name, twitch_id);
        self.user_ids.lock().insert(name.to_lowercase(), twitch_id);
    }

    /// Put a channel live.
    pub fn go_live(&self, twitch_id: i64, started_at: DateTime<Utc>, viewers: i64) {
        let stream = Stream {
            started_at,
            viewers,
            game: String::new(),
            title: String::new(),
        };
        self.twitch.set_stream(twitch_id, Some(stream));
    }

    /// Bots whose channel assignments were reported as changed.
    pub fn notified(&self) -> Vec<String> {
        self.notifier.bots.lock().clone()
    }

    fn user_id(&self, user: &str) -> i64 {
        let mut ids = self.user_ids.lock();
        let next = 10_000 + ids.len() as i64;
        *ids.entry(user.to_lowercase()).or_insert(next)
    }

    /// Build a message from `user` with badges matching `level`.
    ///
    /// `Admin` comes from the configured admin list, not from badges.
    pub fn message(
        &self,
        channel: &str,
        room_id: i64,
        user: &str,
        level: AccessLevel,
        text: &str,
    ) -> ChatMessage {
        let badges = Badges {
            broadcaster: level == AccessLevel::Broadcaster,
            moderator: level == AccessLevel::Moderator,
            subscriber: level == AccessLevel::Subscriber,
            ..Badges::default()
        };
        let n = self.next_message.fetch_add(1, Ordering::Relaxed);

        ChatMessage {
            id: format!("msg-{}", n),
            room_id: room_id.to_string(),
            channel: channel.to_string(),
            user: user.to_string(),
            user_id: self.user_id(user).to_string(),
            display_name: user.to_string(),
            badges,
            is_mod: false,
            text: text.to_string(),
            is_action: false,
        }
    }

    /// Run one message through the pipeline and return the lines it sent.
    pub async fn send(&self, msg: ChatMessage) -> Vec<String> {
        if let Err(e) = handle_message(&self.state, msg).await {
            tracing::debug!("Message failed: {:#}", e);
        }
        self.sender.take().into_iter().map(|s| s.message).collect()
    }

    pub async fn send_as(
        &self,
        channel: &Channel,
        user: &str,
        level: AccessLevel,
        text: &str,
    ) -> Vec<String> {
        let msg = self.message(&channel.name, channel.twitch_id, user, level, text);
        self.send(msg).await
    }

    /// Level of a stored command or list.
    pub async fn command_level(&self, channel: &Channel, name: &str) -> Option<AccessLevel> {
        let mut tx = self.store.begin().await.unwrap();
        let info = tx.command_info(channel.id, name).await.unwrap();
        tx.rollback().await.unwrap();
        info.map(|i| i.access_level)
    }

    /// Items of a stored list, empty when there is none.
    pub async fn list_items(&self, channel: &Channel, name: &str) -> Vec<String> {
        let mut tx = self.store.begin().await.unwrap();
        let items = match tx.command_info(channel.id, name).await.unwrap() {
            Some(info) => match info.target {
                Some(CommandTarget::List(id)) => tx
                    .command_list(id)
                    .await
                    .unwrap()
                    .map(|l| l.items)
                    .unwrap_or_default(),
                _ => Vec::new(),
            },
            None => Vec::new(),
        };
        tx.rollback().await.unwrap();
        items
    }
}
