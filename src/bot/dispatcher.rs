//! Message pipeline.
//!
//! Intake, deduplication, session construction, filters and command
//! resolution for one inbound message, plus the firing path used by repeats
//! and schedules.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::cache::{CacheConfig, CacheRegistry, TypedCache};
use crate::cbp::{self, Node, ParseError};
use crate::config::{Config, DedupMode};
use crate::database::{Channel, CommandInfo, CommandTarget, Store};
use crate::events;
use crate::permissions::Permissions;
use crate::plugins::{self, Builtins};
use crate::ratelimit::{ChannelRates, RateStore};
use crate::repeat::{Firer, RepeatHandle, RepeatKey};
use crate::utils::split_first;

use super::actions::body_requires_live;
use super::dedup::{Deduplicator, MemoryDedup, NeverSeen, SharedDedup};
use super::error::{CommandError, CommandResult};
use super::external::{Notifier, Sender, TwitchApi};
use super::message::ChatMessage;
use super::session::Session;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// Transactional store for every persistent entity.
    pub store: Arc<dyn Store>,

    /// Expiring marks, counters and sets.
    pub rates: Arc<dyn RateStore>,

    pub dedup: Arc<dyn Deduplicator>,
    pub sender: Arc<dyn Sender>,
    pub notifier: Arc<dyn Notifier>,
    pub twitch: Arc<dyn TwitchApi>,

    /// Level resolver with the configured admins.
    pub permissions: Permissions,

    pub builtins: Arc<Builtins>,

    /// Feeds add/remove events to the repeat scheduler.
    pub repeats: RepeatHandle,

    trees: TypedCache<String, Arc<Vec<Node>>>,
    patterns: TypedCache<String, Regex>,
}

/// Collaborators handed to [`AppState::new`].
pub struct Services {
    pub store: Arc<dyn Store>,
    pub rates: Arc<dyn RateStore>,
    pub sender: Arc<dyn Sender>,
    pub notifier: Arc<dyn Notifier>,
    pub twitch: Arc<dyn TwitchApi>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(config: Config, services: Services, repeats: RepeatHandle) -> Self {
        let cache = CacheRegistry::new();

        let dedup: Arc<dyn Deduplicator> = match config.dedup_mode {
            DedupMode::Memory => Arc::new(MemoryDedup::new(&cache, config.dedup_window)),
            DedupMode::Shared => {
                Arc::new(SharedDedup::new(services.rates.clone(), config.dedup_window))
            }
            DedupMode::None => Arc::new(NeverSeen),
        };

        let trees = cache.get_or_create("cbp_trees", CacheConfig::parse_trees());
        let patterns = cache.get_or_create("patterns", CacheConfig::compiled_patterns());

        Self {
            permissions: Permissions::with_admins(config.admins.clone()),
            config: Arc::new(config),
            store: services.store,
            rates: services.rates,
            dedup,
            sender: services.sender,
            notifier: services.notifier,
            twitch: services.twitch,
            builtins: Arc::new(Builtins::new()),
            repeats,
            trees,
            patterns,
        }
    }

    /// Parse a command body, reusing the cached tree for identical source.
    ///
    /// Malformed bodies are not cached.
    pub fn parse_body(&self, body: &str) -> Result<Arc<Vec<Node>>, ParseError> {
        if let Some(tree) = self.trees.get(&body.to_string()) {
            return Ok(tree);
        }
        let tree = Arc::new(cbp::parse(body)?);
        self.trees.insert(body.to_string(), tree.clone());
        Ok(tree)
    }

    /// Compile a regular expression through the shared pattern cache.
    pub fn pattern(&self, source: &str) -> Result<Regex, regex::Error> {
        if let Some(re) = self.patterns.get(&source.to_string()) {
            return Ok(re);
        }
        let re = Regex::new(source)?;
        self.patterns.insert(source.to_string(), re.clone());
        Ok(re)
    }

    pub fn rates_for(&self, channel: &str) -> ChannelRates {
        ChannelRates::new(self.rates.clone(), channel)
    }
}

/// Handle one inbound message end to end.
///
/// Errors are collaborator failures; the transaction has been rolled back.
pub async fn handle_message(state: &AppState, msg: ChatMessage) -> Result<()> {
    if !msg.is_processable() {
        debug!("Dropping message without id or room");
        return Ok(());
    }

    if msg.user.eq_ignore_ascii_case(&state.config.bot_name) {
        return Ok(());
    }

    let Some(room) = msg.room_twitch_id() else {
        warn!("Dropping message {} with malformed room id '{}'", msg.id, msg.room_id);
        return Ok(());
    };

    if state.dedup.check_and_mark(&msg.id).await? {
        debug!("Duplicate message {}", msg.id);
        return Ok(());
    }

    let mut tx = state.store.begin().await?;
    let channel = tx
        .channel_by_twitch_id(room)
        .await
        .with_context(|| format!("loading channel {}", room))?;

    // The channel row lock orders every message and firing in one room
    let channel = match channel {
        Some(c) if c.active => tx.channel_for_update(c.id).await?,
        _ => None,
    };
    let channel = match channel {
        Some(c) if c.active => c,
        _ => {
            // Only the bot's own room answers without a channel row
            if !msg.channel.eq_ignore_ascii_case(&state.config.bot_name) {
                return tx.rollback().await;
            }
            let mut home = Channel::new(room, &msg.channel, &state.config.bot_name);
            home.prefix = state.config.default_prefix.clone();
            let mut session = Session::new(state.clone(), tx, home, &msg);
            let result = plugins::admin::handle_home_channel(&mut session).await;
            return session.finish(result).await;
        }
    };

    let mut session = Session::new(state.clone(), tx, channel, &msg);
    let result = process(&mut session).await;
    session.finish(result).await
}

/// Steps that run inside the message transaction.
async fn process(s: &mut Session) -> CommandResult {
    s.channel.message_count += 1;
    s.save_channel().await?;

    if s
        .state
        .permissions
        .is_ignored(s.actor.level, &s.actor.name, &s.channel)
    {
        debug!("Ignoring {} in {}", s.actor.name, s.channel.name);
        return Ok(());
    }

    if s.channel.filters_enabled() && events::filters::run(s).await? {
        return Ok(());
    }

    if !s.user_is(s.channel.mode) {
        debug!(
            "{} is below the {} mode of {}",
            s.actor.name, s.channel.mode, s.channel.name
        );
        return Ok(());
    }

    let text = s.text.clone();
    if try_command(s, &text).await? {
        return Ok(());
    }

    events::autoreply::run(s).await
}

/// Resolve and run a command. Returns `false` when `text` is not a command.
async fn try_command(s: &mut Session, text: &str) -> CommandResult<bool> {
    let Some(rest) = text.trim_start().strip_prefix(s.channel.prefix.as_str()) else {
        return Ok(false);
    };

    let (name, args) = split_first(rest);
    if name.is_empty() || rest.starts_with(char::is_whitespace) {
        return Ok(false);
    }
    let name = name.to_lowercase();

    if let Some(builtin) = s.state.builtins.get(&name).copied() {
        s.require(builtin.min_level)?;
        if !builtin.skip_cooldown {
            s.try_cooldown().await?;
        }
        builtin.run(s, &name, args).await?;
        return Ok(true);
    }

    run_custom(s, &name, args).await
}

/// Run the stored command or list called `name`.
///
/// Returns `false` when the channel has no such command.
pub async fn run_custom(s: &mut Session, name: &str, args: &str) -> CommandResult<bool> {
    let channel_id = s.channel.id;
    let Some(info) = s.tx().command_info_for_update(channel_id, name).await? else {
        return Ok(false);
    };
    if info.target.is_none() {
        return Ok(false);
    }

    s.require(info.access_level)?;
    s.try_cooldown().await?;
    run_stored(s, info, args).await?;
    Ok(true)
}

/// Run a resolved command, skipping level and cooldown checks.
pub async fn run_stored(s: &mut Session, mut info: CommandInfo, args: &str) -> CommandResult {
    match info.target {
        Some(CommandTarget::Custom(id)) => {
            let body = s
                .tx()
                .custom_command(id)
                .await?
                .with_context(|| format!("command {} has no body {}", info.name, id))?;

            // Offline channels skip live-only commands before anything changes
            let tree = s.parse_body(&body.message)?;
            if body_requires_live(&tree) {
                let twitch = s.state.twitch.clone();
                if twitch.current_stream(s.channel.twitch_id).await?.is_none() {
                    debug!("{} is live-only and {} is offline", info.name, s.channel.name);
                    return Err(CommandError::Silent);
                }
            }

            info.mark_used();
            s.tx().update_command_info(&info).await?;

            let reply = s.evaluate(&body.message, args, Some(&info)).await?;
            if !reply.trim().is_empty() {
                s.reply(reply);
            }
            Ok(())
        }
        Some(CommandTarget::List(_)) => {
            if plugins::list::invoke(s, &info, args).await? {
                info.mark_used();
                s.tx().update_command_info(&info).await?;
            }
            Ok(())
        }
        None => Ok(()),
    }
}

#[async_trait]
impl Firer for AppState {
    async fn fire(&self, key: RepeatKey) -> Result<()> {
        let mut tx = self.store.begin().await?;

        let channel_id = match key {
            RepeatKey::Repeat(id) => tx.repeated_command(id).await?.map(|r| r.channel_id),
            RepeatKey::Schedule(id) => tx.scheduled_command(id).await?.map(|sc| sc.channel_id),
        };
        let Some(channel_id) = channel_id else {
            return tx.rollback().await;
        };

        // Channel row first, like message handling
        let Some(channel) = tx.channel_for_update(channel_id).await? else {
            return tx.rollback().await;
        };
        if !channel.active {
            return tx.rollback().await;
        }

        // Re-check under lock; the record may have been edited since it was armed
        let (info_id, message_diff, last_count, guard_ttl) = match key {
            RepeatKey::Repeat(id) => {
                let Some(r) = tx.repeated_command_for_update(id).await? else {
                    return tx.rollback().await;
                };
                if !r.enabled || r.channel_id != channel.id {
                    return tx.rollback().await;
                }
                let ttl = Duration::from_secs((r.delay - 1).max(1) as u64);
                (r.command_info_id, r.message_diff, r.last_count, ttl)
            }
            RepeatKey::Schedule(id) => {
                let Some(sc) = tx.scheduled_command_for_update(id).await? else {
                    return tx.rollback().await;
                };
                if !sc.enabled || sc.channel_id != channel.id {
                    return tx.rollback().await;
                }
                let ttl = Duration::from_secs(59);
                (sc.command_info_id, sc.message_diff, sc.last_count, ttl)
            }
        };

        if channel.message_count - last_count < message_diff {
            debug!(
                "{:?} in {} waiting for messages ({} of {})",
                key,
                channel.name,
                channel.message_count - last_count,
                message_diff
            );
            return tx.rollback().await;
        }

        let rates = self.rates_for(&channel.name);
        if rates.repeat_guard(key.kind(), key.id(), guard_ttl).await? {
            debug!("{:?} in {} already fired", key, channel.name);
            return tx.rollback().await;
        }

        match key {
            RepeatKey::Repeat(id) => {
                if let Some(mut r) = tx.repeated_command_for_update(id).await? {
                    r.last_count = channel.message_count;
                    tx.update_repeated_command(&r).await?;
                }
            }
            RepeatKey::Schedule(id) => {
                if let Some(mut sc) = tx.scheduled_command_for_update(id).await? {
                    sc.last_count = channel.message_count;
                    tx.update_scheduled_command(&sc).await?;
                }
            }
        }

        let Some(info) = tx.command_info_by_id(info_id).await? else {
            warn!("{:?} points at missing command {}", key, info_id);
            return tx.rollback().await;
        };

        info!("Firing {:?} ({}) in {}", key, info.name, channel.name);
        let label = format!("{}-{}", key.kind(), key.id());
        let mut session = Session::autonomous(self.clone(), tx, channel, label);
        let result = run_stored(&mut session, info, "").await;
        session.finish(result).await
    }
}
