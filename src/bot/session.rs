//! Per-message execution context.
//!
//! A session bundles the open transaction, the channel row, the acting user
//! and the shared services. Replies are buffered and only reach the sender
//! once handling succeeded; [`Session::finish`] flushes them and commits.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error};

use crate::cbp::{Node, walk};
use crate::database::{Channel, CommandInfo, Transaction};
use crate::permissions::AccessLevel;
use crate::ratelimit::ChannelRates;
use crate::utils::format_reply;

use super::actions::Evaluator;
use super::dispatcher::AppState;
use super::error::{CommandError, CommandResult};
use super::message::ChatMessage;

/// Who triggered the session.
#[derive(Debug, Clone)]
pub struct Actor {
    pub name: String,
    pub display: String,
    pub twitch_id: String,
    pub level: AccessLevel,
}

pub struct Session {
    pub state: AppState,
    tx: Box<dyn Transaction>,
    pub channel: Channel,
    pub actor: Actor,
    pub rates: ChannelRates,

    /// Message ID, or a synthetic label for autonomous sessions
    pub id: String,

    /// Full text of the triggering message
    pub text: String,
    pub is_action: bool,

    outbox: Vec<String>,
    notify: Vec<String>,
}

impl Session {
    /// Session for an inbound chat message.
    pub fn new(state: AppState, tx: Box<dyn Transaction>, channel: Channel, msg: &ChatMessage) -> Self {
        let level = state.permissions.user_level(msg, Some(&channel));
        let rates = ChannelRates::new(state.rates.clone(), &channel.name);
        Self {
            actor: Actor {
                name: msg.user.to_lowercase(),
                display: msg.display().to_string(),
                twitch_id: msg.user_id.clone(),
                level,
            },
            id: msg.id.clone(),
            text: msg.text.clone(),
            is_action: msg.is_action,
            state,
            tx,
            channel,
            rates,
            outbox: Vec::new(),
            notify: Vec::new(),
        }
    }

    /// Session acting as the broadcaster, used by repeats and schedules.
    pub fn autonomous(state: AppState, tx: Box<dyn Transaction>, channel: Channel, label: String) -> Self {
        let rates = ChannelRates::new(state.rates.clone(), &channel.name);
        Self {
            actor: Actor {
                name: channel.bot_name.clone(),
                display: channel.bot_name.clone(),
                twitch_id: String::new(),
                level: AccessLevel::Broadcaster,
            },
            id: label,
            text: String::new(),
            is_action: false,
            state,
            tx,
            channel,
            rates,
            outbox: Vec::new(),
            notify: Vec::new(),
        }
    }

    pub fn tx(&mut self) -> &mut dyn Transaction {
        self.tx.as_mut()
    }

    pub fn bullet(&self) -> &str {
        self.channel
            .bullet
            .as_deref()
            .unwrap_or(&self.state.config.default_bullet)
    }

    /// Queue a reply, prefixed with the channel bullet.
    pub fn reply(&mut self, text: impl AsRef<str>) {
        let line = format_reply(self.bullet(), text.as_ref());
        self.outbox.push(line);
    }

    /// Queue a line verbatim (moderation pseudo-commands).
    pub fn send_raw(&mut self, text: impl Into<String>) {
        self.outbox.push(text.into());
    }

    /// Ask the transport to refresh its subscriptions for `bot_name` after commit.
    pub fn notify_updates(&mut self, bot_name: &str) {
        if !self.notify.iter().any(|b| b == bot_name) {
            self.notify.push(bot_name.to_string());
        }
    }

    // Access

    pub fn user_level(&self) -> AccessLevel {
        self.actor.level
    }

    pub fn user_is(&self, level: AccessLevel) -> bool {
        self.actor.level.can_access(level)
    }

    /// Fail with [`CommandError::NotAuthorized`] below `level`.
    pub fn require(&self, level: AccessLevel) -> CommandResult {
        if self.user_is(level) {
            Ok(())
        } else {
            debug!(
                "User {} ({}) lacks {} in {}",
                self.actor.name, self.actor.level, level, self.channel.name
            );
            Err(CommandError::NotAuthorized)
        }
    }

    /// Shared per-channel command cooldown. Moderators and above are exempt.
    pub async fn try_cooldown(&mut self) -> CommandResult {
        if self.user_is(AccessLevel::Moderator) {
            return Ok(());
        }

        let secs = match self.channel.cooldown {
            Some(secs) => std::time::Duration::from_secs(secs.max(0) as u64),
            None => self.state.config.default_cooldown,
        };
        if secs.is_zero() {
            return Ok(());
        }

        if self.rates.command_cooldown(secs).await? {
            debug!("Channel {} is cooling down", self.channel.name);
            return Err(CommandError::Silent);
        }
        Ok(())
    }

    pub async fn save_channel(&mut self) -> Result<()> {
        self.channel.updated_at = chrono::Utc::now();
        let channel = self.channel.clone();
        self.tx.update_channel(&channel).await
    }

    /// Parse `body` through the shared tree cache.
    pub fn parse_body(&self, body: &str) -> CommandResult<Arc<Vec<Node>>> {
        Ok(self.state.parse_body(body)?)
    }

    /// Evaluate a command body against this session.
    ///
    /// `info` is the command being run, if any; it backs `COUNT`.
    pub async fn evaluate(
        &mut self,
        body: &str,
        args: &str,
        info: Option<&CommandInfo>,
    ) -> CommandResult<String> {
        let nodes = self.parse_body(body)?;
        let mut evaluator = Evaluator::new(self, args, info.map(|i| i.count));
        walk(&nodes, &mut evaluator).await
    }

    // Moderation pseudo-commands

    pub fn ban(&mut self, user: &str) {
        self.send_raw(format!("/ban {}", user));
    }

    pub fn unban(&mut self, user: &str) {
        self.send_raw(format!("/unban {}", user));
    }

    pub fn timeout(&mut self, user: &str, secs: i64) {
        self.send_raw(format!("/timeout {} {}", user, secs));
    }

    pub fn untimeout(&mut self, user: &str) {
        self.send_raw(format!("/untimeout {}", user));
    }

    /// Purge is a one-second timeout.
    pub fn purge(&mut self, user: &str) {
        self.timeout(user, 1);
    }

    pub fn delete_message(&mut self, id: &str) {
        self.send_raw(format!("/delete {}", id));
    }

    /// Finish the session.
    ///
    /// On success (or a quiet stop) queued lines are sent and the transaction
    /// commits. A halted body rolls back quietly; any other error discards the
    /// queue, rolls back and is returned.
    pub async fn finish(self, result: CommandResult) -> Result<()> {
        let Session {
            state,
            tx,
            channel,
            id,
            mut outbox,
            notify,
            ..
        } = self;

        match result {
            Ok(()) => {}
            Err(CommandError::Halted(reason)) => {
                debug!("Message {} in {} halted: {}", id, channel.name, reason);
                return tx.rollback().await;
            }
            Err(e) if e.is_quiet() => {
                debug!("Message {} in {} stopped: {}", id, channel.name, e);
                outbox.clear();
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    error!("Rollback failed for message {}: {:#}", id, rb);
                }
                return Err(anyhow::Error::from(e)
                    .context(format!("message {} in channel {}", id, channel.name)));
            }
        }

        let target = channel.irc_target();
        for line in &outbox {
            state
                .sender
                .send_message(&channel.bot_name, &target, line)
                .await?;
        }

        tx.commit().await?;

        for bot in notify {
            if let Err(e) = state.notifier.notify_channel_updates(&bot).await {
                error!("Failed to notify channel updates for {}: {:#}", bot, e);
            }
        }
        Ok(())
    }
}
