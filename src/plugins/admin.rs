//! Joining, leaving and channel administration.
//!
//! In the bot's own room `join` and `leave` act on the sender's channel,
//! which is how broadcasters sign up without an admin. Elsewhere they need
//! an explicit channel name and an admin, except that a broadcaster may
//! always make the bot leave their own room.

use tracing::info;

use crate::bot::{CommandResult, Session};
use crate::database::Channel;
use crate::permissions::AccessLevel;
use crate::utils::{clean_username, split_first, split_subcommand};

/// Handle `!join`, `!leave` or `!part` (also with a `+` prefix) in the bot's
/// room before it has a channel row.
pub async fn handle_home_channel(s: &mut Session) -> CommandResult {
    let text = s.text.trim().to_string();
    let Some(rest) = text.strip_prefix('!').or_else(|| text.strip_prefix('+')) else {
        return Ok(());
    };

    let (name, args) = split_first(rest);
    match name.to_lowercase().as_str() {
        "join" => join(s, args).await,
        "leave" | "part" => leave(s, args).await,
        _ => Ok(()),
    }
}

fn in_home_channel(s: &Session) -> bool {
    s.channel.name.eq_ignore_ascii_case(&s.state.config.bot_name)
}

/// Handle !join.
pub async fn join(s: &mut Session, args: &str) -> CommandResult {
    let (target, _) = split_first(args);
    let target = clean_username(target);

    if !target.is_empty() {
        s.require(AccessLevel::Admin)?;
        let Some(twitch_id) = s.state.twitch.user_id_by_name(&target).await? else {
            s.reply(format!("User {} does not exist.", target));
            return Ok(());
        };
        return join_channel(s, twitch_id, &target).await;
    }

    if !in_home_channel(s) {
        return Ok(());
    }

    let Ok(twitch_id) = s.actor.twitch_id.parse::<i64>() else {
        return Ok(());
    };
    let name = s.actor.name.clone();
    join_channel(s, twitch_id, &name).await
}

async fn join_channel(s: &mut Session, twitch_id: i64, name: &str) -> CommandResult {
    let bot = s.state.config.bot_name.clone();

    match s.tx().channel_by_twitch_id(twitch_id).await? {
        Some(c) if c.active => {
            s.reply(format!("I'm already in #{}.", c.name));
            return Ok(());
        }
        Some(c) => {
            let Some(mut c) = s.tx().channel_for_update(c.id).await? else {
                return Ok(());
            };
            c.active = true;
            c.name = name.to_lowercase();
            c.bot_name = bot.clone();
            c.updated_at = chrono::Utc::now();
            s.tx().update_channel(&c).await?;
        }
        None => {
            let mut c = Channel::new(twitch_id, name, &bot);
            c.prefix = s.state.config.default_prefix.clone();
            s.tx().insert_channel(c).await?;
        }
    }

    info!("Joined channel {} ({})", name, twitch_id);
    s.notify_updates(&bot);
    s.reply(format!("Joined #{}.", name));
    Ok(())
}

/// Handle !leave and !part.
pub async fn leave(s: &mut Session, args: &str) -> CommandResult {
    let (target, _) = split_first(args);
    let target = clean_username(target);

    let channel = if !target.is_empty() {
        s.require(AccessLevel::Admin)?;
        s.tx().channel_by_name(&target).await?
    } else if in_home_channel(s) {
        let Ok(twitch_id) = s.actor.twitch_id.parse::<i64>() else {
            return Ok(());
        };
        s.tx().channel_by_twitch_id(twitch_id).await?
    } else {
        s.require(AccessLevel::Broadcaster)?;
        Some(s.channel.clone())
    };

    match channel {
        Some(c) if c.active => deactivate(s, c).await,
        Some(c) => {
            s.reply(format!("I'm not in #{}.", c.name));
            Ok(())
        }
        None => {
            let name = if target.is_empty() { s.actor.name.clone() } else { target };
            s.reply(format!("I'm not in #{}.", name));
            Ok(())
        }
    }
}

/// Mark a channel inactive. Its data is kept.
async fn deactivate(s: &mut Session, channel: Channel) -> CommandResult {
    if channel.id == s.channel.id {
        s.channel.active = false;
        s.save_channel().await?;
    } else {
        let Some(mut c) = s.tx().channel_for_update(channel.id).await? else {
            return Ok(());
        };
        c.active = false;
        c.updated_at = chrono::Utc::now();
        s.tx().update_channel(&c).await?;
    }

    info!("Left channel {} ({})", channel.name, channel.twitch_id);
    s.notify_updates(&channel.bot_name);
    s.reply(format!("Left #{}.", channel.name));
    Ok(())
}

/// Handle !admin.
pub async fn admin(s: &mut Session, args: &str) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let (target, _) = split_first(rest);
    let target = clean_username(target);

    match sub.as_str() {
        "channels" => {
            let mut names: Vec<String> = s
                .tx()
                .active_channels()
                .await?
                .into_iter()
                .map(|c| c.name)
                .collect();
            names.sort();
            s.reply(format!("Active channels ({}): {}", names.len(), names.join(", ")));
        }
        "activate" if !target.is_empty() => {
            let Some(c) = s.tx().channel_by_name(&target).await? else {
                s.reply(format!("No channel named {}.", target));
                return Ok(());
            };
            if c.active {
                s.reply(format!("#{} is already active.", c.name));
                return Ok(());
            }
            let twitch_id = c.twitch_id;
            let name = c.name.clone();
            join_channel(s, twitch_id, &name).await?;
        }
        "deactivate" if !target.is_empty() => {
            match s.tx().channel_by_name(&target).await? {
                Some(c) if c.active => deactivate(s, c).await?,
                _ => s.reply(format!("#{} is not active.", target)),
            }
        }
        _ => s.reply("Usage: admin channels|activate|deactivate [channel]"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::bot::testing::Harness;
    use crate::permissions::AccessLevel;

    #[tokio::test]
    async fn broadcasters_join_from_the_home_room() {
        let h = Harness::new().await;

        let msg = h.message("quill", 1, "zed", AccessLevel::Everyone, "+join");
        let out = h.send(msg).await;
        assert_eq!(out, vec!["[quill] Joined #zed."]);
        assert_eq!(h.notified(), vec!["quill"]);

        let zed = h.find_channel("zed").await.expect("channel created");
        assert!(zed.active);
        assert_eq!(zed.prefix, "!");

        let msg = h.message("quill", 1, "zed", AccessLevel::Everyone, "!join");
        let out = h.send(msg).await;
        assert_eq!(out, vec!["[quill] I'm already in #zed."]);

        // Other commands are ignored in the home room
        let msg = h.message("quill", 1, "zed", AccessLevel::Everyone, "!commands");
        assert!(h.send(msg).await.is_empty());

        let msg = h.message("quill", 1, "zed", AccessLevel::Everyone, "!part");
        let out = h.send(msg).await;
        assert_eq!(out, vec!["[quill] Left #zed."]);
        assert!(!h.find_channel("zed").await.unwrap().active);
    }

    #[tokio::test]
    async fn leave_requires_the_broadcaster() {
        let h = Harness::new().await;
        let ch = h.channel("alpha", 100).await;

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!leave").await;
        assert!(out.is_empty());

        let out = h.send_as(&ch, "alpha", AccessLevel::Broadcaster, "!leave").await;
        assert_eq!(out, vec!["[quill] Left #alpha."]);

        // Inactive rooms are not served
        let out = h.send_as(&ch, "alpha", AccessLevel::Broadcaster, "!commands").await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn admins_manage_channels_by_name() {
        let h = Harness::new().await;
        let ch = h.channel("alpha", 100).await;
        h.channel("beta", 200).await;
        h.twitch_user("gamma", 300);

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!join gamma").await;
        assert!(out.is_empty());

        let out = h.send_as(&ch, "admin", AccessLevel::Admin, "!join gamma").await;
        assert_eq!(out, vec!["[quill] Joined #gamma."]);

        h.send_as(&ch, "admin", AccessLevel::Admin, "!admin deactivate beta").await;
        let out = h.send_as(&ch, "admin", AccessLevel::Admin, "!admin channels").await;
        assert_eq!(out, vec!["[quill] Active channels (2): alpha, gamma"]);
    }
}
