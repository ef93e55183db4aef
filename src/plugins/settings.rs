//! Channel settings.
//!
//! `!set <key> [value]` shows a setting when no value is given, otherwise
//! validates and stores it. `reset` restores the default where one exists.

use crate::bot::{CommandResult, Session};
use crate::permissions::AccessLevel;
use crate::utils::{format_duration, parse_duration, parse_toggle, split_first, split_subcommand};

const USAGE: &str = "Usage: set prefix|bullet|cooldown|shouldmoderate|mode|roll [value]";

/// Handle !set.
pub async fn set(s: &mut Session, args: &str) -> CommandResult {
    let (key, value) = split_subcommand(args);

    match key.as_str() {
        "prefix" => prefix(s, value).await,
        "bullet" => bullet(s, value).await,
        "cooldown" => cooldown(s, value).await,
        "shouldmoderate" | "moderate" => should_moderate(s, value).await,
        "mode" => mode(s, value).await,
        "roll" => roll(s, value).await,
        _ => {
            s.reply(USAGE);
            Ok(())
        }
    }
}

async fn prefix(s: &mut Session, value: &str) -> CommandResult {
    let (value, _) = split_first(value);

    match value {
        "" => {
            let reply = format!("Prefix is {}", s.channel.prefix);
            s.reply(reply);
            return Ok(());
        }
        "reset" => s.channel.prefix = s.state.config.default_prefix.clone(),
        // A prefix starting with `/` or `.` would collide with chat commands
        v if v.starts_with('/') || v.starts_with('.') => {
            s.reply(format!("Prefix may not start with {}.", &v[..1]));
            return Ok(());
        }
        v => s.channel.prefix = v.to_string(),
    }

    s.save_channel().await?;
    let reply = format!("Prefix changed to {}", s.channel.prefix);
    s.reply(reply);
    Ok(())
}

async fn bullet(s: &mut Session, value: &str) -> CommandResult {
    match value {
        "" => {
            let reply = format!("Bullet is {}", s.bullet());
            s.reply(reply);
            return Ok(());
        }
        "reset" => s.channel.bullet = None,
        v if v.starts_with('/') || v.starts_with('.') => {
            s.reply(format!("Bullet may not start with {}.", &v[..1]));
            return Ok(());
        }
        v => s.channel.bullet = Some(v.to_string()),
    }

    s.save_channel().await?;
    let reply = format!("Bullet changed to {}", s.bullet());
    s.reply(reply);
    Ok(())
}

async fn cooldown(s: &mut Session, value: &str) -> CommandResult {
    match value {
        "" => {
            let secs = match s.channel.cooldown {
                Some(secs) => secs.max(0) as u64,
                None => s.state.config.default_cooldown.as_secs(),
            };
            s.reply(format!("Cooldown is {}.", format_duration(secs)));
            return Ok(());
        }
        "reset" => s.channel.cooldown = None,
        v => match parse_duration(v) {
            Some(d) => s.channel.cooldown = Some(d.as_secs() as i64),
            None => {
                s.reply(format!("{} is not a valid duration.", v));
                return Ok(());
            }
        },
    }

    s.save_channel().await?;
    let secs = match s.channel.cooldown {
        Some(secs) => secs.max(0) as u64,
        None => s.state.config.default_cooldown.as_secs(),
    };
    s.reply(format!("Cooldown changed to {}.", format_duration(secs)));
    Ok(())
}

async fn should_moderate(s: &mut Session, value: &str) -> CommandResult {
    if value.is_empty() {
        let reply = format!("shouldModerate is {}.", on_off(s.channel.should_moderate));
        s.reply(reply);
        return Ok(());
    }
    let Some(on) = parse_toggle(value) else {
        s.reply("Usage: set shouldmoderate on|off");
        return Ok(());
    };

    s.channel.should_moderate = on;
    s.save_channel().await?;
    s.reply(format!("shouldModerate changed to {}.", on_off(on)));
    Ok(())
}

/// Who may run commands at all.
async fn mode(s: &mut Session, value: &str) -> CommandResult {
    if value.is_empty() {
        let reply = format!("Mode is {}.", s.channel.mode.describe());
        s.reply(reply);
        return Ok(());
    }

    let level = match value.to_lowercase().as_str() {
        "reset" => AccessLevel::Everyone,
        v => match AccessLevel::parse_user_input(v) {
            Some(AccessLevel::Admin) | None => {
                s.reply(format!("Unknown mode {}.", value));
                return Ok(());
            }
            Some(level) => level,
        },
    };

    // Nobody can lock themselves out
    if !s.user_is(level) {
        let reply = format!("Your level is {}; you cannot set the mode to {}.", s.user_level(), level);
        s.reply(reply);
        return Ok(());
    }

    s.channel.mode = level;
    s.save_channel().await?;
    s.reply(format!("Mode changed to {}.", level.describe()));
    Ok(())
}

async fn roll(s: &mut Session, value: &str) -> CommandResult {
    let (key, value) = split_subcommand(value);

    match key.as_str() {
        "" => {
            let reply = format!(
                "Roll: default {}, cooldown {}s, level {}.",
                s.channel.roll_default, s.channel.roll_cooldown, s.channel.roll_level
            );
            s.reply(reply);
            return Ok(());
        }
        "default" => match value.parse::<i64>() {
            Ok(n) if n >= 1 => s.channel.roll_default = n,
            _ => {
                s.reply("Roll default must be a positive number.");
                return Ok(());
            }
        },
        "cooldown" => match parse_duration(value) {
            Some(d) => s.channel.roll_cooldown = d.as_secs() as i64,
            None => {
                s.reply(format!("{} is not a valid duration.", value));
                return Ok(());
            }
        },
        "userlevel" | "level" => match AccessLevel::parse_user_input(value) {
            Some(level) if level != AccessLevel::Admin => s.channel.roll_level = level,
            _ => {
                s.reply(format!("Unknown level {}.", value));
                return Ok(());
            }
        },
        _ => {
            s.reply("Usage: set roll default|cooldown|userlevel <value>");
            return Ok(());
        }
    }

    s.save_channel().await?;
    s.reply(format!("Roll {} changed.", key));
    Ok(())
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

#[cfg(test)]
mod tests {
    use crate::bot::testing::Harness;
    use crate::permissions::AccessLevel;

    #[tokio::test]
    async fn prefix_and_bullet_apply_to_later_messages() {
        let h = Harness::new().await;
        let ch = h.channel("alpha", 100).await;

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!set prefix +").await;
        assert_eq!(out, vec!["[quill] Prefix changed to +"]);

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "+set bullet >>").await;
        assert_eq!(out, vec![">> Bullet changed to >>"]);

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "+set bullet /me").await;
        assert_eq!(out, vec![">> Bullet may not start with /."]);

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!set prefix").await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn mode_blocks_lower_levels() {
        let h = Harness::new().await;
        let ch = h.channel("alpha", 100).await;
        h.send_as(&ch, "mia", AccessLevel::Moderator, "!command adde hi hello").await;

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!set mode owner").await;
        assert!(out[0].contains("cannot set the mode"));

        h.send_as(&ch, "mia", AccessLevel::Moderator, "!set mode subs").await;
        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "!hi").await;
        assert!(out.is_empty());
        let out = h.send_as(&ch, "sam", AccessLevel::Subscriber, "!hi").await;
        assert_eq!(out, vec!["[quill] hello"]);
    }
}
