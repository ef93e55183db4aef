//! Repeat and schedule management.
//!
//! Records are written in the message transaction and pushed to the
//! scheduler straight away; a firing re-checks the record under lock, so a
//! rolled back edit only costs a no-op firing.

use tracing::info;

use crate::bot::{CommandResult, Session};
use crate::database::{CommandInfo, MIN_REPEAT_DELAY_SECS, RepeatedCommand, ScheduledCommand};
use crate::repeat::{CronSchedule, RepeatKey};
use crate::utils::{format_duration, parse_duration, split_first, split_subcommand};

/// Parse the optional message difference argument (default 1).
fn message_diff(arg: &str) -> Option<i64> {
    if arg.is_empty() {
        return Some(1);
    }
    arg.parse::<i64>().ok().filter(|n| *n >= 1)
}

/// Load a custom command or list that the user may run, replying otherwise.
async fn target(s: &mut Session, name: &str) -> CommandResult<Option<CommandInfo>> {
    let channel_id = s.channel.id;
    match s.tx().command_info(channel_id, name).await? {
        Some(info) if info.target.is_some() => {
            s.require(info.access_level)?;
            Ok(Some(info))
        }
        _ => {
            s.reply(format!("Command {} does not exist.", name));
            Ok(None)
        }
    }
}

/// Handle !repeat.
pub async fn repeat(s: &mut Session, args: &str) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let (name, rest) = split_first(rest);
    let name = name.to_lowercase();

    if sub == "list" {
        return list_repeats(s).await;
    }
    if name.is_empty() {
        s.reply("Usage: repeat add|delete|on|off|list <name> [delay] [message difference]");
        return Ok(());
    }

    let Some(info) = target(s, &name).await? else {
        return Ok(());
    };
    let existing = s.tx().repeated_command_by_info(info.id).await?;

    match sub.as_str() {
        "add" => {
            let (delay, diff) = split_first(rest);
            let Some(delay) = parse_duration(delay) else {
                s.reply("Usage: repeat add <name> <delay> [message difference]");
                return Ok(());
            };
            let delay = delay.as_secs() as i64;
            if delay < MIN_REPEAT_DELAY_SECS {
                s.reply(format!("Delay must be at least {} seconds.", MIN_REPEAT_DELAY_SECS));
                return Ok(());
            }
            let Some(diff) = message_diff(diff) else {
                s.reply("Message difference must be a positive number.");
                return Ok(());
            };

            let record = match existing {
                Some(r) => {
                    let Some(mut r) = s.tx().repeated_command_for_update(r.id).await? else {
                        return Ok(());
                    };
                    r.enabled = true;
                    r.delay = delay;
                    r.message_diff = diff;
                    r.init_timestamp = Some(chrono::Utc::now());
                    r.editor = s.actor.name.clone();
                    r.updated_at = chrono::Utc::now();
                    s.tx().update_repeated_command(&r).await?;
                    r
                }
                None => {
                    let channel_id = s.channel.id;
                    let r = RepeatedCommand::new(channel_id, info.id, delay, diff, &s.actor.name);
                    s.tx().insert_repeated_command(r).await?
                }
            };

            s.state.repeats.upsert_repeat(&record);
            info!("Repeat {} ({}) armed in {}", record.id, name, s.channel.name);

            let reply = format!(
                "Command {} will repeat every {} ({} message difference).",
                name,
                format_duration(delay as u64),
                diff
            );
            s.reply(reply);
        }
        "delete" | "remove" => {
            let Some(r) = existing else {
                s.reply(format!("{} does not repeat.", name));
                return Ok(());
            };
            s.tx().delete_repeated_command(r.id).await?;
            s.state.repeats.remove(RepeatKey::Repeat(r.id));
            s.reply(format!("Command {} will no longer repeat.", name));
        }
        "on" | "off" => {
            let Some(r) = existing else {
                s.reply(format!("{} does not repeat.", name));
                return Ok(());
            };
            let Some(mut r) = s.tx().repeated_command_for_update(r.id).await? else {
                return Ok(());
            };
            r.enabled = sub == "on";
            r.editor = s.actor.name.clone();
            r.updated_at = chrono::Utc::now();
            s.tx().update_repeated_command(&r).await?;
            s.state.repeats.upsert_repeat(&r);

            let state = if r.enabled { "enabled" } else { "disabled" };
            s.reply(format!("Repeat {} {}.", name, state));
        }
        _ => s.reply("Usage: repeat add|delete|on|off|list <name> [delay] [message difference]"),
    }
    Ok(())
}

async fn list_repeats(s: &mut Session) -> CommandResult {
    let channel_id = s.channel.id;
    let repeats = s.tx().repeated_commands(channel_id).await?;

    let mut items = Vec::with_capacity(repeats.len());
    for r in repeats {
        let Some(info) = s.tx().command_info_by_id(r.command_info_id).await? else {
            continue;
        };
        let off = if r.enabled { "" } else { ", off" };
        items.push(format!("{} ({}s{})", info.name, r.delay, off));
    }

    if items.is_empty() {
        s.reply("There are no repeats.");
    } else {
        items.sort();
        s.reply(format!("Repeats: {}", items.join(", ")));
    }
    Ok(())
}

/// Handle !schedule. Cron fields are joined with `_` so the expression is one argument.
pub async fn schedule(s: &mut Session, args: &str) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let (name, rest) = split_first(rest);
    let name = name.to_lowercase();

    if sub == "list" {
        return list_schedules(s).await;
    }
    if name.is_empty() {
        s.reply("Usage: schedule add|delete|on|off|list <name> [cron_expression] [message difference]");
        return Ok(());
    }

    let Some(info) = target(s, &name).await? else {
        return Ok(());
    };
    let existing = s.tx().scheduled_command_by_info(info.id).await?;

    match sub.as_str() {
        "add" => {
            let (expr, diff) = split_first(rest);
            let expr = expr.replace('_', " ");
            if expr.is_empty() {
                s.reply("Usage: schedule add <name> <cron_expression> [message difference]");
                return Ok(());
            }
            let cron: CronSchedule = match expr.parse() {
                Ok(cron) => cron,
                Err(e) => {
                    s.reply(format!("Bad cron expression: {}.", e));
                    return Ok(());
                }
            };
            let Some(diff) = message_diff(diff) else {
                s.reply("Message difference must be a positive number.");
                return Ok(());
            };

            let record = match existing {
                Some(sc) => {
                    let Some(mut sc) = s.tx().scheduled_command_for_update(sc.id).await? else {
                        return Ok(());
                    };
                    sc.enabled = true;
                    sc.cron_expression = cron.to_string();
                    sc.message_diff = diff;
                    sc.editor = s.actor.name.clone();
                    sc.updated_at = chrono::Utc::now();
                    s.tx().update_scheduled_command(&sc).await?;
                    sc
                }
                None => {
                    let channel_id = s.channel.id;
                    let sc = ScheduledCommand::new(channel_id, info.id, &cron.to_string(), diff, &s.actor.name);
                    s.tx().insert_scheduled_command(sc).await?
                }
            };

            s.state.repeats.upsert_schedule(&record).map_err(anyhow::Error::from)?;
            info!("Schedule {} ({}) armed in {}", record.id, name, s.channel.name);

            let reply = format!(
                "Command {} scheduled at '{}' ({} message difference).",
                name, cron, diff
            );
            s.reply(reply);
        }
        "delete" | "remove" => {
            let Some(sc) = existing else {
                s.reply(format!("{} is not scheduled.", name));
                return Ok(());
            };
            s.tx().delete_scheduled_command(sc.id).await?;
            s.state.repeats.remove(RepeatKey::Schedule(sc.id));
            s.reply(format!("Command {} is no longer scheduled.", name));
        }
        "on" | "off" => {
            let Some(sc) = existing else {
                s.reply(format!("{} is not scheduled.", name));
                return Ok(());
            };
            let Some(mut sc) = s.tx().scheduled_command_for_update(sc.id).await? else {
                return Ok(());
            };
            sc.enabled = sub == "on";
            sc.editor = s.actor.name.clone();
            sc.updated_at = chrono::Utc::now();
            s.tx().update_scheduled_command(&sc).await?;
            s.state.repeats.upsert_schedule(&sc).map_err(anyhow::Error::from)?;

            let state = if sc.enabled { "enabled" } else { "disabled" };
            s.reply(format!("Schedule {} {}.", name, state));
        }
        _ => s.reply("Usage: schedule add|delete|on|off|list <name> [cron_expression] [message difference]"),
    }
    Ok(())
}

async fn list_schedules(s: &mut Session) -> CommandResult {
    let channel_id = s.channel.id;
    let schedules = s.tx().scheduled_commands(channel_id).await?;

    let mut items = Vec::with_capacity(schedules.len());
    for sc in schedules {
        let Some(info) = s.tx().command_info_by_id(sc.command_info_id).await? else {
            continue;
        };
        let off = if sc.enabled { "" } else { ", off" };
        items.push(format!("{} ({}{})", info.name, sc.cron_expression, off));
    }

    if items.is_empty() {
        s.reply("There are no schedules.");
    } else {
        items.sort();
        s.reply(format!("Schedules: {}", items.join(", ")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::testing::Harness;
    use crate::permissions::AccessLevel;

    #[test]
    fn diff_argument() {
        assert_eq!(message_diff(""), Some(1));
        assert_eq!(message_diff("5"), Some(5));
        assert_eq!(message_diff("0"), None);
        assert_eq!(message_diff("x"), None);
    }

    #[tokio::test]
    async fn repeat_lifecycle() {
        let h = Harness::new().await;
        let ch = h.channel("alpha", 100).await;
        h.send_as(&ch, "mia", AccessLevel::Moderator, "!command add hype HYPE").await;

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!repeat add hype 10").await;
        assert_eq!(out, vec!["[quill] Delay must be at least 30 seconds."]);

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!repeat add hype 5m 3").await;
        assert_eq!(
            out,
            vec!["[quill] Command hype will repeat every 5 minutes (3 message difference)."]
        );

        h.send_as(&ch, "mia", AccessLevel::Moderator, "!repeat off hype").await;
        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!repeat list").await;
        assert_eq!(out, vec!["[quill] Repeats: hype (300s, off)"]);

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!repeat add nothing 60").await;
        assert_eq!(out, vec!["[quill] Command nothing does not exist."]);
    }

    #[tokio::test]
    async fn schedule_validates_cron() {
        let h = Harness::new().await;
        let ch = h.channel("alpha", 100).await;
        h.send_as(&ch, "mia", AccessLevel::Moderator, "!command add hype HYPE").await;

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!schedule add hype 61_*_*_*_*").await;
        assert!(out[0].starts_with("[quill] Bad cron expression"));

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!schedule add hype */15_*_*_*_*").await;
        assert_eq!(
            out,
            vec!["[quill] Command hype scheduled at '*/15 * * * *' (1 message difference)."]
        );

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!schedule list").await;
        assert_eq!(out, vec!["[quill] Schedules: hype (*/15 * * * *)"]);
    }
}
