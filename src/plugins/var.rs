//! Channel variables.

use crate::bot::{CommandResult, Session};
use crate::database::Variable;
use crate::utils::{split_first, split_subcommand};

/// Handle !var.
pub async fn var(s: &mut Session, args: &str) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let (name, value) = split_first(rest);

    if name.is_empty() {
        s.reply("Usage: var get|set|delete|increment|decrement <name> [value]");
        return Ok(());
    }

    let channel_id = s.channel.id;

    match sub.as_str() {
        "get" => match s.tx().variable(channel_id, name).await? {
            Some(v) => s.reply(format!("{} is {}.", name, v.value)),
            None => s.reply(format!("{} is not set.", name)),
        },
        "set" => {
            if value.is_empty() {
                s.reply("Usage: var set <name> <value>");
                return Ok(());
            }
            let var = match s.tx().variable_for_update(channel_id, name).await? {
                Some(mut v) => {
                    v.value = value.to_string();
                    v.updated_at = chrono::Utc::now();
                    v
                }
                None => Variable::new(channel_id, name, value),
            };
            s.tx().upsert_variable(var).await?;
            s.reply(format!("{} set to {}.", name, value));
        }
        "delete" | "remove" => {
            if s.tx().delete_variable(channel_id, name).await? {
                s.reply(format!("{} deleted.", name));
            } else {
                s.reply(format!("{} is not set.", name));
            }
        }
        "increment" | "decrement" => {
            let step = if value.is_empty() {
                Some(1)
            } else {
                value.parse::<i64>().ok()
            };
            let Some(step) = step else {
                s.reply(format!("{} is not a number.", value));
                return Ok(());
            };
            let delta = if sub == "increment" { step } else { -step };

            let mut var = s
                .tx()
                .variable_for_update(channel_id, name)
                .await?
                .unwrap_or_else(|| Variable::new(channel_id, name, "0"));
            let now = var.add(delta);
            s.tx().upsert_variable(var).await?;
            s.reply(format!("{} is now {}.", name, now));
        }
        _ => s.reply("Usage: var get|set|delete|increment|decrement <name> [value]"),
    }
    Ok(())
}
