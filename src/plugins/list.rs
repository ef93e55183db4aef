//! Command lists.
//!
//! `!list add|delete|restrict|rename` manages lists; invoking a list by name
//! picks an item (`!name`, `!name 3`, `!name random`) or edits it
//! (`!name add|delete|edit`).

use rand::Rng;

use crate::bot::{CommandResult, Session};
use crate::database::{CommandInfo, CommandList, CommandTarget};
use crate::permissions::AccessLevel;
use crate::utils::{split_first, split_subcommand};

use super::command::{Kind, delete_info, rename_info, restrict_info};

/// Handle !list.
pub async fn list(s: &mut Session, args: &str) -> CommandResult {
    let (sub, rest) = split_subcommand(args);

    match sub.as_str() {
        "add" => add(s, rest).await,
        "delete" | "remove" => delete_info(s, rest, Kind::List).await,
        "restrict" => restrict_info(s, rest, Kind::List).await,
        "rename" => rename_info(s, rest, Kind::List).await,
        _ => {
            s.reply("Usage: list add|delete|restrict|rename <name>");
            Ok(())
        }
    }
}

async fn add(s: &mut Session, rest: &str) -> CommandResult {
    let (name, _) = split_first(rest);
    let name = name.to_lowercase();
    if name.is_empty() {
        s.reply("Usage: list add <name>");
        return Ok(());
    }

    let channel_id = s.channel.id;
    if s.tx().command_info(channel_id, &name).await?.is_some() {
        s.reply(format!("{} already exists.", name));
        return Ok(());
    }

    let list = s.tx().insert_command_list(CommandList::new(channel_id)).await?;
    let mut info = CommandInfo::new(channel_id, &name, AccessLevel::Subscriber, &s.actor.name);
    info.target = Some(CommandTarget::List(list.id));
    s.tx().insert_command_info(info).await?;

    let reply = format!(
        "List {} created, use {}{} add <item> to add items.",
        name, s.channel.prefix, name
    );
    s.reply(reply);
    Ok(())
}

/// Parse a 1-based item number.
fn item_index(arg: &str, len: usize) -> Option<usize> {
    let n: usize = arg.trim().parse().ok()?;
    (1..=len).contains(&n).then(|| n - 1)
}

/// Invoke a list-backed command.
///
/// Returns `true` when an item was shown, which is what counts as a use.
pub async fn invoke(s: &mut Session, info: &CommandInfo, args: &str) -> CommandResult<bool> {
    let Some(list_id) = info.command_list_id() else {
        return Ok(false);
    };
    let (sub, rest) = split_subcommand(args);

    match sub.as_str() {
        "add" | "delete" | "remove" | "edit" => {
            s.require(AccessLevel::Moderator)?;
            s.require(info.access_level)?;
            edit_items(s, info, list_id, &sub, rest).await?;
            Ok(false)
        }
        "get" => show(s, info, list_id, Some(rest)).await,
        "" | "random" => show(s, info, list_id, None).await,
        _ if sub.parse::<usize>().is_ok() => show(s, info, list_id, Some(&sub)).await,
        _ => show(s, info, list_id, None).await,
    }
}

async fn show(s: &mut Session, info: &CommandInfo, list_id: i64, index: Option<&str>) -> CommandResult<bool> {
    let items = s
        .tx()
        .command_list(list_id)
        .await?
        .map(|l| l.items)
        .unwrap_or_default();

    if items.is_empty() {
        s.reply(format!("List {} is empty.", info.name));
        return Ok(false);
    }

    let idx = match index {
        Some(arg) => match item_index(arg, items.len()) {
            Some(idx) => idx,
            None => {
                s.reply(format!("Index out of range, {} has {} items.", info.name, items.len()));
                return Ok(false);
            }
        },
        None => rand::thread_rng().gen_range(0..items.len()),
    };

    let out = s.evaluate(&items[idx], "", Some(info)).await?;
    if !out.trim().is_empty() {
        s.reply(out);
    }
    Ok(true)
}

async fn edit_items(s: &mut Session, info: &CommandInfo, list_id: i64, sub: &str, rest: &str) -> CommandResult {
    let Some(mut list) = s.tx().command_list_for_update(list_id).await? else {
        return Err(anyhow::anyhow!("list {} has no items row {}", info.name, list_id).into());
    };

    match sub {
        "add" => {
            if rest.is_empty() {
                s.reply(format!("Usage: {}{} add <item>", s.channel.prefix, info.name));
                return Ok(());
            }
            list.items.push(rest.to_string());
            let reply = format!(
                "\"{}\" has been added to {} as item #{}.",
                rest,
                info.name,
                list.items.len()
            );
            s.reply(reply);
        }
        "edit" => {
            let (num, text) = split_first(rest);
            let Some(idx) = item_index(num, list.items.len()) else {
                s.reply(format!("Index out of range, {} has {} items.", info.name, list.items.len()));
                return Ok(());
            };
            if text.is_empty() {
                s.reply(format!("Usage: {}{} edit <num> <item>", s.channel.prefix, info.name));
                return Ok(());
            }
            list.items[idx] = text.to_string();
            s.reply(format!("Item #{} of {} changed to \"{}\".", idx + 1, info.name, text));
        }
        _ => {
            let Some(idx) = item_index(rest, list.items.len()) else {
                s.reply(format!("Index out of range, {} has {} items.", info.name, list.items.len()));
                return Ok(());
            };
            let removed = list.items.remove(idx);
            s.reply(format!("\"{}\" has been removed from {}.", removed, info.name));
        }
    }

    list.updated_at = chrono::Utc::now();
    s.tx().update_command_list(&list).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::testing::Harness;

    #[test]
    fn item_numbers_are_one_based() {
        assert_eq!(item_index("1", 3), Some(0));
        assert_eq!(item_index("3", 3), Some(2));
        assert_eq!(item_index("0", 3), None);
        assert_eq!(item_index("4", 3), None);
        assert_eq!(item_index("x", 3), None);
    }

    #[tokio::test]
    async fn items_are_added_and_shown() {
        let h = Harness::new().await;
        let ch = h.channel("alpha", 100).await;

        h.send_as(&ch, "mia", AccessLevel::Moderator, "!list add jokes").await;
        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!jokes add knock knock").await;
        assert_eq!(out, vec!["[quill] \"knock knock\" has been added to jokes as item #1."]);
        h.send_as(&ch, "mia", AccessLevel::Moderator, "!jokes add hi (_USER_)").await;

        let out = h.send_as(&ch, "sam", AccessLevel::Subscriber, "!jokes 2").await;
        assert_eq!(out, vec!["[quill] hi sam"]);

        let out = h.send_as(&ch, "sam", AccessLevel::Subscriber, "!jokes 9").await;
        assert_eq!(out, vec!["[quill] Index out of range, jokes has 2 items."]);

        // Subscribers cannot edit items
        let out = h.send_as(&ch, "sam", AccessLevel::Subscriber, "!jokes delete 1").await;
        assert!(out.is_empty());
        assert_eq!(h.list_items(&ch, "jokes").await.len(), 2);
    }

    #[tokio::test]
    async fn subscriber_list_is_protected_from_everyone() {
        let h = Harness::new().await;
        let ch = h.channel("alpha", 100).await;

        h.send_as(&ch, "mia", AccessLevel::Moderator, "!list add quotes2").await;
        assert_eq!(h.command_level(&ch, "quotes2").await, Some(AccessLevel::Subscriber));

        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "!list delete quotes2").await;
        assert!(out.is_empty());
        assert!(h.command_level(&ch, "quotes2").await.is_some());

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!list delete quotes2").await;
        assert_eq!(out, vec!["[quill] List !quotes2 deleted."]);
        assert!(h.command_level(&ch, "quotes2").await.is_none());
    }
}
