//! Quote database commands.

use rand::seq::SliceRandom;

use crate::bot::{CommandResult, Session};
use crate::database::Quote;
use crate::permissions::AccessLevel;
use crate::utils::{split_first, split_subcommand};

/// Handle !quote.
pub async fn quote(s: &mut Session, args: &str) -> CommandResult {
    let (sub, rest) = split_subcommand(args);

    match sub.as_str() {
        "" | "random" => random(s).await,
        "get" => get(s, rest).await,
        "search" => search(s, rest).await,
        "add" => {
            s.require(AccessLevel::Moderator)?;
            add(s, rest).await
        }
        "edit" => {
            s.require(AccessLevel::Moderator)?;
            edit(s, rest).await
        }
        "delete" | "remove" => {
            s.require(AccessLevel::Moderator)?;
            delete(s, rest).await
        }
        "editor" => {
            s.require(AccessLevel::Moderator)?;
            editor(s, rest).await
        }
        _ if sub.parse::<i64>().is_ok() => get(s, &sub).await,
        _ => {
            s.reply("Usage: quote [num|random|search|add|edit|delete|editor]");
            Ok(())
        }
    }
}

fn parse_num(arg: &str) -> Option<i64> {
    arg.trim().trim_start_matches('#').parse().ok()
}

async fn random(s: &mut Session) -> CommandResult {
    let channel_id = s.channel.id;
    let quotes = s.tx().quotes(channel_id).await?;
    let picked = quotes.choose(&mut rand::thread_rng()).cloned();

    match picked {
        Some(q) => s.reply(format!("Quote #{}: {}", q.num, q.quote)),
        None => s.reply("There are no quotes."),
    }
    Ok(())
}

async fn get(s: &mut Session, rest: &str) -> CommandResult {
    let Some(num) = parse_num(rest) else {
        s.reply("Usage: quote get <num>");
        return Ok(());
    };

    let channel_id = s.channel.id;
    let found = s
        .tx()
        .quotes(channel_id)
        .await?
        .into_iter()
        .find(|q| q.num == num);

    match found {
        Some(q) => s.reply(format!("Quote #{}: {}", q.num, q.quote)),
        None => s.reply(format!("Quote #{} does not exist.", num)),
    }
    Ok(())
}

async fn search(s: &mut Session, rest: &str) -> CommandResult {
    if rest.is_empty() {
        s.reply("Usage: quote search <text>");
        return Ok(());
    }

    let needle = rest.to_lowercase();
    let channel_id = s.channel.id;
    let nums: Vec<String> = s
        .tx()
        .quotes(channel_id)
        .await?
        .into_iter()
        .filter(|q| q.quote.to_lowercase().contains(&needle))
        .map(|q| format!("#{}", q.num))
        .collect();

    if nums.is_empty() {
        s.reply("No quotes matched.");
    } else {
        s.reply(format!("Matching quotes: {}", nums.join(", ")));
    }
    Ok(())
}

async fn add(s: &mut Session, text: &str) -> CommandResult {
    if text.is_empty() {
        s.reply("Usage: quote add <text>");
        return Ok(());
    }

    let channel_id = s.channel.id;
    let actor = s.actor.name.clone();
    let q = s.tx().insert_quote(Quote::new(channel_id, 0, text, &actor)).await?;
    s.reply(format!("Quote #{} added.", q.num));
    Ok(())
}

async fn edit(s: &mut Session, rest: &str) -> CommandResult {
    let (num, text) = split_first(rest);
    let Some(num) = parse_num(num) else {
        s.reply("Usage: quote edit <num> <text>");
        return Ok(());
    };
    if text.is_empty() {
        s.reply("Usage: quote edit <num> <text>");
        return Ok(());
    }

    let channel_id = s.channel.id;
    let Some(mut q) = s.tx().quote_for_update(channel_id, num).await? else {
        s.reply(format!("Quote #{} does not exist.", num));
        return Ok(());
    };

    q.quote = text.to_string();
    q.editor = s.actor.name.clone();
    q.updated_at = chrono::Utc::now();
    s.tx().update_quote(&q).await?;

    s.reply(format!("Quote #{} edited.", num));
    Ok(())
}

async fn delete(s: &mut Session, rest: &str) -> CommandResult {
    let Some(num) = parse_num(rest) else {
        s.reply("Usage: quote delete <num>");
        return Ok(());
    };

    let channel_id = s.channel.id;
    let Some(q) = s.tx().quote_for_update(channel_id, num).await? else {
        s.reply(format!("Quote #{} does not exist.", num));
        return Ok(());
    };
    s.tx().delete_quote(q.id).await?;

    s.reply(format!("Quote #{} deleted.", num));
    Ok(())
}

async fn editor(s: &mut Session, rest: &str) -> CommandResult {
    let Some(num) = parse_num(rest) else {
        s.reply("Usage: quote editor <num>");
        return Ok(());
    };

    let channel_id = s.channel.id;
    let found = s
        .tx()
        .quotes(channel_id)
        .await?
        .into_iter()
        .find(|q| q.num == num);

    match found {
        Some(q) => s.reply(format!(
            "Quote #{} was added by {} and last edited by {}.",
            q.num, q.creator, q.editor
        )),
        None => s.reply(format!("Quote #{} does not exist.", num)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::bot::testing::Harness;
    use crate::permissions::AccessLevel;

    #[tokio::test]
    async fn quotes_are_numbered_and_searchable() {
        let h = Harness::new().await;
        let ch = h.channel("alpha", 100).await;

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!quote add The cake is a lie").await;
        assert_eq!(out, vec!["[quill] Quote #1 added."]);
        h.send_as(&ch, "mia", AccessLevel::Moderator, "!quote add Stay a while and listen").await;

        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "!quote 2").await;
        assert_eq!(out, vec!["[quill] Quote #2: Stay a while and listen"]);

        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "!quote search CAKE").await;
        assert_eq!(out, vec!["[quill] Matching quotes: #1"]);

        // Everyone cannot add
        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "!quote add mine").await;
        assert!(out.is_empty());

        h.send_as(&ch, "mia", AccessLevel::Moderator, "!quote delete 1").await;
        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "!quote 1").await;
        assert_eq!(out, vec!["[quill] Quote #1 does not exist."]);
    }
}
