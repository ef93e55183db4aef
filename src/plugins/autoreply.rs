//! Autoreply management.

use crate::bot::{CommandResult, Session};
use crate::database::Autoreply;
use crate::events::autoreply::compile_pattern;
use crate::utils::{split_first, split_subcommand};

/// Handle !autoreply.
pub async fn autoreply(s: &mut Session, args: &str) -> CommandResult {
    let (sub, rest) = split_subcommand(args);

    match sub.as_str() {
        "add" => add(s, rest).await,
        "delete" | "remove" => delete(s, rest).await,
        "editresponse" => edit_response(s, rest).await,
        "editpattern" => edit_pattern(s, rest).await,
        "list" => list(s).await,
        "compact" => compact(s).await,
        _ => {
            s.reply("Usage: autoreply add|delete|editresponse|editpattern|list|compact");
            Ok(())
        }
    }
}

/// Compile and validate a pattern, replying on failure.
fn checked_trigger(s: &mut Session, pattern: &str) -> Option<String> {
    let trigger = compile_pattern(pattern);
    match s.state.pattern(&trigger) {
        Ok(_) => Some(trigger),
        Err(e) => {
            s.reply(format!("Bad pattern: {}", e));
            None
        }
    }
}

fn parse_num(arg: &str) -> Option<i64> {
    arg.trim().trim_start_matches('#').parse().ok()
}

async fn add(s: &mut Session, rest: &str) -> CommandResult {
    let (pattern, response) = split_first(rest);
    if pattern.is_empty() || response.is_empty() {
        s.reply("Usage: autoreply add <pattern> <response>");
        return Ok(());
    }

    let Some(trigger) = checked_trigger(s, pattern) else {
        return Ok(());
    };

    let channel_id = s.channel.id;
    let row = Autoreply::new(channel_id, 0, &trigger, pattern, response, &s.actor.name);
    let row = s.tx().insert_autoreply(row).await?;

    s.reply(format!("Autoreply #{} added.", row.num));
    Ok(())
}

async fn delete(s: &mut Session, rest: &str) -> CommandResult {
    let Some(num) = parse_num(rest) else {
        s.reply("Usage: autoreply delete <num>");
        return Ok(());
    };

    let channel_id = s.channel.id;
    let Some(row) = s.tx().autoreply_for_update(channel_id, num).await? else {
        s.reply(format!("Autoreply #{} does not exist.", num));
        return Ok(());
    };
    s.tx().delete_autoreply(row.id).await?;

    s.reply(format!("Autoreply #{} deleted.", num));
    Ok(())
}

async fn edit_response(s: &mut Session, rest: &str) -> CommandResult {
    let (num, response) = split_first(rest);
    let (Some(num), false) = (parse_num(num), response.is_empty()) else {
        s.reply("Usage: autoreply editresponse <num> <response>");
        return Ok(());
    };

    let channel_id = s.channel.id;
    let Some(mut row) = s.tx().autoreply_for_update(channel_id, num).await? else {
        s.reply(format!("Autoreply #{} does not exist.", num));
        return Ok(());
    };

    row.response = response.to_string();
    row.editor = s.actor.name.clone();
    row.updated_at = chrono::Utc::now();
    s.tx().update_autoreply(&row).await?;

    s.reply(format!("Autoreply #{} response edited.", num));
    Ok(())
}

async fn edit_pattern(s: &mut Session, rest: &str) -> CommandResult {
    let (num, pattern) = split_first(rest);
    let (pattern, _) = split_first(pattern);
    let (Some(num), false) = (parse_num(num), pattern.is_empty()) else {
        s.reply("Usage: autoreply editpattern <num> <pattern>");
        return Ok(());
    };

    let Some(trigger) = checked_trigger(s, pattern) else {
        return Ok(());
    };

    let channel_id = s.channel.id;
    let Some(mut row) = s.tx().autoreply_for_update(channel_id, num).await? else {
        s.reply(format!("Autoreply #{} does not exist.", num));
        return Ok(());
    };

    row.trigger = trigger;
    row.orig_pattern = pattern.to_string();
    row.editor = s.actor.name.clone();
    row.updated_at = chrono::Utc::now();
    s.tx().update_autoreply(&row).await?;

    s.reply(format!("Autoreply #{} pattern edited.", num));
    Ok(())
}

async fn list(s: &mut Session) -> CommandResult {
    let channel_id = s.channel.id;
    let rows = s.tx().autoreplies(channel_id).await?;

    if rows.is_empty() {
        s.reply("There are no autoreplies.");
        return Ok(());
    }

    let items: Vec<String> = rows
        .iter()
        .map(|r| format!("{}: {}", r.num, r.orig_pattern))
        .collect();
    s.reply(format!("Autoreplies: {}", items.join(", ")));
    Ok(())
}

/// Renumber autoreplies to 1..n, keeping their order.
async fn compact(s: &mut Session) -> CommandResult {
    let channel_id = s.channel.id;
    let rows = s.tx().autoreplies(channel_id).await?;

    let mut changed = 0;
    for (i, row) in rows.into_iter().enumerate() {
        let want = i as i64 + 1;
        if row.num == want {
            continue;
        }
        if let Some(mut locked) = s.tx().autoreply_for_update(channel_id, row.num).await? {
            locked.num = want;
            s.tx().update_autoreply(&locked).await?;
            changed += 1;
        }
    }

    s.reply(format!("Compacted autoreplies, {} renumbered.", changed));
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::bot::testing::Harness;
    use crate::permissions::AccessLevel;

    #[tokio::test]
    async fn added_autoreplies_answer_and_compact() {
        let h = Harness::new().await;
        let ch = h.channel("alpha", 100).await;

        h.send_as(&ch, "mia", AccessLevel::Moderator, "!autoreply add *first* one").await;
        h.send_as(&ch, "mia", AccessLevel::Moderator, "!autoreply add *what*game* We play (_USER_)").await;

        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "so what game is this").await;
        assert_eq!(out, vec!["[quill] We play joe"]);

        // Same trigger is cooling down
        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "what game?").await;
        assert!(out.is_empty());

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!autoreply add REGEX:( broken").await;
        assert!(out[0].starts_with("[quill] Bad pattern"));

        h.send_as(&ch, "mia", AccessLevel::Moderator, "!autoreply delete 1").await;
        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!autoreply compact").await;
        assert_eq!(out, vec!["[quill] Compacted autoreplies, 1 renumbered."]);

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!autoreply list").await;
        assert_eq!(out, vec!["[quill] Autoreplies: 1: *what*game*"]);
    }
}
