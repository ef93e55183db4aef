//! Custom owner, moderator, regular and ignore lists.

use crate::bot::{CommandResult, Session};
use crate::database::Channel;
use crate::utils::{clean_username, split_first, split_subcommand};

/// Pick the list a builtin name manages, with its plural label.
fn list_for<'a>(channel: &'a mut Channel, name: &str) -> Option<(&'a mut Vec<String>, &'static str)> {
    match name {
        "owner" => Some((&mut channel.custom_owners, "owners")),
        "mod" => Some((&mut channel.custom_mods, "mods")),
        "regular" => Some((&mut channel.custom_regulars, "regulars")),
        "ignore" => Some((&mut channel.ignored, "ignored users")),
        _ => None,
    }
}

/// Handle !owner, !mod, !regular and !ignore.
pub async fn user_list(s: &mut Session, name: &str, args: &str) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let (user, _) = split_first(rest);
    let user = clean_username(user);

    let Some((list, label)) = list_for(&mut s.channel, name) else {
        return Ok(());
    };

    let reply = match sub.as_str() {
        "add" if !user.is_empty() => {
            if list.iter().any(|u| u.eq_ignore_ascii_case(&user)) {
                format!("{} is already in {}.", user, label)
            } else {
                list.push(user.clone());
                format!("{} added to {}.", user, label)
            }
        }
        "delete" | "remove" if !user.is_empty() => {
            let before = list.len();
            list.retain(|u| !u.eq_ignore_ascii_case(&user));
            if list.len() == before {
                format!("{} is not in {}.", user, label)
            } else {
                format!("{} removed from {}.", user, label)
            }
        }
        "list" => {
            if list.is_empty() {
                format!("There are no {}.", label)
            } else {
                let mut names = list.clone();
                names.sort();
                format!("{}: {}", capitalize(label), names.join(", "))
            }
        }
        _ => {
            s.reply(format!("Usage: {} add|delete|list [user]", name));
            return Ok(());
        }
    };

    if sub != "list" {
        s.save_channel().await?;
    }
    s.reply(reply);
    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::testing::Harness;
    use crate::permissions::AccessLevel;

    #[test]
    fn capitalizes_labels() {
        assert_eq!(capitalize("regulars"), "Regulars");
        assert_eq!(capitalize(""), "");
    }

    #[tokio::test]
    async fn regulars_gain_subscriber_access() {
        let h = Harness::new().await;
        let ch = h.channel("alpha", 100).await;
        h.send_as(&ch, "mia", AccessLevel::Moderator, "!command add subonly secret").await;

        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "!subonly").await;
        assert!(out.is_empty());

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!regular add @Joe").await;
        assert_eq!(out, vec!["[quill] joe added to regulars."]);

        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "!subonly").await;
        assert_eq!(out, vec!["[quill] secret"]);
    }

    #[tokio::test]
    async fn ignored_users_get_no_answer() {
        let h = Harness::new().await;
        let ch = h.channel("alpha", 100).await;
        h.send_as(&ch, "mia", AccessLevel::Moderator, "!command adde hi hello").await;
        h.send_as(&ch, "mia", AccessLevel::Moderator, "!ignore add joe").await;

        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "!hi").await;
        assert!(out.is_empty());

        // Moderators cannot manage owners
        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!owner add mia").await;
        assert!(out.is_empty());

        let out = h.send_as(&ch, "alpha", AccessLevel::Broadcaster, "!ignore list").await;
        assert_eq!(out, vec!["[quill] Ignored users: joe"]);
    }
}
