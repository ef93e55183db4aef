//! Moderation shortcuts.
//!
//! Each shortcut becomes a chat pseudo-command sent through the regular
//! outbound path, followed by a confirmation reply.

use crate::bot::{CommandResult, Session};
use crate::utils::{clean_username, format_duration, parse_duration, split_first};

/// Handle +b, -b, +t, -t, +p, +m, -m, +s, -s and clear.
pub async fn moderation(s: &mut Session, name: &str, args: &str) -> CommandResult {
    let (user, rest) = split_first(args);
    let user = clean_username(user);

    match name {
        "+m" => {
            s.send_raw("/slow");
            s.reply("Slow mode enabled.");
            return Ok(());
        }
        "-m" => {
            s.send_raw("/slowoff");
            s.reply("Slow mode disabled.");
            return Ok(());
        }
        "+s" => {
            s.send_raw("/subscribers");
            s.reply("Subscribers-only mode enabled.");
            return Ok(());
        }
        "-s" => {
            s.send_raw("/subscribersoff");
            s.reply("Subscribers-only mode disabled.");
            return Ok(());
        }
        "clear" => {
            s.send_raw("/clear");
            return Ok(());
        }
        _ => {}
    }

    if user.is_empty() {
        s.reply(format!("Usage: {} <user>", name));
        return Ok(());
    }

    match name {
        "+b" => {
            s.ban(&user);
            s.reply(format!("{} has been banned.", user));
        }
        "-b" => {
            s.unban(&user);
            s.reply(format!("{} has been unbanned.", user));
        }
        "+t" => {
            let (secs, _) = split_first(rest);
            let secs = match secs {
                "" => s.channel.timeout_duration,
                v => match parse_duration(v) {
                    Some(d) if !d.is_zero() => d.as_secs() as i64,
                    _ => {
                        s.reply(format!("{} is not a valid duration.", v));
                        return Ok(());
                    }
                },
            };
            s.timeout(&user, secs);
            s.reply(format!(
                "{} has been timed out for {}.",
                user,
                format_duration(secs.max(0) as u64)
            ));
        }
        "-t" => {
            s.untimeout(&user);
            s.reply(format!("{} is no longer timed out.", user));
        }
        "+p" => {
            s.purge(&user);
            s.reply(format!("{}'s messages have been purged.", user));
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::bot::testing::Harness;
    use crate::permissions::AccessLevel;

    #[tokio::test]
    async fn shortcuts_emit_pseudo_commands() {
        let h = Harness::new().await;
        let ch = h.channel("alpha", 100).await;

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!+t @Spammer 5m").await;
        assert_eq!(
            out,
            vec!["/timeout spammer 300", "[quill] spammer has been timed out for 5 minutes."]
        );

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!+p spammer").await;
        assert_eq!(out[0], "/timeout spammer 1");

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!-b").await;
        assert_eq!(out, vec!["[quill] Usage: -b <user>"]);

        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "!+b mia").await;
        assert!(out.is_empty());
    }
}
