//! Stream information builtins backed by the platform API.

use chrono::Utc;

use crate::bot::{CommandResult, Session};
use crate::permissions::AccessLevel;
use crate::utils::format_duration;

/// Handle !status. With text, moderators change the stream title.
pub async fn status(s: &mut Session, args: &str) -> CommandResult {
    let twitch = s.state.twitch.clone();
    let twitch_id = s.channel.twitch_id;

    if args.is_empty() {
        let info = twitch.channel_info(twitch_id).await?;
        s.reply(info.status);
        return Ok(());
    }

    s.require(AccessLevel::Moderator)?;
    twitch.set_channel_status(twitch_id, args).await?;
    s.reply(format!("Status changed to: {}", args));
    Ok(())
}

/// Handle !game. With text, moderators change the category.
pub async fn game(s: &mut Session, args: &str) -> CommandResult {
    let twitch = s.state.twitch.clone();
    let twitch_id = s.channel.twitch_id;

    if args.is_empty() {
        let info = twitch.channel_info(twitch_id).await?;
        let reply = if info.game.is_empty() {
            "No game is set.".to_string()
        } else {
            format!("Current game: {}", info.game)
        };
        s.reply(reply);
        return Ok(());
    }

    s.require(AccessLevel::Moderator)?;
    twitch.set_channel_game(twitch_id, args).await?;
    s.reply(format!("Game changed to: {}", args));
    Ok(())
}

/// Handle !uptime.
pub async fn uptime(s: &mut Session, _args: &str) -> CommandResult {
    let twitch = s.state.twitch.clone();
    let reply = match twitch.current_stream(s.channel.twitch_id).await? {
        Some(stream) => {
            let secs = (Utc::now() - stream.started_at).num_seconds().max(0) as u64;
            format!("{} has been live for {}.", s.channel.display_name, format_duration(secs))
        }
        None => format!("{} is not live.", s.channel.display_name),
    };
    s.reply(reply);
    Ok(())
}

/// Handle !viewers.
pub async fn viewers(s: &mut Session, _args: &str) -> CommandResult {
    let twitch = s.state.twitch.clone();
    let reply = match twitch.current_stream(s.channel.twitch_id).await? {
        Some(stream) if stream.viewers == 1 => "1 viewer.".to_string(),
        Some(stream) => format!("{} viewers.", stream.viewers),
        None => format!("{} is not live.", s.channel.display_name),
    };
    s.reply(reply);
    Ok(())
}

/// Handle !chatters.
pub async fn chatters(s: &mut Session, _args: &str) -> CommandResult {
    let twitch = s.state.twitch.clone();
    let n = twitch.chatters(&s.channel.name).await?.len();
    s.reply(format!("{} {} in chat.", n, if n == 1 { "user is" } else { "users are" }));
    Ok(())
}

/// Handle !islive.
pub async fn islive(s: &mut Session, _args: &str) -> CommandResult {
    let twitch = s.state.twitch.clone();
    let live = twitch.current_stream(s.channel.twitch_id).await?.is_some();
    let reply = if live {
        format!("{} is live.", s.channel.display_name)
    } else {
        format!("{} is not live.", s.channel.display_name)
    };
    s.reply(reply);
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::bot::testing::Harness;
    use crate::permissions::AccessLevel;

    #[tokio::test]
    async fn live_stream_details() {
        let h = Harness::new().await;
        let ch = h.channel("alpha", 100).await;

        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "!uptime").await;
        assert_eq!(out, vec!["[quill] alpha is not live."]);

        h.go_live(100, Utc::now() - Duration::minutes(90), 42);
        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "!uptime").await;
        assert_eq!(out, vec!["[quill] alpha has been live for 1 hour, 30 minutes."]);

        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "!viewers").await;
        assert_eq!(out, vec!["[quill] 42 viewers."]);

        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "!islive").await;
        assert_eq!(out, vec!["[quill] alpha is live."]);
    }

    #[tokio::test]
    async fn only_moderators_change_the_game() {
        let h = Harness::new().await;
        let ch = h.channel("alpha", 100).await;

        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "!game Chess").await;
        assert!(out.is_empty());

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!game Chess").await;
        assert_eq!(out, vec!["[quill] Game changed to: Chess"]);

        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "!game").await;
        assert_eq!(out, vec!["[quill] Current game: Chess"]);
    }
}
