//! Help command module.
//!
//! `!help` lists the topics; `!help <topic>` explains one of them using the
//! channel's prefix.

use crate::bot::{CommandResult, Session};
use crate::utils::split_first;

mod topics;

/// Handle !help and !bothelp.
pub async fn help(s: &mut Session, args: &str) -> CommandResult {
    let (topic, _) = split_first(args);
    let prefix = s.channel.prefix.clone();

    if topic.is_empty() {
        let names: Vec<&str> = topics::TOPICS.iter().map(|t| t.name).collect();
        s.reply(format!("Help topics: {}. Use {}help <topic>.", names.join(", "), prefix));
        return Ok(());
    }

    match topics::find(topic) {
        Some(t) => s.reply(t.text.replace("{p}", &prefix)),
        None => s.reply(format!("No help for {}.", topic)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::testing::Harness;
    use crate::permissions::AccessLevel;

    #[test]
    fn topics_resolve_aliases() {
        assert_eq!(topics::find("Quote").map(|t| t.name), Some("quotes"));
        assert_eq!(topics::find("schedule").map(|t| t.name), Some("repeats"));
        assert!(topics::find("nothing").is_none());
    }

    #[tokio::test]
    async fn help_uses_channel_prefix() {
        let h = Harness::new().await;
        let ch = h.channel_with("alpha", 100, |c| c.prefix = "+".into()).await;

        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "+help vars").await;
        assert_eq!(out.len(), 1);
        assert!(out[0].starts_with("[quill] +var get|set"));

        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "+help").await;
        assert!(out[0].contains("Use +help <topic>."));
    }
}
