//! Autoreply matcher.
//!
//! Scans the channel's autoreplies in order and answers with the first whose
//! trigger matches the whole message.

use std::time::Duration;

use tracing::{debug, warn};

use crate::bot::{CommandResult, Session};

/// Minimum time between two answers from the same autoreply.
const AUTOREPLY_COOLDOWN: Duration = Duration::from_secs(30);

/// Marks a pattern as a raw regular expression.
pub const REGEX_PREFIX: &str = "REGEX:";

/// Turn a user pattern into an anchored, case-insensitive regex source.
///
/// - `REGEX:<re>` uses `<re>` as typed
/// - `"text"` matches `text` literally
/// - otherwise `*` matches anything and `_` stands for a space
pub fn compile_pattern(pattern: &str) -> String {
    let pattern = pattern.trim();

    if let Some(raw) = pattern.strip_prefix(REGEX_PREFIX) {
        return format!("(?i)^(?:{})$", raw);
    }

    if pattern.len() >= 2 && pattern.starts_with('"') && pattern.ends_with('"') {
        let inner = &pattern[1..pattern.len() - 1];
        return format!("(?i)^{}$", regex::escape(inner));
    }

    let body = pattern
        .split('*')
        .map(|part| regex::escape(&part.replace('_', " ")))
        .collect::<Vec<_>>()
        .join(".*");
    format!("(?i)^{}$", body)
}

/// Answer the message with the first matching autoreply, if any.
pub async fn run(s: &mut Session) -> CommandResult {
    let channel_id = s.channel.id;
    let autoreplies = s.tx().autoreplies(channel_id).await?;
    if autoreplies.is_empty() {
        return Ok(());
    }

    let text = s.text.trim().to_string();

    for ar in autoreplies {
        let re = match s.state.pattern(&ar.trigger) {
            Ok(re) => re,
            Err(e) => {
                warn!("Autoreply {} in {} has a bad trigger: {}", ar.num, s.channel.name, e);
                continue;
            }
        };
        if !re.is_match(&text) {
            continue;
        }

        if s.rates.autoreply_cooldown(ar.num, AUTOREPLY_COOLDOWN).await? {
            debug!("Autoreply {} in {} is cooling down", ar.num, s.channel.name);
            return Ok(());
        }

        let out = s.evaluate(&ar.response, "", None).await?;
        if !out.trim().is_empty() {
            s.reply(out);
        }

        if let Some(mut row) = s.tx().autoreply_for_update(channel_id, ar.num).await? {
            row.count += 1;
            s.tx().update_autoreply(&row).await?;
        }
        return Ok(());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn matches(pattern: &str, text: &str) -> bool {
        Regex::new(&compile_pattern(pattern)).unwrap().is_match(text)
    }

    #[test]
    fn wildcard_patterns() {
        assert!(matches("*what*game*", "hey what game is this"));
        assert!(matches("*what*game*", "WHAT GAME"));
        assert!(!matches("*what*game*", "what is this"));
        assert!(matches("hello_there", "Hello there"));
        assert!(!matches("hello", "hello there"));
        // Regex metacharacters are literal outside REGEX:
        assert!(matches("what?", "what?"));
        assert!(!matches("what?", "wha"));
    }

    #[test]
    fn literal_and_regex_patterns() {
        assert!(matches("\"a*b\"", "a*b"));
        assert!(!matches("\"a*b\"", "aXb"));
        assert!(matches("REGEX:ba+d", "baaad"));
        assert!(!matches("REGEX:ba+d", "bad day"));
        assert!(matches("REGEX:foo|bar", "bar"));
    }
}
