//! Moderation filters.
//!
//! Runs before command resolution when the channel moderates. A message that
//! trips a filter is deleted; the first offense within the hour earns a
//! warning, later ones a timeout.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use crate::bot::{CommandResult, Session};

use super::autoreply::REGEX_PREFIX;

/// Loose URL matcher: optional scheme, dotted host with a letter TLD, optional path.
static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:https?://)?(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z]{2,}(?::\d{1,5})?(?:/\S*)?")
        .expect("URL pattern is valid")
});

/// Why a message was filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reason {
    Me,
    Links,
    Caps,
    Symbols,
    BannedPhrase,
}

impl Reason {
    fn describe(self) -> &'static str {
        match self {
            Self::Me => "please don't use /me",
            Self::Links => "please ask a moderator before posting links",
            Self::Caps => "please don't shout",
            Self::Symbols => "please don't spam symbols",
            Self::BannedPhrase => "that phrase is not allowed here",
        }
    }
}

/// Pull the URLs out of a message.
pub fn extract_urls(text: &str) -> Vec<Url> {
    URL_RE
        .find_iter(text)
        .filter_map(|m| {
            let raw = m.as_str().trim_end_matches(['.', ',', '!', '?', ')']);
            let lower = raw.to_lowercase();
            if lower.starts_with("http://") || lower.starts_with("https://") {
                Url::parse(raw).ok()
            } else {
                Url::parse(&format!("http://{}", raw)).ok()
            }
        })
        .collect()
}

/// Whether `url` matches a permitted `host[/path glob]` entry.
///
/// The host matches exactly or as a dot-suffix. A path glob also covers
/// everything below it, so `/foo` admits `/foo/bar`.
pub fn link_permitted(entry: &str, url: &Url) -> bool {
    let entry = entry.trim().to_lowercase();
    let entry = entry
        .strip_prefix("https://")
        .or_else(|| entry.strip_prefix("http://"))
        .unwrap_or(&entry);

    let (host_pat, path_pat) = match entry.find('/') {
        Some(i) => (&entry[..i], Some(&entry[i..])),
        None => (entry, None),
    };

    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_lowercase();
    let host_ok = host == host_pat || host.ends_with(&format!(".{}", host_pat));
    if !host_ok {
        return false;
    }

    let Some(path_pat) = path_pat else {
        return true;
    };
    let path_pat = path_pat.trim_end_matches('/');
    if path_pat.is_empty() {
        return true;
    }

    let options = glob::MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    let path = url.path();

    [path_pat.to_string(), format!("{}/**", path_pat)]
        .iter()
        .filter_map(|p| glob::Pattern::new(p).ok())
        .any(|p| p.matches_with(path, options))
}

/// Caps check: enough letters, enough capitals, and a high enough share.
fn too_many_caps(text: &str, min_chars: i64, min_caps: i64, percentage: i64) -> bool {
    let letters = text.chars().filter(|c| c.is_alphabetic()).count() as i64;
    if letters < min_chars.max(1) {
        return false;
    }
    let caps = text.chars().filter(|c| c.is_uppercase()).count() as i64;
    caps >= min_caps && caps * 100 >= letters * percentage
}

/// Symbol check over non-whitespace characters.
fn too_many_symbols(text: &str, min_symbols: i64, percentage: i64) -> bool {
    let visible = text.chars().filter(|c| !c.is_whitespace()).count() as i64;
    if visible == 0 {
        return false;
    }
    let symbols = text
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_alphanumeric())
        .count() as i64;
    symbols >= min_symbols.max(1) && symbols * 100 >= visible * percentage
}

fn banned_phrase(s: &Session, text: &str) -> bool {
    let lower = text.to_lowercase();

    s.channel.filter_banned_phrases_patterns.iter().any(|phrase| {
        if let Some(raw) = phrase.strip_prefix(REGEX_PREFIX) {
            match s.state.pattern(&format!("(?i){}", raw)) {
                Ok(re) => re.is_match(text),
                Err(e) => {
                    warn!("Bad banned phrase in {}: {}", s.channel.name, e);
                    false
                }
            }
        } else {
            !phrase.is_empty() && lower.contains(&phrase.to_lowercase())
        }
    })
}

async fn check_links(s: &mut Session) -> CommandResult<bool> {
    let urls = extract_urls(&s.text);
    if urls.is_empty() {
        return Ok(false);
    }

    let permitted = &s.channel.permitted_links;
    if urls
        .iter()
        .all(|u| permitted.iter().any(|entry| link_permitted(entry, u)))
    {
        return Ok(false);
    }

    let user = s.actor.name.clone();
    if s.rates.use_link_permit(&user).await? {
        debug!("{} used a link permit in {}", user, s.channel.name);
        return Ok(false);
    }

    Ok(true)
}

async fn find_reason(s: &mut Session) -> CommandResult<Option<Reason>> {
    if s.channel.filter_me && s.is_action {
        return Ok(Some(Reason::Me));
    }
    if s.channel.filter_links && check_links(s).await? {
        return Ok(Some(Reason::Links));
    }

    let c = &s.channel;
    if c.filter_caps
        && too_many_caps(
            &s.text,
            c.filter_caps_min_chars,
            c.filter_caps_min_caps,
            c.filter_caps_percentage,
        )
    {
        return Ok(Some(Reason::Caps));
    }
    if c.filter_symbols
        && too_many_symbols(
            &s.text,
            c.filter_symbols_min_symbols,
            c.filter_symbols_percentage,
        )
    {
        return Ok(Some(Reason::Symbols));
    }
    if c.filter_banned_phrases && banned_phrase(s, &s.text) {
        return Ok(Some(Reason::BannedPhrase));
    }
    Ok(None)
}

/// Apply the channel's filters. Returns `true` when the message was filtered.
pub async fn run(s: &mut Session) -> CommandResult<bool> {
    if s.user_is(s.channel.filter_exempt_level) {
        return Ok(false);
    }

    let Some(reason) = find_reason(s).await? else {
        return Ok(false);
    };

    let user = s.actor.name.clone();
    debug!("Filtered message from {} in {}: {:?}", user, s.channel.name, reason);

    let id = s.id.clone();
    s.delete_message(&id);

    let offenses = s.rates.filter_offense(&user).await?;
    if offenses <= 1 {
        s.reply(format!("{}, {} (warning)", s.actor.display, reason.describe()));
    } else {
        let secs = s.channel.timeout_duration;
        s.timeout(&user, secs);
        s.reply(format!("{}, {} (timeout)", s.actor.display, reason.describe()));
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::testing::Harness;
    use crate::permissions::AccessLevel;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn finds_urls_with_and_without_scheme() {
        let found = extract_urls("see example.com/a and https://Foo.org/b?c=1, ok.");
        let hosts: Vec<_> = found.iter().map(|u| u.host_str().unwrap().to_string()).collect();
        assert_eq!(hosts, vec!["example.com", "foo.org"]);
        assert!(extract_urls("no links here... really").is_empty());
    }

    #[test]
    fn permitted_hosts_and_paths() {
        assert!(link_permitted("youtube.com", &url("https://youtube.com/watch?v=1")));
        assert!(link_permitted("youtube.com", &url("https://www.youtube.com/x")));
        assert!(!link_permitted("youtube.com", &url("https://notyoutube.com/")));

        assert!(link_permitted("imgur.com/a", &url("https://imgur.com/a")));
        assert!(link_permitted("imgur.com/a", &url("https://imgur.com/a/b/c")));
        assert!(!link_permitted("imgur.com/a", &url("https://imgur.com/b")));
        assert!(link_permitted("twitter.com/*/status", &url("https://twitter.com/x/status/1")));
    }

    #[test]
    fn caps_and_symbols_thresholds() {
        assert!(too_many_caps("THIS IS LOUD", 8, 6, 50));
        assert!(!too_many_caps("HEY", 8, 6, 50));
        assert!(!too_many_caps("This Is Mostly Fine Text", 8, 6, 50));

        assert!(too_many_symbols("!!!!!! ???", 5, 50));
        assert!(!too_many_symbols("hello!", 5, 50));
    }

    #[tokio::test]
    async fn links_warn_then_time_out() {
        let h = Harness::new().await;
        let ch = h
            .channel_with("alpha", 100, |c| {
                c.enable_filters = true;
                c.filter_links = true;
                c.permitted_links = vec!["clips.twitch.tv".into()];
            })
            .await;

        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "https://clips.twitch.tv/abc").await;
        assert!(out.is_empty());

        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "buy at spam.com").await;
        assert_eq!(out.len(), 2);
        assert!(out[0].starts_with("/delete "));
        assert!(out[1].ends_with("(warning)"));

        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "buy at spam.com").await;
        assert!(out.contains(&"/timeout joe 600".to_string()));

        // Subscribers are exempt by default
        let out = h.send_as(&ch, "sam", AccessLevel::Subscriber, "spam.com").await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn permit_allows_one_link() {
        let h = Harness::new().await;
        let ch = h
            .channel_with("alpha", 100, |c| {
                c.enable_filters = true;
                c.filter_links = true;
            })
            .await;

        h.send_as(&ch, "mia", AccessLevel::Moderator, "!permit joe").await;
        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "look at example.com").await;
        assert!(out.is_empty());

        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "and example.org").await;
        assert_eq!(out.len(), 2);
    }
}
