//! Filter settings and link permits.

use std::time::Duration;

use crate::bot::{CommandResult, Session};
use crate::database::Channel;
use crate::events::autoreply::REGEX_PREFIX;
use crate::permissions::AccessLevel;
use crate::utils::{clean_username, parse_toggle, split_first, split_subcommand};

/// How long a `!permit` stays usable.
const PERMIT_WINDOW: Duration = Duration::from_secs(60);

const USAGE: &str = "Usage: filter on|off|status|links|caps|symbols|me|banphrase|pd|exemptlevel ...";

/// Handle !filter.
pub async fn filter(s: &mut Session, args: &str) -> CommandResult {
    let (sub, rest) = split_subcommand(args);

    match sub.as_str() {
        "on" | "off" => {
            s.channel.enable_filters = sub == "on";
            s.save_channel().await?;
            s.reply(format!("Filters are now {}.", sub));
        }
        "status" => {
            let reply = status(&s.channel);
            s.reply(reply);
        }
        "links" => toggle(s, rest, "Link filter", |c| &mut c.filter_links).await?,
        "me" => toggle(s, rest, "/me filter", |c| &mut c.filter_me).await?,
        "caps" => caps(s, rest).await?,
        "symbols" => symbols(s, rest).await?,
        "banphrase" | "banphrases" => banphrase(s, rest).await?,
        "pd" | "permitteddomain" => permitted(s, rest).await?,
        "exemptlevel" => exempt_level(s, rest).await?,
        _ => s.reply(USAGE),
    }
    Ok(())
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

fn status(c: &Channel) -> String {
    format!(
        "Filters {}: links {}, caps {}, symbols {}, me {}, banned phrases {}; exempt {} and above.",
        on_off(c.enable_filters),
        on_off(c.filter_links),
        on_off(c.filter_caps),
        on_off(c.filter_symbols),
        on_off(c.filter_me),
        on_off(c.filter_banned_phrases),
        c.filter_exempt_level.describe()
    )
}

async fn toggle(
    s: &mut Session,
    value: &str,
    label: &str,
    field: fn(&mut Channel) -> &mut bool,
) -> CommandResult {
    let Some(on) = parse_toggle(value) else {
        let current = *field(&mut s.channel);
        s.reply(format!("{} is {}.", label, on_off(current)));
        return Ok(());
    };

    *field(&mut s.channel) = on;
    s.save_channel().await?;
    s.reply(format!("{} is now {}.", label, on_off(on)));
    Ok(())
}

/// Parse a percentage between 0 and 100.
fn percentage(value: &str) -> Option<i64> {
    value.parse::<i64>().ok().filter(|n| (0..=100).contains(n))
}

fn count(value: &str) -> Option<i64> {
    value.parse::<i64>().ok().filter(|n| *n >= 0)
}

async fn caps(s: &mut Session, rest: &str) -> CommandResult {
    let (key, value) = split_subcommand(rest);
    let c = &mut s.channel;

    let ok = match key.as_str() {
        "percent" | "percentage" => percentage(value).map(|n| c.filter_caps_percentage = n),
        "minchars" => count(value).map(|n| c.filter_caps_min_chars = n),
        "mincaps" => count(value).map(|n| c.filter_caps_min_caps = n),
        _ => return toggle(s, rest, "Caps filter", |c| &mut c.filter_caps).await,
    };

    if ok.is_none() {
        s.reply(format!("Invalid value {} for caps {}.", value, key));
        return Ok(());
    }
    s.save_channel().await?;
    s.reply(format!("Caps {} set to {}.", key, value));
    Ok(())
}

async fn symbols(s: &mut Session, rest: &str) -> CommandResult {
    let (key, value) = split_subcommand(rest);
    let c = &mut s.channel;

    let ok = match key.as_str() {
        "percent" | "percentage" => percentage(value).map(|n| c.filter_symbols_percentage = n),
        "min" | "minsymbols" => count(value).map(|n| c.filter_symbols_min_symbols = n),
        _ => return toggle(s, rest, "Symbol filter", |c| &mut c.filter_symbols).await,
    };

    if ok.is_none() {
        s.reply(format!("Invalid value {} for symbols {}.", value, key));
        return Ok(());
    }
    s.save_channel().await?;
    s.reply(format!("Symbols {} set to {}.", key, value));
    Ok(())
}

async fn banphrase(s: &mut Session, rest: &str) -> CommandResult {
    let (sub, phrase) = split_subcommand(rest);

    match sub.as_str() {
        "on" | "off" => {
            return toggle(s, &sub, "Banned phrase filter", |c| &mut c.filter_banned_phrases).await;
        }
        "add" => {
            if phrase.is_empty() {
                s.reply("Usage: filter banphrase add <phrase>");
                return Ok(());
            }
            if let Some(raw) = phrase.strip_prefix(REGEX_PREFIX)
                && let Err(e) = s.state.pattern(&format!("(?i){}", raw))
            {
                s.reply(format!("Bad pattern: {}", e));
                return Ok(());
            }
            if s.channel.filter_banned_phrases_patterns.iter().any(|p| p == phrase) {
                s.reply("That phrase is already banned.");
                return Ok(());
            }
            s.channel.filter_banned_phrases_patterns.push(phrase.to_string());
            s.save_channel().await?;
            s.reply(format!("Banned phrase added: {}", phrase));
        }
        "delete" | "remove" => {
            let before = s.channel.filter_banned_phrases_patterns.len();
            s.channel.filter_banned_phrases_patterns.retain(|p| p != phrase);
            if s.channel.filter_banned_phrases_patterns.len() == before {
                s.reply("That phrase is not banned.");
                return Ok(());
            }
            s.save_channel().await?;
            s.reply(format!("Banned phrase removed: {}", phrase));
        }
        "list" => {
            let reply = if s.channel.filter_banned_phrases_patterns.is_empty() {
                "There are no banned phrases.".to_string()
            } else {
                format!("Banned phrases: {}", s.channel.filter_banned_phrases_patterns.join(", "))
            };
            s.reply(reply);
        }
        "clear" => {
            s.channel.filter_banned_phrases_patterns.clear();
            s.save_channel().await?;
            s.reply("Banned phrases cleared.");
        }
        _ => s.reply("Usage: filter banphrase on|off|add|delete|list|clear"),
    }
    Ok(())
}

async fn permitted(s: &mut Session, rest: &str) -> CommandResult {
    let (sub, entry) = split_subcommand(rest);
    let (entry, _) = split_first(entry);
    let entry = entry.to_lowercase();

    match sub.as_str() {
        "add" if !entry.is_empty() => {
            if !s.channel.permitted_links.contains(&entry) {
                s.channel.permitted_links.push(entry.clone());
                s.save_channel().await?;
            }
            s.reply(format!("Links to {} are now allowed.", entry));
        }
        "delete" | "remove" if !entry.is_empty() => {
            let before = s.channel.permitted_links.len();
            s.channel.permitted_links.retain(|p| *p != entry);
            if s.channel.permitted_links.len() == before {
                s.reply(format!("{} was not allowed.", entry));
                return Ok(());
            }
            s.save_channel().await?;
            s.reply(format!("Links to {} are no longer allowed.", entry));
        }
        "list" => {
            let reply = if s.channel.permitted_links.is_empty() {
                "No links are allowed.".to_string()
            } else {
                format!("Allowed links: {}", s.channel.permitted_links.join(", "))
            };
            s.reply(reply);
        }
        _ => s.reply("Usage: filter pd add|delete|list <host[/path]>"),
    }
    Ok(())
}

async fn exempt_level(s: &mut Session, value: &str) -> CommandResult {
    if value.is_empty() {
        let reply = format!(
            "Filters exempt {} and above.",
            s.channel.filter_exempt_level.describe()
        );
        s.reply(reply);
        return Ok(());
    }

    let Some(level) = AccessLevel::parse_user_input(value) else {
        s.reply(format!("Unknown level {}.", value));
        return Ok(());
    };
    s.channel.filter_exempt_level = level;
    s.save_channel().await?;
    s.reply(format!("Filters now exempt {} and above.", level.describe()));
    Ok(())
}

/// Handle !permit: allow one link from a user.
pub async fn permit(s: &mut Session, args: &str) -> CommandResult {
    let (user, _) = split_first(args);
    let user = clean_username(user);
    if user.is_empty() {
        s.reply("Usage: permit <user>");
        return Ok(());
    }

    if s.rates.has_link_permit(&user).await? {
        s.reply(format!("{} may already post one link.", user));
        return Ok(());
    }
    s.rates.permit_link(&user, PERMIT_WINDOW).await?;
    s.reply(format!("{} may now post one link.", user));
    Ok(())
}
