//! Argument parsing helpers shared by the builtins.

use std::time::Duration;

/// Split off the first whitespace-delimited token.
///
/// Returns `(first, rest)` with `rest` trimmed; both are empty for blank input.
pub fn split_first(input: &str) -> (&str, &str) {
    let input = input.trim();
    match input.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim()),
        None => (input, ""),
    }
}

/// Split the first token and lowercase it, for subcommand matching.
pub fn split_subcommand(input: &str) -> (String, &str) {
    let (first, rest) = split_first(input);
    (first.to_lowercase(), rest)
}

/// Parse duration string (e.g., "90", "30s", "10m", "1h", "1d").
///
/// A bare number is seconds. Supported units:
/// - s: seconds
/// - m: minutes
/// - h: hours
/// - d: days
/// - w: weeks
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(secs) = input.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let (digits, unit) = input.split_at(input.len() - 1);
    let amount: u64 = digits.parse().ok()?;

    let seconds = match unit {
        "s" => amount,
        "m" => amount * 60,
        "h" => amount * 3600,
        "d" => amount * 86400,
        "w" => amount * 604800,
        _ => return None,
    };

    Some(Duration::from_secs(seconds))
}

/// Human-readable duration, e.g. `2 hours, 5 minutes`.
pub fn format_duration(secs: u64) -> String {
    fn unit(n: u64, name: &str) -> String {
        if n == 1 {
            format!("1 {}", name)
        } else {
            format!("{} {}s", n, name)
        }
    }

    if secs < 60 {
        unit(secs, "second")
    } else if secs < 3600 {
        unit(secs / 60, "minute")
    } else if secs < 86400 {
        let mins = (secs % 3600) / 60;
        if mins > 0 {
            format!("{}, {}", unit(secs / 3600, "hour"), unit(mins, "minute"))
        } else {
            unit(secs / 3600, "hour")
        }
    } else {
        let hours = (secs % 86400) / 3600;
        if hours > 0 {
            format!("{}, {}", unit(secs / 86400, "day"), unit(hours, "hour"))
        } else {
            unit(secs / 86400, "day")
        }
    }
}

/// Parse an on/off style toggle.
pub fn parse_toggle(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "on" | "enable" | "enabled" | "true" | "yes" | "1" => Some(true),
        "off" | "disable" | "disabled" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Percent-encode text for use in a URL query.
pub fn query_escape(input: &str) -> String {
    url::form_urlencoded::byte_serialize(input.as_bytes()).collect()
}

/// Strip a leading `@` and lowercase a username argument.
pub fn clean_username(input: &str) -> String {
    input.trim().trim_start_matches('@').to_lowercase()
}
