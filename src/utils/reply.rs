//! Reply formatting.

/// Prefix `text` with the channel bullet.
///
/// Replies that already start with an action marker (`/me ` or `.me `) are
/// sent verbatim.
pub fn format_reply(bullet: &str, text: &str) -> String {
    if text.starts_with("/me ") || text.starts_with(".me ") {
        text.to_string()
    } else {
        format!("{} {}", bullet, text)
    }
}
