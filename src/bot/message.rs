//! Inbound chat message model.

/// Platform role badges attached to a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Badges {
    pub broadcaster: bool,
    pub moderator: bool,
    pub subscriber: bool,
    pub founder: bool,
    pub vip: bool,
}

impl Badges {
    /// Parse a Twitch `badges` tag value, e.g. `broadcaster/1,subscriber/12`.
    pub fn parse(tag: &str) -> Self {
        let mut badges = Self::default();
        for badge in tag.split(',') {
            let name = badge.split('/').next().unwrap_or_default();
            match name {
                "broadcaster" => badges.broadcaster = true,
                "moderator" => badges.moderator = true,
                "subscriber" => badges.subscriber = true,
                "founder" => badges.founder = true,
                "vip" => badges.vip = true,
                _ => {}
            }
        }
        badges
    }
}

/// A message delivered by the inbound transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatMessage {
    /// Unique message ID, used for deduplication
    pub id: String,

    /// Platform room ID of the channel
    pub room_id: String,

    /// Channel login, without `#`
    pub channel: String,

    /// Sender login
    pub user: String,
    pub user_id: String,
    pub display_name: String,

    pub badges: Badges,

    /// The `mod` tag, set independently of the badge
    pub is_mod: bool,

    pub text: String,

    /// Sent with `/me`
    pub is_action: bool,
}

impl ChatMessage {
    /// Whether the message carries what the engine needs to process it.
    pub fn is_processable(&self) -> bool {
        !self.id.trim().is_empty() && !self.room_id.trim().is_empty()
    }

    /// Numeric room ID, if well-formed.
    pub fn room_twitch_id(&self) -> Option<i64> {
        self.room_id.trim().parse().ok()
    }

    /// Display name, falling back to the login.
    pub fn display(&self) -> &str {
        if self.display_name.is_empty() {
            &self.user
        } else {
            &self.display_name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_badge_tag() {
        let b = Badges::parse("broadcaster/1,subscriber/12,glhf-pledge/1");
        assert!(b.broadcaster && b.subscriber);
        assert!(!b.moderator && !b.vip && !b.founder);
        assert_eq!(Badges::parse(""), Badges::default());
    }

    #[test]
    fn requires_id_and_room() {
        let mut msg = ChatMessage {
            id: "abc".into(),
            room_id: "123".into(),
            ..Default::default()
        };
        assert!(msg.is_processable());
        assert_eq!(msg.room_twitch_id(), Some(123));

        msg.room_id.clear();
        assert!(!msg.is_processable());

        msg.room_id = "nope".into();
        assert!(msg.is_processable());
        assert_eq!(msg.room_twitch_id(), None);
    }
}
