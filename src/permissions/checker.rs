//! User level resolution.

use tracing::debug;

use crate::bot::ChatMessage;
use crate::database::Channel;

use super::AccessLevel;

/// Resolves the access level of a message sender.
///
/// Configured admins bypass all restrictions in every channel.
#[derive(Debug, Clone, Default)]
pub struct Permissions {
    /// Admin usernames, lowercase.
    admins: Vec<String>,
}

impl Permissions {
    /// Create a new resolver with the configured admin usernames.
    pub fn with_admins(admins: Vec<String>) -> Self {
        Self {
            admins: admins.into_iter().map(|a| a.to_lowercase()).collect(),
        }
    }

    /// Check if a user is a configured admin.
    #[inline]
    pub fn is_admin(&self, user: &str) -> bool {
        self.admins.iter().any(|a| a.eq_ignore_ascii_case(user))
    }

    /// Compute the level of the sender of `msg`.
    ///
    /// `channel` is `None` when the message arrived in a room the bot has no
    /// row for; only platform badges count there.
    pub fn user_level(&self, msg: &ChatMessage, channel: Option<&Channel>) -> AccessLevel {
        let user = msg.user.as_str();

        if self.is_admin(user) {
            debug!("User {} is admin", user);
            return AccessLevel::Admin;
        }

        let (owners, mods, regulars): (&[String], &[String], &[String]) = match channel {
            Some(c) => (&c.custom_owners, &c.custom_mods, &c.custom_regulars),
            None => (&[], &[], &[]),
        };

        if msg.badges.broadcaster || msg.user_id == msg.room_id || contains_user(owners, user) {
            return AccessLevel::Broadcaster;
        }

        if msg.badges.moderator || msg.is_mod || contains_user(mods, user) {
            return AccessLevel::Moderator;
        }

        if msg.badges.subscriber
            || msg.badges.founder
            || msg.badges.vip
            || contains_user(regulars, user)
        {
            return AccessLevel::Subscriber;
        }

        AccessLevel::Everyone
    }

    /// Whether the channel ignores this user. Broadcasters and above are never ignored.
    pub fn is_ignored(&self, level: AccessLevel, user: &str, channel: &Channel) -> bool {
        if level.can_access(AccessLevel::Broadcaster) {
            return false;
        }
        contains_user(&channel.ignored, user)
    }
}

fn contains_user(list: &[String], user: &str) -> bool {
    list.iter().any(|u| u.eq_ignore_ascii_case(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::message::Badges;

    fn message(user: &str, user_id: &str) -> ChatMessage {
        ChatMessage {
            id: "m1".into(),
            room_id: "100".into(),
            channel: "streamer".into(),
            user: user.into(),
            user_id: user_id.into(),
            display_name: user.into(),
            badges: Badges::default(),
            is_mod: false,
            text: "hi".into(),
            is_action: false,
        }
    }

    #[test]
    fn admins_win() {
        let perms = Permissions::with_admins(vec!["Root".into()]);
        assert_eq!(perms.user_level(&message("root", "5"), None), AccessLevel::Admin);
    }

    #[test]
    fn room_owner_is_broadcaster() {
        let perms = Permissions::default();
        assert_eq!(
            perms.user_level(&message("streamer", "100"), None),
            AccessLevel::Broadcaster
        );
    }

    #[test]
    fn badges_and_custom_lists() {
        let perms = Permissions::default();
        let mut channel = Channel::new(100, "streamer", "quill");
        channel.custom_regulars.push("friend".into());
        channel.custom_mods.push("helper".into());

        let mut sub = message("viewer", "7");
        sub.badges.subscriber = true;
        assert_eq!(perms.user_level(&sub, Some(&channel)), AccessLevel::Subscriber);
        assert_eq!(
            perms.user_level(&message("friend", "8"), Some(&channel)),
            AccessLevel::Subscriber
        );
        assert_eq!(
            perms.user_level(&message("helper", "9"), Some(&channel)),
            AccessLevel::Moderator
        );
        assert_eq!(
            perms.user_level(&message("random", "10"), Some(&channel)),
            AccessLevel::Everyone
        );
    }

    #[test]
    fn ignore_list_spares_broadcasters() {
        let perms = Permissions::default();
        let mut channel = Channel::new(100, "streamer", "quill");
        channel.ignored.push("spammer".into());
        channel.ignored.push("streamer".into());
        assert!(perms.is_ignored(AccessLevel::Everyone, "Spammer", &channel));
        assert!(!perms.is_ignored(AccessLevel::Broadcaster, "streamer", &channel));
    }
}
