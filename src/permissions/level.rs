//! Access levels.
//!
//! A small total order of privilege tiers plus a disjoint `Admin` tier
//! that bypasses every check.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Privilege tier required to use or modify something.
///
/// Stored at rest as a lowercase enum string, compared numerically at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum AccessLevel {
    #[default]
    Unknown,
    Everyone,
    Subscriber,
    Moderator,
    Broadcaster,
    Admin,
}

impl AccessLevel {
    fn rank(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Everyone => 1,
            Self::Subscriber => 2,
            Self::Moderator => 3,
            Self::Broadcaster => 4,
            Self::Admin => 5,
        }
    }

    /// Check whether a user at this level may use something requiring `required`.
    ///
    /// `Admin` always passes, `Unknown` on either side always fails.
    pub fn can_access(self, required: AccessLevel) -> bool {
        if self == Self::Admin {
            return true;
        }
        if self == Self::Unknown || required == Self::Unknown {
            return false;
        }
        self.rank() >= required.rank()
    }

    /// The at-rest string for this level.
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Everyone => "everyone",
            Self::Subscriber => "subscriber",
            Self::Moderator => "moderator",
            Self::Broadcaster => "broadcaster",
            Self::Admin => "admin",
        }
    }

    /// Decode an at-rest string.
    ///
    /// # Panics
    /// Panics on an unrecognized value. That only happens when stored data and
    /// code disagree, which is not a condition this crate recovers from.
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "unknown" => Self::Unknown,
            "everyone" => Self::Everyone,
            "subscriber" => Self::Subscriber,
            "moderator" => Self::Moderator,
            "broadcaster" => Self::Broadcaster,
            "admin" => Self::Admin,
            other => panic!("unknown access level at rest: {other:?}"),
        }
    }

    /// Parse a level as typed by a user in chat (`mods`, `subs`, `owner`, ...).
    pub fn parse_user_input(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "everyone" | "all" | "everybody" | "normal" | "e" => Some(Self::Everyone),
            "subscriber" | "subscribers" | "subs" | "sub" | "regular" | "regulars" | "regs"
            | "reg" | "s" => Some(Self::Subscriber),
            "moderator" | "moderators" | "mods" | "mod" | "m" => Some(Self::Moderator),
            "broadcaster" | "broadcasters" | "owner" | "owners" | "streamer" | "streamers"
            | "b" | "o" => Some(Self::Broadcaster),
            "admin" | "admins" | "a" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Human-readable plural used in replies ("restricted to moderators and above").
    pub fn describe(self) -> &'static str {
        match self {
            Self::Unknown => "nobody",
            Self::Everyone => "everyone",
            Self::Subscriber => "subscribers",
            Self::Moderator => "moderators",
            Self::Broadcaster => "broadcasters",
            Self::Admin => "admins",
        }
    }
}

impl From<AccessLevel> for String {
    fn from(level: AccessLevel) -> Self {
        level.as_db_str().to_string()
    }
}

impl From<String> for AccessLevel {
    fn from(s: String) -> Self {
        Self::from_db_str(&s)
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}
