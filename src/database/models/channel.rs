//! Channel model - one row per joined chat room.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::permissions::AccessLevel;

/// Default timeout applied by filters after a warning, in seconds.
pub const DEFAULT_TIMEOUT_SECS: i64 = 600;

/// A joined chat room and its settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Store-assigned row ID
    pub id: i64,

    /// Platform room ID
    pub twitch_id: i64,

    /// Room login name, lowercase, without `#`
    pub name: String,

    pub display_name: String,

    /// Bot identity assigned to this room
    pub bot_name: String,

    /// Deactivated rooms keep their data but are not served
    pub active: bool,

    pub prefix: String,

    /// Reply marker; the process default is used when unset
    pub bullet: Option<String>,

    /// Command cooldown override in seconds
    pub cooldown: Option<i64>,

    /// Minimum level allowed to run any command
    pub mode: AccessLevel,

    /// Monotonic count of messages seen in this room
    pub message_count: i64,

    pub custom_owners: Vec<String>,
    pub custom_mods: Vec<String>,
    pub custom_regulars: Vec<String>,
    pub ignored: Vec<String>,

    // Moderation
    pub should_moderate: bool,
    pub enable_filters: bool,
    pub filter_exempt_level: AccessLevel,
    pub timeout_duration: i64,

    pub filter_links: bool,
    /// Host/path globs that are always allowed
    pub permitted_links: Vec<String>,

    pub filter_caps: bool,
    pub filter_caps_min_chars: i64,
    pub filter_caps_min_caps: i64,
    pub filter_caps_percentage: i64,

    pub filter_symbols: bool,
    pub filter_symbols_min_symbols: i64,
    pub filter_symbols_percentage: i64,

    pub filter_me: bool,

    pub filter_banned_phrases: bool,
    pub filter_banned_phrases_patterns: Vec<String>,

    // Roll
    pub roll_level: AccessLevel,
    pub roll_cooldown: i64,
    pub roll_default: i64,

    pub raffle_enabled: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Channel {
    /// Create a new active channel with default settings.
    ///
    /// `id` is assigned by the store on insert.
    pub fn new(twitch_id: i64, name: &str, bot_name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            twitch_id,
            name: name.to_lowercase(),
            display_name: name.to_string(),
            bot_name: bot_name.to_lowercase(),
            active: true,
            prefix: "!".to_string(),
            bullet: None,
            cooldown: None,
            mode: AccessLevel::Everyone,
            message_count: 0,
            custom_owners: Vec::new(),
            custom_mods: Vec::new(),
            custom_regulars: Vec::new(),
            ignored: Vec::new(),
            should_moderate: true,
            enable_filters: false,
            filter_exempt_level: AccessLevel::Subscriber,
            timeout_duration: DEFAULT_TIMEOUT_SECS,
            filter_links: false,
            permitted_links: Vec::new(),
            filter_caps: false,
            filter_caps_min_chars: 8,
            filter_caps_min_caps: 6,
            filter_caps_percentage: 50,
            filter_symbols: false,
            filter_symbols_min_symbols: 5,
            filter_symbols_percentage: 50,
            filter_me: false,
            filter_banned_phrases: false,
            filter_banned_phrases_patterns: Vec::new(),
            roll_level: AccessLevel::Subscriber,
            roll_cooldown: 10,
            roll_default: 20,
            raffle_enabled: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Twitch-style IRC target for this room.
    pub fn irc_target(&self) -> String {
        format!("#{}", self.name)
    }

    /// Whether any filter should run for this room.
    pub fn filters_enabled(&self) -> bool {
        self.should_moderate && self.enable_filters
    }
}
