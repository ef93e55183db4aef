//! Repeated and scheduled command records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shortest allowed repeat delay.
pub const MIN_REPEAT_DELAY_SECS: i64 = 30;

/// A command re-run on a fixed delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatedCommand {
    pub id: i64,
    pub channel_id: i64,
    pub command_info_id: i64,
    pub enabled: bool,

    /// Seconds between firings, at least [`MIN_REPEAT_DELAY_SECS`]
    pub delay: i64,

    /// Messages that must arrive between two firings, at least 1
    pub message_diff: i64,

    /// Channel message count at the last firing
    pub last_count: i64,

    /// Phase anchor; firings land on `init_timestamp + k * delay`
    pub init_timestamp: Option<DateTime<Utc>>,

    pub creator: String,
    pub editor: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RepeatedCommand {
    pub fn new(channel_id: i64, command_info_id: i64, delay: i64, message_diff: i64, creator: &str) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            channel_id,
            command_info_id,
            enabled: true,
            delay,
            message_diff,
            last_count: 0,
            init_timestamp: Some(now),
            creator: creator.to_string(),
            editor: creator.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A command re-run on a cron expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledCommand {
    pub id: i64,
    pub channel_id: i64,
    pub command_info_id: i64,
    pub enabled: bool,
    pub cron_expression: String,
    pub message_diff: i64,
    pub last_count: i64,
    pub creator: String,
    pub editor: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledCommand {
    pub fn new(channel_id: i64, command_info_id: i64, cron_expression: &str, message_diff: i64, creator: &str) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            channel_id,
            command_info_id,
            enabled: true,
            cron_expression: cron_expression.to_string(),
            message_diff,
            last_count: 0,
            creator: creator.to_string(),
            editor: creator.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}
