//! Autoreply model - regex trigger plus response body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Autoreply {
    pub id: i64,
    pub channel_id: i64,

    /// Position within the channel, scanned in ascending order
    pub num: i64,

    /// Compiled regular expression source
    pub trigger: String,

    /// Pattern as the user typed it
    pub orig_pattern: String,

    /// Response body in CBP notation
    pub response: String,

    pub count: i64,
    pub creator: String,
    pub editor: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Autoreply {
    pub fn new(channel_id: i64, num: i64, trigger: &str, orig_pattern: &str, response: &str, creator: &str) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            channel_id,
            num,
            trigger: trigger.to_string(),
            orig_pattern: orig_pattern.to_string(),
            response: response.to_string(),
            count: 0,
            creator: creator.to_string(),
            editor: creator.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}
