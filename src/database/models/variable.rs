//! Variable model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A per-channel string variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub id: i64,
    pub channel_id: i64,
    pub name: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Variable {
    pub fn new(channel_id: i64, name: &str, value: &str) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            channel_id,
            name: name.to_string(),
            value: value.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a numeric delta to the string-encoded value.
    ///
    /// A value that is not an integer counts as zero.
    pub fn add(&mut self, delta: i64) -> i64 {
        let current = self.value.trim().parse::<i64>().unwrap_or(0);
        let next = current.saturating_add(delta);
        self.value = next.to_string();
        self.updated_at = Utc::now();
        next
    }
}
