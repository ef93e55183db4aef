//! Quote model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A numbered, channel-scoped quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: i64,
    pub channel_id: i64,
    pub num: i64,
    pub quote: String,
    pub creator: String,
    pub editor: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn new(channel_id: i64, num: i64, quote: &str, creator: &str) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            channel_id,
            num,
            quote: quote.to_string(),
            creator: creator.to_string(),
            editor: creator.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}
