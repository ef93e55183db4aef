//! Command metadata, custom command bodies and command lists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::permissions::AccessLevel;

/// What a named command runs.
///
/// A command points at exactly one body kind, which the enum enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum CommandTarget {
    Custom(i64),
    List(i64),
}

/// Metadata row for a named custom command or list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandInfo {
    pub id: i64,
    pub channel_id: i64,

    /// Unique per channel, stored lowercase
    pub name: String,

    pub access_level: AccessLevel,
    pub creator: String,
    pub editor: String,

    /// Successful invocations
    pub count: i64,

    pub target: Option<CommandTarget>,

    pub last_used: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommandInfo {
    pub fn new(channel_id: i64, name: &str, level: AccessLevel, creator: &str) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            channel_id,
            name: name.to_lowercase(),
            access_level: level,
            creator: creator.to_string(),
            editor: creator.to_string(),
            count: 0,
            target: None,
            last_used: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn custom_command_id(&self) -> Option<i64> {
        match self.target {
            Some(CommandTarget::Custom(id)) => Some(id),
            _ => None,
        }
    }

    pub fn command_list_id(&self) -> Option<i64> {
        match self.target {
            Some(CommandTarget::List(id)) => Some(id),
            _ => None,
        }
    }

    /// Record a successful invocation.
    pub fn mark_used(&mut self) {
        self.count += 1;
        self.last_used = Some(Utc::now());
    }

    /// Record an edit by `editor`.
    pub fn touch(&mut self, editor: &str) {
        self.editor = editor.to_string();
        self.updated_at = Utc::now();
    }
}

/// Stored body of a custom command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomCommand {
    pub id: i64,
    pub channel_id: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomCommand {
    pub fn new(channel_id: i64, message: &str) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            channel_id,
            message: message.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Ordered collection of bodies, invoked by index or at random.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandList {
    pub id: i64,
    pub channel_id: i64,
    pub items: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommandList {
    pub fn new(channel_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            channel_id,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
