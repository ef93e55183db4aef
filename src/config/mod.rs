//! Configuration module for the quill bot.
//!
//! Loads configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// Where seen message IDs are kept.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DedupMode {
    /// Process-local expiring set
    #[default]
    Memory,
    /// Expiring keys in the shared rate store
    Shared,
    /// Every message is treated as new
    None,
}

impl FromStr for DedupMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "shared" => Ok(Self::Shared),
            "none" | "off" => Ok(Self::None),
            other => bail!("unknown DEDUP_MODE '{}'", other),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Login of the bot account; messages it sends are ignored
    pub bot_name: String,

    /// Usernames with Admin level in every channel
    pub admins: Vec<String>,

    // Channel defaults
    pub default_bullet: String,
    pub default_prefix: String,
    pub default_cooldown: Duration,

    // Deduplication
    pub dedup_mode: DedupMode,
    pub dedup_window: Duration,

    /// JSON snapshot for the in-process store
    pub data_file: Option<PathBuf>,
    pub snapshot_interval: Duration,

    // Console transport
    pub console_channel: String,
    pub console_user: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_name: "quill".to_string(),
            admins: Vec::new(),
            default_bullet: "[quill]".to_string(),
            default_prefix: "!".to_string(),
            default_cooldown: Duration::from_secs(5),
            dedup_mode: DedupMode::Memory,
            dedup_window: Duration::from_secs(300),
            data_file: None,
            snapshot_interval: Duration::from_secs(60),
            console_channel: "quill".to_string(),
            console_user: "console".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let secs = |key: &str, default: Duration| -> Result<Duration> {
            match get(key) {
                Some(v) => {
                    let n: u64 = v
                        .parse()
                        .with_context(|| format!("{} must be a number of seconds, got '{}'", key, v))?;
                    Ok(Duration::from_secs(n))
                }
                None => Ok(default),
            }
        };

        let bot_name = get("BOT_NAME")
            .map(|s| s.trim_start_matches('@').to_lowercase())
            .unwrap_or(defaults.bot_name);

        // Parse admin usernames
        let admins = get("ADMINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().trim_start_matches('@').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let dedup_mode = match get("DEDUP_MODE") {
            Some(v) => v.parse()?,
            None => DedupMode::Memory,
        };

        let dedup_window = secs("DEDUP_TTL_SECS", defaults.dedup_window)?;
        if dedup_window.is_zero() && dedup_mode != DedupMode::None {
            bail!("DEDUP_TTL_SECS must be positive");
        }

        Ok(Self {
            console_channel: get("CONSOLE_CHANNEL")
                .map(|s| s.trim_start_matches('#').to_lowercase())
                .unwrap_or_else(|| bot_name.clone()),
            bot_name,
            admins,
            default_bullet: get("DEFAULT_BULLET").unwrap_or(defaults.default_bullet),
            default_prefix: get("DEFAULT_PREFIX").unwrap_or(defaults.default_prefix),
            default_cooldown: secs("DEFAULT_COOLDOWN", defaults.default_cooldown)?,
            dedup_mode,
            dedup_window,
            data_file: get("DATA_FILE").map(PathBuf::from),
            snapshot_interval: secs("SNAPSHOT_INTERVAL_SECS", defaults.snapshot_interval)?,
            console_user: get("CONSOLE_USER")
                .map(|s| s.to_lowercase())
                .unwrap_or(defaults.console_user),
        })
    }
}
