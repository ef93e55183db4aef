//! Console transport.
//!
//! Reads chat lines from stdin and prints outbound messages to stdout, so the
//! engine can be driven without a chat connection. A line is sent by the
//! configured console user to the configured console channel; `@name text`
//! sends as another user, `@name:badges text` attaches a badge tag such as
//! `moderator/1,subscriber/12`, and `/me text` sends an action.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::database::Store;

use super::external::Sender;
use super::message::{Badges, ChatMessage};

/// Room ID used for the console channel until it has a channel row.
const HOME_ROOM_ID: i64 = 1;

/// Prints outbound messages as `#target <origin> message`.
#[derive(Debug)]
pub struct ConsoleSender {
    out: Mutex<tokio::io::Stdout>,
}

impl Default for ConsoleSender {
    fn default() -> Self {
        Self {
            out: Mutex::new(tokio::io::stdout()),
        }
    }
}

#[async_trait]
impl Sender for ConsoleSender {
    async fn send_message(&self, origin: &str, target: &str, message: &str) -> Result<()> {
        let line = format!("{} <{}> {}\n", target, origin, message);
        let mut out = self.out.lock().await;
        out.write_all(line.as_bytes()).await?;
        out.flush().await?;
        Ok(())
    }
}

/// One parsed console line.
#[derive(Debug, PartialEq, Eq)]
struct Line<'a> {
    user: &'a str,
    badges: Badges,
    text: &'a str,
    is_action: bool,
}

/// Split an input line into sender, badges and text.
fn parse_line<'a>(line: &'a str, default_user: &'a str) -> Line<'a> {
    let line = line.trim();
    let (who, text) = match line.strip_prefix('@') {
        Some(rest) => rest.split_once(' ').unwrap_or((rest, "")),
        None => (default_user, line),
    };
    let (user, badges) = match who.split_once(':') {
        Some((user, tag)) => (user, Badges::parse(tag)),
        None => (who, Badges::default()),
    };
    let (text, is_action) = match text.strip_prefix("/me ") {
        Some(action) => (action.trim(), true),
        None => (text.trim(), false),
    };
    Line {
        user,
        badges,
        text,
        is_action,
    }
}

/// Stable numeric ID for a console username.
fn console_user_id(user: &str) -> i64 {
    let hash = user
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    1_000_000 + hash as i64
}

/// Read stdin until EOF or cancellation, forwarding each line to `inbound`.
pub async fn run(
    config: Arc<Config>,
    store: Arc<dyn Store>,
    inbound: mpsc::Sender<ChatMessage>,
    cancel: CancellationToken,
) -> Result<()> {
    let channel = config.console_channel.clone();
    info!("Console attached to #{} as {}", channel, config.console_user);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut seq: u64 = 0;

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            debug!("Console input closed");
            break;
        };

        let Line {
            user,
            badges,
            text,
            is_action,
        } = parse_line(&line, &config.console_user);
        if text.is_empty() {
            continue;
        }

        seq += 1;
        let room_id = room_id(store.as_ref(), &channel, &config).await?;
        let msg = ChatMessage {
            id: format!("console-{}-{}", std::process::id(), seq),
            room_id: room_id.to_string(),
            channel: channel.clone(),
            user: user.to_lowercase(),
            user_id: console_user_id(&user.to_lowercase()).to_string(),
            display_name: user.to_string(),
            badges,
            text: text.to_string(),
            is_action,
            ..Default::default()
        };

        if inbound.send(msg).await.is_err() {
            break;
        }
    }
    Ok(())
}

/// Resolve the console channel's room ID from its channel row.
async fn room_id(store: &dyn Store, channel: &str, config: &Config) -> Result<i64> {
    let mut tx = store.begin().await?;
    let found = tx.channel_by_name(channel).await?;
    tx.rollback().await?;

    Ok(match found {
        Some(c) => c.twitch_id,
        None if channel == config.bot_name => HOME_ROOM_ID,
        None => console_user_id(channel),
    })
}
