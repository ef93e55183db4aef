//! Quill - command-processing chat bot engine.
//!
//! A multi-tenant bot for Twitch-style channels: per-channel custom commands
//! with an embedded template notation, lists, quotes, variables,
//! autoreplies, repeats and schedules, filters and moderation shortcuts.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `database` - Transactional store contract and the in-memory store
//! - `ratelimit` - Expiring marks, counters and sets
//! - `cache` - Caches for parsed command bodies and patterns
//! - `cbp` - Template notation parser and evaluator
//! - `permissions` - Access levels
//! - `bot` - Message pipeline, sessions and transports
//! - `plugins` - Builtin command handlers
//! - `events` - Filters and autoreplies
//! - `repeat` - Repeat and schedule engine
//! - `utils` - Utility functions

mod bot;
mod cache;
mod cbp;
mod config;
mod database;
mod events;
mod permissions;
mod plugins;
mod ratelimit;
mod repeat;
mod utils;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bot::console::{self, ConsoleSender};
use bot::{AppState, LogNotifier, NoTwitchApi, Services};
use config::Config;
use database::MemoryStore;
use ratelimit::MemoryRateStore;
use repeat::{Firer, RepeatHandle};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Capacity of the inbound message queue.
const INBOUND_QUEUE: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quill=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting quill...");

    let config = Config::from_env()?;
    info!("Configuration loaded for bot {}", config.bot_name);
    if config.admins.is_empty() {
        info!("No admins configured (ADMINS is empty)");
    } else {
        info!("Admins: {:?}", config.admins);
    }

    let store = match &config.data_file {
        Some(path) => {
            info!("Loading store from {}", path.display());
            MemoryStore::open(path).await?
        }
        None => {
            warn!("DATA_FILE not set, nothing will be persisted");
            MemoryStore::new()
        }
    };
    let store = Arc::new(store);
    let rates = Arc::new(MemoryRateStore::new());
    let snapshot_interval = config.snapshot_interval;

    let (scheduler, repeats) = RepeatHandle::channel();
    let services = Services {
        store: store.clone(),
        rates: rates.clone(),
        sender: Arc::new(ConsoleSender::default()),
        notifier: Arc::new(LogNotifier),
        twitch: Arc::new(NoTwitchApi),
    };
    let state = AppState::new(config, services, repeats.clone());

    let cancel = CancellationToken::new();
    let ctrlc_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            ctrlc_token.cancel();
        }
    });

    // Arm stored repeats before the scheduler starts draining updates
    repeat::load_all(store.as_ref(), &repeats).await?;
    let firer: Arc<dyn Firer> = Arc::new(state.clone());
    let scheduler_task = tokio::spawn(scheduler.run(firer, cancel.clone()));

    let maintenance_task = tokio::spawn(maintenance(
        store.clone(),
        rates.clone(),
        snapshot_interval,
        cancel.clone(),
    ));

    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
    let console_task = tokio::spawn(console::run(
        state.config.clone(),
        state.store.clone(),
        inbound_tx,
        cancel.clone(),
    ));

    bot::runtime::run(state, inbound_rx, cancel.clone()).await;
    cancel.cancel();

    match console_task.await {
        Ok(Err(e)) => error!("Console transport failed: {:#}", e),
        Err(e) => error!("Console task failed: {}", e),
        Ok(Ok(())) => {}
    }
    if let Err(e) = scheduler_task.await {
        error!("Scheduler task failed: {}", e);
    }
    if let Err(e) = maintenance_task.await {
        error!("Maintenance task failed: {}", e);
    }

    store.save().await?;
    info!("Shutdown complete");
    Ok(())
}

/// Periodically snapshot the store and drop expired rate entries.
async fn maintenance(
    store: Arc<MemoryStore>,
    rates: Arc<MemoryRateStore>,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = store.save().await {
                    error!("Snapshot failed: {:#}", e);
                }
                let swept = rates.sweep();
                if swept > 0 {
                    tracing::debug!("Swept {} expired rate entries", swept);
                }
            }
        }
    }
}
