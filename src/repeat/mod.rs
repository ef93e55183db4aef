//! Repeated and scheduled commands.
//!
//! Chat handlers publish add/update/remove events through a [`RepeatHandle`];
//! the [`Scheduler`] turns them into timers and calls a [`Firer`] when one
//! comes due.

mod cron;
mod scheduler;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::database::{RepeatedCommand, ScheduledCommand, Store};

pub use cron::{CronError, CronSchedule};
pub use scheduler::{RepeatKey, Scheduler, Trigger};

use scheduler::Update;

/// Spacing between repeats that had no phase anchor at startup.
const STAGGER_STRIDE: Duration = Duration::from_secs(5);

/// Runs one due repeat or schedule.
#[async_trait]
pub trait Firer: Send + Sync {
    async fn fire(&self, key: RepeatKey) -> Result<()>;
}

/// Cloneable sender side of the scheduler.
#[derive(Debug, Clone)]
pub struct RepeatHandle {
    tx: mpsc::UnboundedSender<Update>,
}

impl RepeatHandle {
    /// Create a scheduler and the handle that feeds it.
    pub fn channel() -> (Scheduler, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Scheduler::new(rx), Self { tx })
    }

    /// Handle whose events go nowhere.
    #[cfg(test)]
    pub fn detached() -> Self {
        let (_, handle) = Self::channel();
        handle
    }

    pub(crate) fn send(&self, update: Update) {
        if self.tx.send(update).is_err() {
            debug!("Repeat scheduler is not running, dropping update");
        }
    }

    /// Arm, re-arm or (when disabled) disarm a repeat.
    pub fn upsert_repeat(&self, repeat: &RepeatedCommand) {
        let key = RepeatKey::Repeat(repeat.id);
        if !repeat.enabled {
            return self.remove(key);
        }

        let delay = Duration::from_secs(repeat.delay.max(1) as u64);
        let first = first_delay(delay, repeat.init_timestamp, Utc::now());
        self.send(Update::Upsert(key, Trigger::Every { delay, first }));
    }

    /// Arm, re-arm or (when disabled) disarm a schedule.
    pub fn upsert_schedule(&self, schedule: &ScheduledCommand) -> Result<(), CronError> {
        let key = RepeatKey::Schedule(schedule.id);
        let cron: CronSchedule = schedule.cron_expression.parse()?;
        if schedule.enabled {
            self.send(Update::Upsert(key, Trigger::Cron(cron)));
        } else {
            self.remove(key);
        }
        Ok(())
    }

    pub fn remove(&self, key: RepeatKey) {
        self.send(Update::Remove(key));
    }
}

/// Time until the next `anchor + k * delay` strictly after `now`.
///
/// Without an anchor the first firing is one full delay away.
pub fn first_delay(delay: Duration, anchor: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
    let Some(anchor) = anchor else {
        return delay;
    };

    if anchor > now {
        return (anchor - now).to_std().unwrap_or(delay);
    }

    let period = delay.as_millis().max(1) as i64;
    let elapsed = (now - anchor).num_milliseconds();
    let remaining = period - elapsed % period;
    Duration::from_millis(remaining as u64)
}

/// Arm every enabled repeat and schedule in the store.
///
/// Repeats without a phase anchor get one, spaced [`STAGGER_STRIDE`] apart
/// so a restart does not fire them all at once.
pub async fn load_all(store: &dyn Store, handle: &RepeatHandle) -> Result<()> {
    let mut tx = store.begin().await?;
    let now = Utc::now();

    let mut repeats = 0;
    let mut staggered = 0u32;
    for mut repeat in tx.all_repeated_commands().await? {
        if !repeat.enabled {
            continue;
        }
        if repeat.init_timestamp.is_none() {
            let offset = chrono::Duration::from_std(STAGGER_STRIDE * staggered)?;
            repeat.init_timestamp = Some(now + offset);
            tx.update_repeated_command(&repeat).await?;
            staggered += 1;
        }
        handle.upsert_repeat(&repeat);
        repeats += 1;
    }

    let mut schedules = 0;
    for schedule in tx.all_scheduled_commands().await? {
        if !schedule.enabled {
            continue;
        }
        match handle.upsert_schedule(&schedule) {
            Ok(()) => schedules += 1,
            Err(e) => warn!("Skipping schedule {}: {}", schedule.id, e),
        }
    }

    tx.commit().await?;
    info!(
        "Loaded {} repeats ({} staggered) and {} schedules",
        repeats, staggered, schedules
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use chrono::TimeZone;

    #[test]
    fn first_delay_follows_anchor_phase() {
        let anchor = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let delay = Duration::from_secs(60);

        let now = anchor + chrono::Duration::seconds(130);
        assert_eq!(first_delay(delay, Some(anchor), now), Duration::from_secs(50));

        let now = anchor + chrono::Duration::seconds(120);
        assert_eq!(first_delay(delay, Some(anchor), now), Duration::from_secs(60));

        let now = anchor - chrono::Duration::seconds(7);
        assert_eq!(first_delay(delay, Some(anchor), now), Duration::from_secs(7));

        assert_eq!(first_delay(delay, None, now), delay);
    }

    #[tokio::test]
    async fn load_all_staggers_unanchored_repeats() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        for info in 1..=3 {
            let mut r = RepeatedCommand::new(1, info, 60, 1, "alice");
            r.init_timestamp = None;
            tx.insert_repeated_command(r).await.unwrap();
        }
        let mut off = RepeatedCommand::new(1, 4, 60, 1, "alice");
        off.enabled = false;
        off.init_timestamp = None;
        tx.insert_repeated_command(off).await.unwrap();
        tx.commit().await.unwrap();

        load_all(&store, &RepeatHandle::detached()).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let mut anchors: Vec<_> = tx
            .all_repeated_commands()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.enabled)
            .map(|r| r.init_timestamp.unwrap())
            .collect();
        anchors.sort();
        assert_eq!(anchors.len(), 3);
        assert_eq!((anchors[1] - anchors[0]).num_seconds(), 5);
        assert_eq!((anchors[2] - anchors[1]).num_seconds(), 5);

        let disabled = tx.repeated_command_by_info(4).await.unwrap().unwrap();
        assert!(disabled.init_timestamp.is_none());
    }
}
