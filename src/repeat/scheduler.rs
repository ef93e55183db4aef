//! Single-loop timer driver for repeats and schedules.
//!
//! The scheduler owns a min-heap of `(deadline, key, generation)` entries.
//! Replacing or removing an entry bumps its generation, so stale heap slots
//! are skipped when they come due instead of being searched for and removed.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::cron::CronSchedule;
use super::Firer;

/// Identifies one repeat or schedule record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RepeatKey {
    Repeat(i64),
    Schedule(i64),
}

impl RepeatKey {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Repeat(_) => "repeat",
            Self::Schedule(_) => "schedule",
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Self::Repeat(id) | Self::Schedule(id) => *id,
        }
    }
}

/// When an entry fires.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Every `delay`, first after `first`.
    Every { delay: Duration, first: Duration },
    Cron(CronSchedule),
}

#[derive(Debug)]
pub(crate) enum Update {
    Upsert(RepeatKey, Trigger),
    Remove(RepeatKey),
}

struct Entry {
    trigger: Trigger,
    generation: u64,
}

pub struct Scheduler {
    updates: mpsc::UnboundedReceiver<Update>,
    heap: BinaryHeap<Reverse<(Instant, RepeatKey, u64)>>,
    entries: HashMap<RepeatKey, Entry>,
    generation: u64,
}

fn cron_deadline(schedule: &CronSchedule) -> Option<Instant> {
    let now = Utc::now();
    let next = schedule.next_after(now)?;
    let wait = (next - now).to_std().unwrap_or_default();
    Some(Instant::now() + wait)
}

impl Scheduler {
    pub(crate) fn new(updates: mpsc::UnboundedReceiver<Update>) -> Self {
        Self {
            updates,
            heap: BinaryHeap::new(),
            entries: HashMap::new(),
            generation: 0,
        }
    }

    /// Number of armed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn apply(&mut self, update: Update) {
        match update {
            Update::Upsert(key, trigger) => {
                self.generation += 1;
                let generation = self.generation;

                let deadline = match &trigger {
                    Trigger::Every { first, .. } => Some(Instant::now() + *first),
                    Trigger::Cron(schedule) => cron_deadline(schedule),
                };

                match deadline {
                    Some(at) => {
                        debug!("Armed {:?}", key);
                        self.heap.push(Reverse((at, key, generation)));
                        self.entries.insert(key, Entry { trigger, generation });
                    }
                    None => {
                        warn!("{:?} never fires, not arming", key);
                        self.entries.remove(&key);
                    }
                }
            }
            Update::Remove(key) => {
                if self.entries.remove(&key).is_some() {
                    debug!("Disarmed {:?}", key);
                }
            }
        }
    }

    /// Pop every due entry, spawn its firing and re-arm it.
    fn fire_due(&mut self, firer: &Arc<dyn Firer>, cancel: &CancellationToken) {
        let now = Instant::now();

        while let Some(Reverse((at, key, generation))) = self.heap.peek().copied() {
            if at > now {
                break;
            }
            self.heap.pop();

            let Some(entry) = self.entries.get(&key) else {
                continue;
            };
            if entry.generation != generation {
                continue;
            }

            let firer = firer.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    result = firer.fire(key) => {
                        if let Err(e) = result {
                            error!("Firing {:?} failed: {:#}", key, e);
                        }
                    }
                }
            });

            let next = match &entry.trigger {
                Trigger::Every { delay, .. } => {
                    let mut next = at + *delay;
                    // Skip slots missed while the loop was busy
                    while next <= now {
                        next += *delay;
                    }
                    Some(next)
                }
                Trigger::Cron(schedule) => cron_deadline(schedule),
            };

            match next {
                Some(next) => self.heap.push(Reverse((next, key, generation))),
                None => {
                    self.entries.remove(&key);
                }
            }
        }
    }

    /// Drive timers until `cancel` fires.
    pub async fn run(mut self, firer: Arc<dyn Firer>, cancel: CancellationToken) {
        info!("Repeat scheduler started");
        let mut open = true;

        loop {
            let next = self.heap.peek().map(|Reverse((at, _, _))| *at);
            let due = async move {
                match next {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                update = self.updates.recv(), if open => match update {
                    Some(update) => self.apply(update),
                    None => open = false,
                },
                _ = due => self.fire_due(&firer, &cancel),
            }
        }

        info!("Repeat scheduler stopped with {} entries armed", self.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repeat::RepeatHandle;
    use anyhow::Result;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        fired: Mutex<Vec<RepeatKey>>,
    }

    #[async_trait]
    impl Firer for Recorder {
        async fn fire(&self, key: RepeatKey) -> Result<()> {
            self.fired.lock().push(key);
            if key.id() == 13 {
                anyhow::bail!("unlucky");
            }
            Ok(())
        }
    }

    fn start() -> (RepeatHandle, Arc<Recorder>, CancellationToken, tokio::task::JoinHandle<()>) {
        let (scheduler, handle) = RepeatHandle::channel();
        let recorder = Arc::new(Recorder::default());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(scheduler.run(recorder.clone(), cancel.clone()));
        (handle, recorder, cancel, task)
    }

    fn every(secs: u64) -> Trigger {
        Trigger::Every {
            delay: Duration::from_secs(secs),
            first: Duration::from_secs(secs),
        }
    }

    fn count(recorder: &Recorder, key: RepeatKey) -> usize {
        recorder.fired.lock().iter().filter(|k| **k == key).count()
    }

    #[tokio::test(start_paused = true)]
    async fn fires_on_delay() {
        let (handle, recorder, cancel, task) = start();
        let key = RepeatKey::Repeat(1);
        handle.send(Update::Upsert(key, every(30)));

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(count(&recorder, key), 3);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn upsert_replaces_and_remove_disarms() {
        let (handle, recorder, cancel, task) = start();
        let a = RepeatKey::Repeat(1);
        let b = RepeatKey::Schedule(2);

        handle.send(Update::Upsert(a, every(30)));
        handle.send(Update::Upsert(a, every(100)));
        handle.send(Update::Upsert(b, every(10)));

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(count(&recorder, a), 0);
        assert_eq!(count(&recorder, b), 3);

        handle.send(Update::Remove(b));
        tokio::time::sleep(Duration::from_secs(70)).await;
        assert_eq!(count(&recorder, a), 1);
        assert_eq!(count(&recorder, b), 3);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failures_keep_the_cadence() {
        let (handle, recorder, cancel, task) = start();
        let key = RepeatKey::Repeat(13);
        handle.send(Update::Upsert(key, every(30)));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(count(&recorder, key), 2);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_cancel() {
        let (handle, recorder, cancel, task) = start();
        handle.send(Update::Upsert(RepeatKey::Repeat(1), every(30)));

        cancel.cancel();
        task.await.unwrap();

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(recorder.fired.lock().is_empty());
    }
}
