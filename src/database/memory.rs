//! In-process store.
//!
//! Committed rows live behind a short-lived read/write lock that is never held
//! across an await. A transaction buffers its writes in its own change set and
//! applies them on commit; dropping it discards them. Writes and `*_for_update`
//! reads take a row lock that is held until the transaction ends, so two
//! transactions only wait on each other when they touch the same rows. Named
//! keys (a command or variable name in a channel) are locked the same way so
//! that concurrent inserts cannot both succeed. Tables can be loaded from and
//! saved to a JSON file.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::models::{
    Autoreply, Channel, CommandInfo, CommandList, CommandTarget, CustomCommand, Quote,
    RepeatedCommand, ScheduledCommand, Variable,
};
use super::store::{Store, Transaction};

/// Longest wait for a row lock before the transaction gives up.
const LOCK_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tables {
    next_id: i64,
    channels: BTreeMap<i64, Channel>,
    command_infos: BTreeMap<i64, CommandInfo>,
    custom_commands: BTreeMap<i64, CustomCommand>,
    command_lists: BTreeMap<i64, CommandList>,
    repeated_commands: BTreeMap<i64, RepeatedCommand>,
    scheduled_commands: BTreeMap<i64, ScheduledCommand>,
    autoreplies: BTreeMap<i64, Autoreply>,
    quotes: BTreeMap<i64, Quote>,
    variables: BTreeMap<i64, Variable>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Uncommitted writes of one transaction. `None` marks a deleted row.
#[derive(Default)]
struct Changes {
    channels: BTreeMap<i64, Option<Channel>>,
    command_infos: BTreeMap<i64, Option<CommandInfo>>,
    custom_commands: BTreeMap<i64, Option<CustomCommand>>,
    command_lists: BTreeMap<i64, Option<CommandList>>,
    repeated_commands: BTreeMap<i64, Option<RepeatedCommand>>,
    scheduled_commands: BTreeMap<i64, Option<ScheduledCommand>>,
    autoreplies: BTreeMap<i64, Option<Autoreply>>,
    quotes: BTreeMap<i64, Option<Quote>>,
    variables: BTreeMap<i64, Option<Variable>>,
}

impl Changes {
    fn apply(mut self, tables: &mut Tables) {
        merge::<Channel>(&mut self, tables);
        merge::<CommandInfo>(&mut self, tables);
        merge::<CustomCommand>(&mut self, tables);
        merge::<CommandList>(&mut self, tables);
        merge::<RepeatedCommand>(&mut self, tables);
        merge::<ScheduledCommand>(&mut self, tables);
        merge::<Autoreply>(&mut self, tables);
        merge::<Quote>(&mut self, tables);
        merge::<Variable>(&mut self, tables);
    }
}

fn merge<T: Row>(changes: &mut Changes, tables: &mut Tables) {
    let committed = T::committed_mut(tables);
    for (id, row) in std::mem::take(T::pending_mut(changes)) {
        match row {
            Some(row) => committed.insert(id, row),
            None => committed.remove(&id),
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Table {
    Channels,
    CommandInfos,
    CustomCommands,
    CommandLists,
    RepeatedCommands,
    ScheduledCommands,
    Autoreplies,
    Quotes,
    Variables,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LockKey {
    Row(Table, i64),
    /// A unique key that may not have a row yet.
    Key(Table, i64, String),
}

/// A table row the transaction machinery can buffer and lock.
trait Row: Clone + Send + Sync + 'static {
    const TABLE: Table;

    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
    fn committed(tables: &Tables) -> &BTreeMap<i64, Self>;
    fn committed_mut(tables: &mut Tables) -> &mut BTreeMap<i64, Self>;
    fn pending(changes: &Changes) -> &BTreeMap<i64, Option<Self>>;
    fn pending_mut(changes: &mut Changes) -> &mut BTreeMap<i64, Option<Self>>;
}

macro_rules! rows {
    ($($model:ty => $table:ident, $field:ident;)*) => {
        $(
            impl Row for $model {
                const TABLE: Table = Table::$table;

                fn id(&self) -> i64 {
                    self.id
                }

                fn set_id(&mut self, id: i64) {
                    self.id = id;
                }

                fn committed(tables: &Tables) -> &BTreeMap<i64, Self> {
                    &tables.$field
                }

                fn committed_mut(tables: &mut Tables) -> &mut BTreeMap<i64, Self> {
                    &mut tables.$field
                }

                fn pending(changes: &Changes) -> &BTreeMap<i64, Option<Self>> {
                    &changes.$field
                }

                fn pending_mut(changes: &mut Changes) -> &mut BTreeMap<i64, Option<Self>> {
                    &mut changes.$field
                }
            }
        )*
    };
}

rows! {
    Channel => Channels, channels;
    CommandInfo => CommandInfos, command_infos;
    CustomCommand => CustomCommands, custom_commands;
    CommandList => CommandLists, command_lists;
    RepeatedCommand => RepeatedCommands, repeated_commands;
    ScheduledCommand => ScheduledCommands, scheduled_commands;
    Autoreply => Autoreplies, autoreplies;
    Quote => Quotes, quotes;
    Variable => Variables, variables;
}

#[derive(Default)]
struct Shared {
    tables: RwLock<Tables>,
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
}

/// Store kept entirely in memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
    snapshot: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by a JSON snapshot file.
    ///
    /// A missing file yields an empty store; the file is created on the first save.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("failed to parse snapshot {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No snapshot at {}, starting empty", path.display());
                Tables::default()
            }
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
        };

        Ok(Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(tables),
                locks: DashMap::new(),
            }),
            snapshot: Some(path),
        })
    }

    /// Write committed state to the snapshot file, if one is configured.
    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };

        let bytes = {
            let tables = self.shared.tables.read();
            serde_json::to_vec_pretty(&*tables)?
        };

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path).await?;
        debug!("Snapshot saved to {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        Ok(Box::new(MemoryTransaction {
            shared: self.shared.clone(),
            changes: Changes::default(),
            held: HashMap::new(),
        }))
    }
}

struct MemoryTransaction {
    shared: Arc<Shared>,
    changes: Changes,
    held: HashMap<LockKey, OwnedMutexGuard<()>>,
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        for (key, guard) in self.held.drain() {
            drop(guard);
            // Only the map itself still points at an idle lock
            self.shared
                .locks
                .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}

fn next_num(nums: impl Iterator<Item = i64>) -> i64 {
    nums.max().unwrap_or(0) + 1
}

impl MemoryTransaction {
    async fn lock(&mut self, key: LockKey) -> Result<()> {
        if self.held.contains_key(&key) {
            return Ok(());
        }
        let lock = Arc::clone(&self.shared.locks.entry(key.clone()).or_default());
        let guard = tokio::time::timeout(LOCK_WAIT, lock.lock_owned())
            .await
            .map_err(|_| {
                warn!("Gave up waiting for {:?}", key);
                anyhow!("timed out waiting for {:?}", key)
            })?;
        self.held.insert(key, guard);
        Ok(())
    }

    async fn lock_row<T: Row>(&mut self, id: i64) -> Result<()> {
        self.lock(LockKey::Row(T::TABLE, id)).await
    }

    async fn lock_key<T: Row>(&mut self, scope: i64, key: &str) -> Result<()> {
        self.lock(LockKey::Key(T::TABLE, scope, key.to_lowercase())).await
    }

    fn get<T: Row>(&self, id: i64) -> Option<T> {
        if let Some(row) = T::pending(&self.changes).get(&id) {
            return row.clone();
        }
        let tables = self.shared.tables.read();
        T::committed(&tables).get(&id).cloned()
    }

    /// Rows visible to this transaction, ordered by id.
    fn scan<T: Row>(&self, keep: impl Fn(&T) -> bool) -> Vec<T> {
        let pending = T::pending(&self.changes);
        let mut rows: Vec<T> = {
            let tables = self.shared.tables.read();
            T::committed(&tables)
                .values()
                .filter(|r| !pending.contains_key(&r.id()) && keep(*r))
                .cloned()
                .collect()
        };
        rows.extend(pending.values().flatten().filter(|r| keep(*r)).cloned());
        rows.sort_by_key(|r| r.id());
        rows
    }

    fn find<T: Row>(&self, keep: impl Fn(&T) -> bool) -> Option<T> {
        self.scan(keep).into_iter().next()
    }

    async fn get_for_update<T: Row>(&mut self, id: i64) -> Result<Option<T>> {
        self.lock_row::<T>(id).await?;
        Ok(self.get(id))
    }

    /// Lock whichever row `keep` finds, then read it again under the lock.
    async fn find_for_update<T: Row>(&mut self, keep: impl Fn(&T) -> bool) -> Result<Option<T>> {
        let Some(row) = self.find::<T>(&keep) else {
            return Ok(None);
        };
        Ok(self.get_for_update::<T>(row.id()).await?.filter(|r| keep(r)))
    }

    fn insert<T: Row>(&mut self, mut row: T) -> T {
        let id = self.shared.tables.write().allocate_id();
        row.set_id(id);
        T::pending_mut(&mut self.changes).insert(id, Some(row.clone()));
        row
    }

    async fn update<T: Row>(&mut self, row: &T, what: &str) -> Result<()> {
        self.lock_row::<T>(row.id()).await?;
        if self.get::<T>(row.id()).is_none() {
            bail!("{} {} not found", what, row.id());
        }
        T::pending_mut(&mut self.changes).insert(row.id(), Some(row.clone()));
        Ok(())
    }

    async fn remove<T: Row>(&mut self, id: i64) -> Result<()> {
        self.lock_row::<T>(id).await?;
        T::pending_mut(&mut self.changes).insert(id, None);
        Ok(())
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn channel_by_twitch_id(&mut self, twitch_id: i64) -> Result<Option<Channel>> {
        Ok(self.find(|c: &Channel| c.twitch_id == twitch_id))
    }

    async fn channel_by_name(&mut self, name: &str) -> Result<Option<Channel>> {
        Ok(self.find(|c: &Channel| c.name.eq_ignore_ascii_case(name)))
    }

    async fn channel_for_update(&mut self, id: i64) -> Result<Option<Channel>> {
        self.get_for_update(id).await
    }

    async fn insert_channel(&mut self, channel: Channel) -> Result<Channel> {
        self.lock_key::<Channel>(channel.twitch_id, "").await?;
        if self.channel_by_twitch_id(channel.twitch_id).await?.is_some() {
            bail!("channel {} already exists", channel.twitch_id);
        }
        Ok(self.insert(channel))
    }

    async fn update_channel(&mut self, channel: &Channel) -> Result<()> {
        self.update(channel, "channel").await
    }

    async fn active_channels(&mut self) -> Result<Vec<Channel>> {
        Ok(self.scan(|c: &Channel| c.active))
    }

    async fn count_active_channels(&mut self) -> Result<i64> {
        Ok(self.scan(|c: &Channel| c.active).len() as i64)
    }

    async fn command_info(&mut self, channel_id: i64, name: &str) -> Result<Option<CommandInfo>> {
        Ok(self.find(|i: &CommandInfo| {
            i.channel_id == channel_id && i.name.eq_ignore_ascii_case(name)
        }))
    }

    async fn command_info_for_update(
        &mut self,
        channel_id: i64,
        name: &str,
    ) -> Result<Option<CommandInfo>> {
        self.lock_key::<CommandInfo>(channel_id, name).await?;
        self.find_for_update(|i: &CommandInfo| {
            i.channel_id == channel_id && i.name.eq_ignore_ascii_case(name)
        })
        .await
    }

    async fn command_info_by_id(&mut self, id: i64) -> Result<Option<CommandInfo>> {
        Ok(self.get(id))
    }

    async fn command_infos(&mut self, channel_id: i64) -> Result<Vec<CommandInfo>> {
        let mut infos = self.scan(|i: &CommandInfo| i.channel_id == channel_id);
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    async fn insert_command_info(&mut self, mut info: CommandInfo) -> Result<CommandInfo> {
        info.name = info.name.to_lowercase();
        self.lock_key::<CommandInfo>(info.channel_id, &info.name).await?;
        if self.command_info(info.channel_id, &info.name).await?.is_some() {
            bail!("command {} already exists", info.name);
        }
        Ok(self.insert(info))
    }

    async fn update_command_info(&mut self, info: &CommandInfo) -> Result<()> {
        self.update(info, "command").await
    }

    async fn delete_command_info(&mut self, id: i64) -> Result<()> {
        let Some(info) = self.get_for_update::<CommandInfo>(id).await? else {
            bail!("command {} not found", id);
        };
        self.remove::<CommandInfo>(id).await?;
        match info.target {
            Some(CommandTarget::Custom(body)) => self.remove::<CustomCommand>(body).await?,
            Some(CommandTarget::List(list)) => self.remove::<CommandList>(list).await?,
            None => {}
        }
        for r in self.scan(|r: &RepeatedCommand| r.command_info_id == id) {
            self.remove::<RepeatedCommand>(r.id).await?;
        }
        for sc in self.scan(|sc: &ScheduledCommand| sc.command_info_id == id) {
            self.remove::<ScheduledCommand>(sc.id).await?;
        }
        Ok(())
    }

    async fn custom_command(&mut self, id: i64) -> Result<Option<CustomCommand>> {
        Ok(self.get(id))
    }

    async fn insert_custom_command(&mut self, command: CustomCommand) -> Result<CustomCommand> {
        Ok(self.insert(command))
    }

    async fn update_custom_command(&mut self, command: &CustomCommand) -> Result<()> {
        self.update(command, "custom command").await
    }

    async fn command_list(&mut self, id: i64) -> Result<Option<CommandList>> {
        Ok(self.get(id))
    }

    async fn command_list_for_update(&mut self, id: i64) -> Result<Option<CommandList>> {
        self.get_for_update(id).await
    }

    async fn insert_command_list(&mut self, list: CommandList) -> Result<CommandList> {
        Ok(self.insert(list))
    }

    async fn update_command_list(&mut self, list: &CommandList) -> Result<()> {
        self.update(list, "command list").await
    }

    async fn repeated_command(&mut self, id: i64) -> Result<Option<RepeatedCommand>> {
        Ok(self.get(id))
    }

    async fn repeated_command_for_update(&mut self, id: i64) -> Result<Option<RepeatedCommand>> {
        self.get_for_update(id).await
    }

    async fn repeated_command_by_info(&mut self, info_id: i64) -> Result<Option<RepeatedCommand>> {
        Ok(self.find(|r: &RepeatedCommand| r.command_info_id == info_id))
    }

    async fn repeated_commands(&mut self, channel_id: i64) -> Result<Vec<RepeatedCommand>> {
        Ok(self.scan(|r: &RepeatedCommand| r.channel_id == channel_id))
    }

    async fn all_repeated_commands(&mut self) -> Result<Vec<RepeatedCommand>> {
        Ok(self.scan(|_: &RepeatedCommand| true))
    }

    async fn insert_repeated_command(&mut self, repeat: RepeatedCommand) -> Result<RepeatedCommand> {
        self.lock_key::<RepeatedCommand>(repeat.command_info_id, "").await?;
        if self.repeated_command_by_info(repeat.command_info_id).await?.is_some() {
            bail!("command {} already repeats", repeat.command_info_id);
        }
        Ok(self.insert(repeat))
    }

    async fn update_repeated_command(&mut self, repeat: &RepeatedCommand) -> Result<()> {
        self.update(repeat, "repeat").await
    }

    async fn delete_repeated_command(&mut self, id: i64) -> Result<()> {
        self.remove::<RepeatedCommand>(id).await
    }

    async fn scheduled_command(&mut self, id: i64) -> Result<Option<ScheduledCommand>> {
        Ok(self.get(id))
    }

    async fn scheduled_command_for_update(&mut self, id: i64) -> Result<Option<ScheduledCommand>> {
        self.get_for_update(id).await
    }

    async fn scheduled_command_by_info(
        &mut self,
        info_id: i64,
    ) -> Result<Option<ScheduledCommand>> {
        Ok(self.find(|sc: &ScheduledCommand| sc.command_info_id == info_id))
    }

    async fn scheduled_commands(&mut self, channel_id: i64) -> Result<Vec<ScheduledCommand>> {
        Ok(self.scan(|sc: &ScheduledCommand| sc.channel_id == channel_id))
    }

    async fn all_scheduled_commands(&mut self) -> Result<Vec<ScheduledCommand>> {
        Ok(self.scan(|_: &ScheduledCommand| true))
    }

    async fn insert_scheduled_command(
        &mut self,
        schedule: ScheduledCommand,
    ) -> Result<ScheduledCommand> {
        self.lock_key::<ScheduledCommand>(schedule.command_info_id, "").await?;
        if self
            .scheduled_command_by_info(schedule.command_info_id)
            .await?
            .is_some()
        {
            bail!("command {} already scheduled", schedule.command_info_id);
        }
        Ok(self.insert(schedule))
    }

    async fn update_scheduled_command(&mut self, schedule: &ScheduledCommand) -> Result<()> {
        self.update(schedule, "schedule").await
    }

    async fn delete_scheduled_command(&mut self, id: i64) -> Result<()> {
        self.remove::<ScheduledCommand>(id).await
    }

    async fn autoreplies(&mut self, channel_id: i64) -> Result<Vec<Autoreply>> {
        let mut rows = self.scan(|a: &Autoreply| a.channel_id == channel_id);
        rows.sort_by_key(|a| a.num);
        Ok(rows)
    }

    async fn autoreply_for_update(&mut self, channel_id: i64, num: i64) -> Result<Option<Autoreply>> {
        self.find_for_update(|a: &Autoreply| a.channel_id == channel_id && a.num == num)
            .await
    }

    async fn insert_autoreply(&mut self, mut autoreply: Autoreply) -> Result<Autoreply> {
        let channel_id = autoreply.channel_id;
        self.lock_key::<Autoreply>(channel_id, "").await?;
        autoreply.num = next_num(
            self.scan(|a: &Autoreply| a.channel_id == channel_id)
                .into_iter()
                .map(|a| a.num),
        );
        Ok(self.insert(autoreply))
    }

    async fn update_autoreply(&mut self, autoreply: &Autoreply) -> Result<()> {
        self.update(autoreply, "autoreply").await
    }

    async fn delete_autoreply(&mut self, id: i64) -> Result<()> {
        self.remove::<Autoreply>(id).await
    }

    async fn quotes(&mut self, channel_id: i64) -> Result<Vec<Quote>> {
        let mut rows = self.scan(|q: &Quote| q.channel_id == channel_id);
        rows.sort_by_key(|q| q.num);
        Ok(rows)
    }

    async fn quote_for_update(&mut self, channel_id: i64, num: i64) -> Result<Option<Quote>> {
        self.find_for_update(|q: &Quote| q.channel_id == channel_id && q.num == num)
            .await
    }

    async fn insert_quote(&mut self, mut quote: Quote) -> Result<Quote> {
        let channel_id = quote.channel_id;
        self.lock_key::<Quote>(channel_id, "").await?;
        quote.num = next_num(
            self.scan(|q: &Quote| q.channel_id == channel_id)
                .into_iter()
                .map(|q| q.num),
        );
        Ok(self.insert(quote))
    }

    async fn update_quote(&mut self, quote: &Quote) -> Result<()> {
        self.update(quote, "quote").await
    }

    async fn delete_quote(&mut self, id: i64) -> Result<()> {
        self.remove::<Quote>(id).await
    }

    async fn variable(&mut self, channel_id: i64, name: &str) -> Result<Option<Variable>> {
        Ok(self.find(|v: &Variable| v.channel_id == channel_id && v.name == name))
    }

    async fn variable_for_update(&mut self, channel_id: i64, name: &str) -> Result<Option<Variable>> {
        self.lock_key::<Variable>(channel_id, name).await?;
        self.find_for_update(|v: &Variable| v.channel_id == channel_id && v.name == name)
            .await
    }

    async fn upsert_variable(&mut self, mut variable: Variable) -> Result<Variable> {
        let channel_id = variable.channel_id;
        let existing = self.variable_for_update(channel_id, &variable.name).await?;
        match existing {
            Some(row) => {
                variable.id = row.id;
                self.update(&variable, "variable").await?;
                Ok(variable)
            }
            None => Ok(self.insert(variable)),
        }
    }

    async fn delete_variable(&mut self, channel_id: i64, name: &str) -> Result<bool> {
        match self.variable_for_update(channel_id, name).await? {
            Some(row) => {
                self.remove::<Variable>(row.id).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut this = self;
        let changes = std::mem::take(&mut this.changes);
        changes.apply(&mut this.shared.tables.write());
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
