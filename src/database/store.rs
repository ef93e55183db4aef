//! Transactional repository contract.
//!
//! Every read and write made while handling one message (or one repeat
//! firing) goes through a single [`Transaction`]. Reads that precede a write
//! of the same row use the `*_for_update` variants, which take a row lock on
//! stores that support one. A channel row is locked before any row that
//! belongs to it.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{
    Autoreply, Channel, CommandInfo, CommandList, CustomCommand, Quote, RepeatedCommand,
    ScheduledCommand, Variable,
};

/// Entry point into the relational store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a new transaction.
    async fn begin(&self) -> Result<Box<dyn Transaction>>;
}

/// One open transaction.
///
/// Dropping a transaction without calling [`Transaction::commit`] rolls it back.
#[async_trait]
pub trait Transaction: Send {
    // Channels
    async fn channel_by_twitch_id(&mut self, twitch_id: i64) -> Result<Option<Channel>>;
    async fn channel_by_name(&mut self, name: &str) -> Result<Option<Channel>>;
    async fn channel_for_update(&mut self, id: i64) -> Result<Option<Channel>>;
    async fn insert_channel(&mut self, channel: Channel) -> Result<Channel>;
    async fn update_channel(&mut self, channel: &Channel) -> Result<()>;
    async fn active_channels(&mut self) -> Result<Vec<Channel>>;
    async fn count_active_channels(&mut self) -> Result<i64>;

    // Command metadata
    async fn command_info(&mut self, channel_id: i64, name: &str) -> Result<Option<CommandInfo>>;
    async fn command_info_for_update(
        &mut self,
        channel_id: i64,
        name: &str,
    ) -> Result<Option<CommandInfo>>;
    async fn command_info_by_id(&mut self, id: i64) -> Result<Option<CommandInfo>>;
    async fn command_infos(&mut self, channel_id: i64) -> Result<Vec<CommandInfo>>;
    async fn insert_command_info(&mut self, info: CommandInfo) -> Result<CommandInfo>;
    async fn update_command_info(&mut self, info: &CommandInfo) -> Result<()>;
    /// Delete a command together with its body and any repeat or schedule.
    async fn delete_command_info(&mut self, id: i64) -> Result<()>;

    // Bodies
    async fn custom_command(&mut self, id: i64) -> Result<Option<CustomCommand>>;
    async fn insert_custom_command(&mut self, command: CustomCommand) -> Result<CustomCommand>;
    async fn update_custom_command(&mut self, command: &CustomCommand) -> Result<()>;

    async fn command_list(&mut self, id: i64) -> Result<Option<CommandList>>;
    async fn command_list_for_update(&mut self, id: i64) -> Result<Option<CommandList>>;
    async fn insert_command_list(&mut self, list: CommandList) -> Result<CommandList>;
    async fn update_command_list(&mut self, list: &CommandList) -> Result<()>;

    // Repeats
    async fn repeated_command(&mut self, id: i64) -> Result<Option<RepeatedCommand>>;
    async fn repeated_command_for_update(&mut self, id: i64) -> Result<Option<RepeatedCommand>>;
    async fn repeated_command_by_info(&mut self, info_id: i64) -> Result<Option<RepeatedCommand>>;
    async fn repeated_commands(&mut self, channel_id: i64) -> Result<Vec<RepeatedCommand>>;
    async fn all_repeated_commands(&mut self) -> Result<Vec<RepeatedCommand>>;
    async fn insert_repeated_command(&mut self, repeat: RepeatedCommand) -> Result<RepeatedCommand>;
    async fn update_repeated_command(&mut self, repeat: &RepeatedCommand) -> Result<()>;
    async fn delete_repeated_command(&mut self, id: i64) -> Result<()>;

    // Schedules
    async fn scheduled_command(&mut self, id: i64) -> Result<Option<ScheduledCommand>>;
    async fn scheduled_command_for_update(&mut self, id: i64) -> Result<Option<ScheduledCommand>>;
    async fn scheduled_command_by_info(&mut self, info_id: i64) -> Result<Option<ScheduledCommand>>;
    async fn scheduled_commands(&mut self, channel_id: i64) -> Result<Vec<ScheduledCommand>>;
    async fn all_scheduled_commands(&mut self) -> Result<Vec<ScheduledCommand>>;
    async fn insert_scheduled_command(
        &mut self,
        schedule: ScheduledCommand,
    ) -> Result<ScheduledCommand>;
    async fn update_scheduled_command(&mut self, schedule: &ScheduledCommand) -> Result<()>;
    async fn delete_scheduled_command(&mut self, id: i64) -> Result<()>;

    // Autoreplies, ascending by `num`
    async fn autoreplies(&mut self, channel_id: i64) -> Result<Vec<Autoreply>>;
    async fn autoreply_for_update(&mut self, channel_id: i64, num: i64) -> Result<Option<Autoreply>>;
    /// Insert with `num` set to one past the current maximum.
    async fn insert_autoreply(&mut self, autoreply: Autoreply) -> Result<Autoreply>;
    async fn update_autoreply(&mut self, autoreply: &Autoreply) -> Result<()>;
    async fn delete_autoreply(&mut self, id: i64) -> Result<()>;

    // Quotes, ascending by `num`
    async fn quotes(&mut self, channel_id: i64) -> Result<Vec<Quote>>;
    async fn quote_for_update(&mut self, channel_id: i64, num: i64) -> Result<Option<Quote>>;
    /// Insert with `num` set to one past the current maximum.
    async fn insert_quote(&mut self, quote: Quote) -> Result<Quote>;
    async fn update_quote(&mut self, quote: &Quote) -> Result<()>;
    async fn delete_quote(&mut self, id: i64) -> Result<()>;

    // Variables
    async fn variable(&mut self, channel_id: i64, name: &str) -> Result<Option<Variable>>;
    async fn variable_for_update(&mut self, channel_id: i64, name: &str) -> Result<Option<Variable>>;
    async fn upsert_variable(&mut self, variable: Variable) -> Result<Variable>;
    /// Returns whether a variable was removed.
    async fn delete_variable(&mut self, channel_id: i64, name: &str) -> Result<bool>;

    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}
