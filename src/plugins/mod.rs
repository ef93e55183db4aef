//! Builtin command handlers.
//!
//! Add new builtins by:
//! 1. Creating a new file in this directory
//! 2. Adding `pub mod your_plugin;` below
//! 3. Adding a [`Handler`] variant, a row in [`Builtins::new`] and an arm in
//!    [`Builtin::run`]

pub mod admin;
pub mod autoreply;
pub mod command;
pub mod filter;
pub mod fun;
pub mod help;
pub mod list;
pub mod moderation;
pub mod quote;
pub mod raffle;
pub mod repeat;
pub mod settings;
pub mod stream;
pub mod users;
pub mod var;

use std::collections::HashMap;

use crate::bot::{CommandResult, Session};
use crate::permissions::AccessLevel;

/// Which handler a builtin runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Command,
    Commands,
    Builtin,
    List,
    Quote,
    Var,
    Autoreply,
    Raffle,
    Repeat,
    Schedule,
    Set,
    Filter,
    Permit,
    UserList,
    Moderation,
    Join,
    Leave,
    Admin,
    Status,
    Game,
    Uptime,
    Viewers,
    Chatters,
    IsLive,
    Roll,
    Conch,
    Random,
    Help,
}

/// One entry in the builtin table.
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub handler: Handler,
    pub min_level: AccessLevel,
    pub skip_cooldown: bool,
}

impl Builtin {
    const fn new(name: &'static str, handler: Handler, min_level: AccessLevel) -> Self {
        Self {
            name,
            handler,
            min_level,
            skip_cooldown: false,
        }
    }

    const fn no_cooldown(mut self) -> Self {
        self.skip_cooldown = true;
        self
    }

    /// Run the handler. Level and cooldown checks are the caller's job.
    pub async fn run(&self, s: &mut Session, name: &str, args: &str) -> CommandResult {
        match self.handler {
            Handler::Command => command::command(s, args).await,
            Handler::Commands => command::commands(s, args).await,
            Handler::Builtin => command::builtin(s, args).await,
            Handler::List => list::list(s, args).await,
            Handler::Quote => quote::quote(s, args).await,
            Handler::Var => var::var(s, args).await,
            Handler::Autoreply => autoreply::autoreply(s, args).await,
            Handler::Raffle => raffle::raffle(s, args).await,
            Handler::Repeat => repeat::repeat(s, args).await,
            Handler::Schedule => repeat::schedule(s, args).await,
            Handler::Set => settings::set(s, args).await,
            Handler::Filter => filter::filter(s, args).await,
            Handler::Permit => filter::permit(s, args).await,
            Handler::UserList => users::user_list(s, name, args).await,
            Handler::Moderation => moderation::moderation(s, name, args).await,
            Handler::Join => admin::join(s, args).await,
            Handler::Leave => admin::leave(s, args).await,
            Handler::Admin => admin::admin(s, args).await,
            Handler::Status => stream::status(s, args).await,
            Handler::Game => stream::game(s, args).await,
            Handler::Uptime => stream::uptime(s, args).await,
            Handler::Viewers => stream::viewers(s, args).await,
            Handler::Chatters => stream::chatters(s, args).await,
            Handler::IsLive => stream::islive(s, args).await,
            Handler::Roll => fun::roll(s, args).await,
            Handler::Conch => fun::conch(s, args).await,
            Handler::Random => fun::random(s, args).await,
            Handler::Help => help::help(s, args).await,
        }
    }
}

/// Immutable builtin table, built once at startup.
#[derive(Debug, Clone)]
pub struct Builtins {
    table: HashMap<&'static str, Builtin>,
}

impl Default for Builtins {
    fn default() -> Self {
        Self::new()
    }
}

impl Builtins {
    /// Build the table.
    ///
    /// # Panics
    /// Panics on an empty or non-lowercase name, a duplicate name, or an
    /// `Unknown` level.
    pub fn new() -> Self {
        use AccessLevel::*;

        let entries = [
            Builtin::new("command", Handler::Command, Moderator),
            Builtin::new("commands", Handler::Commands, Everyone),
            Builtin::new("builtin", Handler::Builtin, Everyone).no_cooldown(),
            Builtin::new("list", Handler::List, Moderator),
            Builtin::new("quote", Handler::Quote, Everyone),
            Builtin::new("var", Handler::Var, Moderator),
            Builtin::new("autoreply", Handler::Autoreply, Moderator),
            Builtin::new("raffle", Handler::Raffle, Everyone),
            Builtin::new("repeat", Handler::Repeat, Moderator),
            Builtin::new("schedule", Handler::Schedule, Moderator),
            Builtin::new("set", Handler::Set, Moderator),
            Builtin::new("setting", Handler::Set, Moderator),
            Builtin::new("filter", Handler::Filter, Moderator),
            Builtin::new("permit", Handler::Permit, Moderator),
            Builtin::new("allow", Handler::Permit, Moderator),
            Builtin::new("owner", Handler::UserList, Broadcaster),
            Builtin::new("mod", Handler::UserList, Broadcaster),
            Builtin::new("regular", Handler::UserList, Moderator),
            Builtin::new("ignore", Handler::UserList, Moderator),
            Builtin::new("+b", Handler::Moderation, Moderator),
            Builtin::new("-b", Handler::Moderation, Moderator),
            Builtin::new("+t", Handler::Moderation, Moderator),
            Builtin::new("-t", Handler::Moderation, Moderator),
            Builtin::new("+p", Handler::Moderation, Moderator),
            Builtin::new("+m", Handler::Moderation, Moderator),
            Builtin::new("-m", Handler::Moderation, Moderator),
            Builtin::new("+s", Handler::Moderation, Moderator),
            Builtin::new("-s", Handler::Moderation, Moderator),
            Builtin::new("clear", Handler::Moderation, Moderator),
            // Level checks for join/leave depend on where they are used
            Builtin::new("join", Handler::Join, Everyone).no_cooldown(),
            Builtin::new("leave", Handler::Leave, Everyone).no_cooldown(),
            Builtin::new("part", Handler::Leave, Everyone).no_cooldown(),
            Builtin::new("admin", Handler::Admin, Admin),
            Builtin::new("status", Handler::Status, Everyone),
            Builtin::new("game", Handler::Game, Everyone),
            Builtin::new("uptime", Handler::Uptime, Everyone),
            Builtin::new("viewers", Handler::Viewers, Everyone),
            Builtin::new("chatters", Handler::Chatters, Everyone),
            Builtin::new("islive", Handler::IsLive, Everyone),
            Builtin::new("roll", Handler::Roll, Everyone).no_cooldown(),
            Builtin::new("conch", Handler::Conch, Everyone),
            Builtin::new("helix", Handler::Conch, Everyone),
            Builtin::new("random", Handler::Random, Everyone),
            Builtin::new("bothelp", Handler::Help, Everyone),
            Builtin::new("help", Handler::Help, Everyone),
        ];

        let mut table = HashMap::with_capacity(entries.len());
        for entry in entries {
            assert!(!entry.name.is_empty(), "builtin with empty name");
            assert_eq!(
                entry.name,
                entry.name.to_lowercase(),
                "builtin name must be lowercase"
            );
            assert!(
                entry.min_level != AccessLevel::Unknown,
                "builtin {} has unknown level",
                entry.name
            );
            let previous = table.insert(entry.name, entry);
            assert!(previous.is_none(), "duplicate builtin {}", entry.name);
        }

        Self { table }
    }

    pub fn get(&self, name: &str) -> Option<&Builtin> {
        self.table.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_consistent() {
        let builtins = Builtins::new();
        assert!(builtins.contains("command"));
        assert!(builtins.contains("+b"));
        assert!(!builtins.contains("Command"));

        let roll = builtins.get("roll").unwrap();
        assert!(roll.skip_cooldown);
        assert_eq!(builtins.get("owner").unwrap().min_level, AccessLevel::Broadcaster);
        assert_eq!(builtins.get("list").unwrap().min_level, AccessLevel::Moderator);
    }
}
