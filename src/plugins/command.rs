//! Custom command management.
//!
//! `!command add|edit|delete|restrict|rename|clone|exec|get`, `!commands` and
//! `!builtin`. Lists share the delete/restrict/rename paths through [`Kind`].

use tracing::info;

use crate::bot::{CommandResult, Session, body_is_privileged, run_custom};
use crate::database::{CommandInfo, CommandTarget, CustomCommand};
use crate::permissions::AccessLevel;
use crate::repeat::RepeatKey;
use crate::utils::{split_first, split_subcommand};

/// Which kind of stored command a management handler works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Kind {
    Command,
    List,
}

impl Kind {
    pub(super) fn noun(self) -> &'static str {
        match self {
            Self::Command => "Command",
            Self::List => "List",
        }
    }

    fn owns(self, info: &CommandInfo) -> bool {
        match self {
            Self::Command => info.custom_command_id().is_some(),
            Self::List => info.command_list_id().is_some(),
        }
    }
}

/// Handle !command.
pub async fn command(s: &mut Session, args: &str) -> CommandResult {
    let (sub, rest) = split_subcommand(args);

    match sub.as_str() {
        "add" => add(s, rest, None).await,
        "adde" => add(s, rest, Some(AccessLevel::Everyone)).await,
        "adds" => add(s, rest, Some(AccessLevel::Subscriber)).await,
        "addm" => add(s, rest, Some(AccessLevel::Moderator)).await,
        "addb" | "addo" => add(s, rest, Some(AccessLevel::Broadcaster)).await,
        "edit" => edit(s, rest).await,
        "delete" | "remove" => delete_info(s, rest, Kind::Command).await,
        "restrict" => restrict_info(s, rest, Kind::Command).await,
        "rename" => rename_info(s, rest, Kind::Command).await,
        "clone" => clone(s, rest).await,
        "exec" => exec(s, rest).await,
        "get" => get(s, rest).await,
        _ => {
            s.reply("Usage: command add|edit|delete|restrict|rename|clone|exec|get ...");
            Ok(())
        }
    }
}

/// Authoring warnings for a body: malformed markers, and whether it is privileged.
fn inspect_body(s: &Session, body: &str) -> (bool, Option<String>) {
    match s.state.parse_body(body) {
        Ok(tree) => (body_is_privileged(&tree), None),
        Err(e) => (false, Some(format!("Warning: {}.", e))),
    }
}

fn join_warnings(mut reply: String, warnings: &[String]) -> String {
    for w in warnings {
        reply.push(' ');
        reply.push_str(w);
    }
    reply
}

async fn add(s: &mut Session, rest: &str, forced: Option<AccessLevel>) -> CommandResult {
    let (name, body) = split_first(rest);
    let name = name.to_lowercase();
    if name.is_empty() || body.is_empty() {
        s.reply("Usage: command add <name> <text>");
        return Ok(());
    }

    let mut warnings = Vec::new();
    if s.state.builtins.contains(&name) {
        warnings.push(format!(
            "Warning: {} is a builtin command and will only run via {}builtin {}.",
            name, s.channel.prefix, name
        ));
    }

    let (privileged, parse_warning) = inspect_body(s, body);
    warnings.extend(parse_warning);

    let level = match forced {
        Some(level) => level,
        None if privileged => AccessLevel::Moderator,
        None => AccessLevel::Subscriber,
    };

    if !s.user_is(level) {
        let reply = format!(
            "Your level is {}; you cannot create a command with level {}.",
            s.user_level(),
            level
        );
        s.reply(reply);
        return Ok(());
    }

    let channel_id = s.channel.id;
    if s.tx().command_info(channel_id, &name).await?.is_some() {
        let reply = format!(
            "Command {}{} already exists, use command edit to change it.",
            s.channel.prefix, name
        );
        s.reply(reply);
        return Ok(());
    }

    let body = s.tx().insert_custom_command(CustomCommand::new(channel_id, body)).await?;
    let mut info = CommandInfo::new(channel_id, &name, level, &s.actor.name);
    info.target = Some(CommandTarget::Custom(body.id));
    s.tx().insert_command_info(info).await?;

    info!("{} added command {} in {}", s.actor.name, name, s.channel.name);

    let reply = format!(
        "Command {}{} added, restricted to {} and above.",
        s.channel.prefix,
        name,
        level.describe()
    );
    s.reply(join_warnings(reply, &warnings));
    Ok(())
}

async fn edit(s: &mut Session, rest: &str) -> CommandResult {
    let (name, body) = split_first(rest);
    let name = name.to_lowercase();
    if name.is_empty() || body.is_empty() {
        s.reply("Usage: command edit <name> <text>");
        return Ok(());
    }

    let Some(mut info) = load(s, &name, Kind::Command).await? else {
        return Ok(());
    };
    s.require(info.access_level)?;

    let (privileged, parse_warning) = inspect_body(s, body);
    let mut warnings: Vec<String> = parse_warning.into_iter().collect();
    if privileged && !info.access_level.can_access(AccessLevel::Moderator) {
        info.access_level = AccessLevel::Moderator;
        warnings.push("Restricted to moderators since it moderates or changes variables.".to_string());
    }

    let body_id = info.custom_command_id().unwrap_or_default();
    let Some(mut command) = s.tx().custom_command(body_id).await? else {
        return Err(anyhow::anyhow!("command {} has no body {}", name, body_id).into());
    };
    command.message = body.to_string();
    command.updated_at = chrono::Utc::now();
    s.tx().update_custom_command(&command).await?;

    info.touch(&s.actor.name);
    s.tx().update_command_info(&info).await?;

    let reply = format!("Command {}{} edited.", s.channel.prefix, name);
    s.reply(join_warnings(reply, &warnings));
    Ok(())
}

/// Load `name` for update, replying when it is missing or of the other kind.
pub(super) async fn load(s: &mut Session, name: &str, kind: Kind) -> CommandResult<Option<CommandInfo>> {
    let channel_id = s.channel.id;
    let info = s.tx().command_info_for_update(channel_id, name).await?;

    match info {
        Some(info) if kind.owns(&info) => Ok(Some(info)),
        Some(_) => {
            let other = match kind {
                Kind::Command => "a list",
                Kind::List => "a command, not a list",
            };
            s.reply(format!("{} is {}.", name, other));
            Ok(None)
        }
        None => {
            s.reply(format!("{} {} does not exist.", kind.noun(), name));
            Ok(None)
        }
    }
}

pub(super) async fn delete_info(s: &mut Session, rest: &str, kind: Kind) -> CommandResult {
    let (name, _) = split_first(rest);
    let name = name.to_lowercase();
    if name.is_empty() {
        s.reply(format!("Usage: {} delete <name>", kind.noun().to_lowercase()));
        return Ok(());
    }

    let Some(info) = load(s, &name, kind).await? else {
        return Ok(());
    };
    s.require(info.access_level)?;

    // Repeats and schedules go with the command
    let repeat = s.tx().repeated_command_by_info(info.id).await?;
    let schedule = s.tx().scheduled_command_by_info(info.id).await?;
    s.tx().delete_command_info(info.id).await?;

    if let Some(r) = repeat {
        s.state.repeats.remove(RepeatKey::Repeat(r.id));
    }
    if let Some(sc) = schedule {
        s.state.repeats.remove(RepeatKey::Schedule(sc.id));
    }

    info!("{} deleted {} {} in {}", s.actor.name, kind.noun().to_lowercase(), name, s.channel.name);
    s.reply(format!("{} {}{} deleted.", kind.noun(), s.channel.prefix, name));
    Ok(())
}

pub(super) async fn restrict_info(s: &mut Session, rest: &str, kind: Kind) -> CommandResult {
    let (name, level) = split_first(rest);
    let name = name.to_lowercase();
    if name.is_empty() {
        s.reply(format!("Usage: {} restrict <name> [level]", kind.noun().to_lowercase()));
        return Ok(());
    }

    let Some(mut info) = load(s, &name, kind).await? else {
        return Ok(());
    };

    if level.is_empty() {
        let reply = format!(
            "{} {} is restricted to {} and above.",
            kind.noun(),
            name,
            info.access_level.describe()
        );
        s.reply(reply);
        return Ok(());
    }

    let Some(level) = AccessLevel::parse_user_input(level) else {
        s.reply(format!("Unknown level {}.", level));
        return Ok(());
    };

    s.require(info.access_level)?;
    if !s.user_is(level) {
        let reply = format!(
            "Your level is {}; you cannot restrict to {}.",
            s.user_level(),
            level
        );
        s.reply(reply);
        return Ok(());
    }

    info.access_level = level;
    info.touch(&s.actor.name);
    s.tx().update_command_info(&info).await?;

    let reply = format!(
        "{} {} restricted to {} and above.",
        kind.noun(),
        name,
        level.describe()
    );
    s.reply(reply);
    Ok(())
}

pub(super) async fn rename_info(s: &mut Session, rest: &str, kind: Kind) -> CommandResult {
    let (from, to) = split_first(rest);
    let (to, _) = split_first(to);
    let (from, to) = (from.to_lowercase(), to.to_lowercase());
    if from.is_empty() || to.is_empty() {
        s.reply(format!("Usage: {} rename <old> <new>", kind.noun().to_lowercase()));
        return Ok(());
    }

    let Some(mut info) = load(s, &from, kind).await? else {
        return Ok(());
    };
    s.require(info.access_level)?;

    let channel_id = s.channel.id;
    if from != to && s.tx().command_info(channel_id, &to).await?.is_some() {
        s.reply(format!("{} already exists.", to));
        return Ok(());
    }

    info.name = to.clone();
    info.touch(&s.actor.name);
    s.tx().update_command_info(&info).await?;

    let mut reply = format!("{} {} renamed to {}.", kind.noun(), from, to);
    if s.state.builtins.contains(&to) {
        reply.push_str(&format!(
            " Warning: {} is a builtin command and will only run via {}builtin {}.",
            to, s.channel.prefix, to
        ));
    }
    s.reply(reply);
    Ok(())
}

/// `clone <channel> <name> [new name]` copies a custom command from another channel.
async fn clone(s: &mut Session, rest: &str) -> CommandResult {
    let (other, rest) = split_first(rest);
    let (name, rest) = split_first(rest);
    let (new_name, _) = split_first(rest);

    let other = other.trim_start_matches('#').to_lowercase();
    let name = name.to_lowercase();
    let new_name = if new_name.is_empty() {
        name.clone()
    } else {
        new_name.to_lowercase()
    };
    if other.is_empty() || name.is_empty() {
        s.reply("Usage: command clone <channel> <name> [new name]");
        return Ok(());
    }

    let Some(source_channel) = s.tx().channel_by_name(&other).await? else {
        s.reply(format!("Channel {} does not exist.", other));
        return Ok(());
    };

    let source = match s.tx().command_info(source_channel.id, &name).await? {
        Some(info) => info,
        None => {
            s.reply(format!("Command {} does not exist in {}.", name, other));
            return Ok(());
        }
    };
    let Some(body_id) = source.custom_command_id() else {
        s.reply(format!("{} in {} is not a custom command.", name, other));
        return Ok(());
    };
    let Some(body) = s.tx().custom_command(body_id).await? else {
        s.reply(format!("Command {} does not exist in {}.", name, other));
        return Ok(());
    };

    let level = source.access_level;
    if !s.user_is(level) {
        let reply = format!(
            "Your level is {}; you cannot create a command with level {}.",
            s.user_level(),
            level
        );
        s.reply(reply);
        return Ok(());
    }

    let channel_id = s.channel.id;
    if s.tx().command_info(channel_id, &new_name).await?.is_some() {
        s.reply(format!("{} already exists.", new_name));
        return Ok(());
    }

    let copy = s
        .tx()
        .insert_custom_command(CustomCommand::new(channel_id, &body.message))
        .await?;
    let mut info = CommandInfo::new(channel_id, &new_name, level, &s.actor.name);
    info.target = Some(CommandTarget::Custom(copy.id));
    s.tx().insert_command_info(info).await?;

    let reply = format!(
        "Command {} cloned from {} as {}{}.",
        name, other, s.channel.prefix, new_name
    );
    s.reply(reply);
    Ok(())
}

/// Evaluate a body without storing it.
async fn exec(s: &mut Session, body: &str) -> CommandResult {
    if body.is_empty() {
        s.reply("Usage: command exec <text>");
        return Ok(());
    }
    let out = s.evaluate(body, "", None).await?;
    if !out.trim().is_empty() {
        s.reply(out);
    }
    Ok(())
}

async fn get(s: &mut Session, rest: &str) -> CommandResult {
    let (name, _) = split_first(rest);
    let name = name.to_lowercase();
    if name.is_empty() {
        s.reply("Usage: command get <name>");
        return Ok(());
    }

    let channel_id = s.channel.id;
    let info = s.tx().command_info(channel_id, &name).await?;
    let body = match info.and_then(|i| i.custom_command_id()) {
        Some(id) => s.tx().custom_command(id).await?,
        None => None,
    };

    match body {
        Some(body) => s.reply(format!("Command {}: {}", name, body.message)),
        None => s.reply(format!("Command {} does not exist.", name)),
    }
    Ok(())
}

/// Handle !commands.
pub async fn commands(s: &mut Session, _args: &str) -> CommandResult {
    let channel_id = s.channel.id;
    let mut names: Vec<String> = s
        .tx()
        .command_infos(channel_id)
        .await?
        .into_iter()
        .filter(|i| i.target.is_some())
        .map(|i| i.name)
        .collect();
    names.sort();

    if names.is_empty() {
        s.reply("There are no custom commands.");
    } else {
        s.reply(format!("Custom commands: {}", names.join(", ")));
    }
    Ok(())
}

/// Handle !builtin: run a stored command even when a builtin shares its name.
pub async fn builtin(s: &mut Session, args: &str) -> CommandResult {
    let (name, rest) = split_first(args);
    let name = name.to_lowercase();
    if name.is_empty() {
        s.reply("Usage: builtin <name> [args]");
        return Ok(());
    }

    run_custom(s, &name, rest).await?;
    Ok(())
}
