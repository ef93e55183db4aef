/// One help topic. `{p}` in the text is replaced with the channel prefix.
pub struct Topic {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub text: &'static str,
}

pub const TOPICS: &[Topic] = &[
    Topic {
        name: "commands",
        aliases: &["command", "custom"],
        text: "{p}command add|adde|adds|addm|addb <name> <text>, edit, delete, restrict <name> <level>, \
               rename <old> <new>, clone <channel> <name>, exec <body>, get <name>. \
               {p}builtin <name> runs a custom command shadowed by a builtin.",
    },
    Topic {
        name: "lists",
        aliases: &["list"],
        text: "{p}list add|delete|restrict|rename <name>. Then {p}<name> [n|random], \
               {p}<name> add <item>, delete <n>, edit <n> <item>.",
    },
    Topic {
        name: "quotes",
        aliases: &["quote"],
        text: "{p}quote [n], get <n>, search <text>, add <text>, edit <n> <text>, delete <n>, editor <n>.",
    },
    Topic {
        name: "vars",
        aliases: &["var", "variables"],
        text: "{p}var get|set|delete|increment|decrement <name> [value]. In commands: (_VARS_name_GET_).",
    },
    Topic {
        name: "autoreplies",
        aliases: &["autoreply"],
        text: "{p}autoreply add <pattern> <response>, delete <n>, editresponse <n> <text>, \
               editpattern <n> <pattern>, list, compact. Patterns use * and _ for spaces, or REGEX:.",
    },
    Topic {
        name: "repeats",
        aliases: &["repeat", "schedule", "schedules"],
        text: "{p}repeat add <name> <delay> [diff], delete|on|off <name>, list. \
               {p}schedule add <name> <cron_with_underscores> [diff], delete|on|off <name>, list.",
    },
    Topic {
        name: "settings",
        aliases: &["set", "setting"],
        text: "{p}set prefix|bullet|cooldown|shouldmoderate|mode [value], {p}set roll default|cooldown|userlevel <value>. \
               {p}owner, {p}mod, {p}regular, {p}ignore add|delete|list <user>.",
    },
    Topic {
        name: "filters",
        aliases: &["filter"],
        text: "{p}filter on|off|status, links|caps|symbols|me on|off, caps percent|minchars|mincaps <n>, \
               symbols percent|min <n>, banphrase add|delete|list|clear, pd add|delete|list, exemptlevel <level>. \
               {p}permit <user>.",
    },
    Topic {
        name: "moderation",
        aliases: &["mod"],
        text: "{p}+b/-b <user>, {p}+t <user> [duration], {p}-t <user>, {p}+p <user>, \
               {p}+m/-m slow mode, {p}+s/-s subscribers only, {p}clear.",
    },
    Topic {
        name: "fun",
        aliases: &["roll", "raffle"],
        text: "{p}roll [max|XdY], {p}conch <question>, {p}random coin|<max>|<a, b, ...>, \
               {p}raffle, {p}raffle enable|disable|reset|count|winner.",
    },
    Topic {
        name: "stream",
        aliases: &["status", "game"],
        text: "{p}status [title], {p}game [game], {p}uptime, {p}viewers, {p}chatters, {p}islive.",
    },
];

/// Find a topic by name or alias.
pub fn find(name: &str) -> Option<&'static Topic> {
    let name = name.to_lowercase();
    TOPICS
        .iter()
        .find(|t| t.name == name || t.aliases.contains(&name.as_str()))
}
