//! Action catalog for command bodies.
//!
//! [`Evaluator`] resolves every action name a body can produce against the
//! running session.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::cbp::{ActionResolver, Node, Params, visit_actions};
use crate::database::Variable;
use crate::permissions::AccessLevel;
use crate::utils::{format_duration, query_escape};

use super::error::{CommandError, CommandResult};
use super::session::Session;

/// Prefixes of actions that moderate users or mutate state.
const PRIVILEGED_PREFIXES: &[&str] = &["PURGE", "TIMEOUT", "BAN", "DELETE", "SUBMODE_"];
const VAR_MUTATIONS: &[&str] = &["_SET_", "_INCREMENT_", "_DECREMENT_"];

/// Whether `nodes` contain an action that requires Moderator to author.
///
/// An action whose name is built from nested actions could expand to
/// anything, so it counts as privileged.
pub fn body_is_privileged(nodes: &[Node]) -> bool {
    let mut privileged = false;
    visit_actions(nodes, &mut |node| {
        if node.is_built() || is_privileged_name(&node.literal_name()) {
            privileged = true;
        }
    });
    privileged
}

/// Whether `nodes` stop unless the channel is live.
pub fn body_requires_live(nodes: &[Node]) -> bool {
    let mut live = false;
    visit_actions(nodes, &mut |node| {
        if !node.is_built() && node.literal_name() == "ONLINE_CHECK" {
            live = true;
        }
    });
    live
}

fn is_privileged_name(name: &str) -> bool {
    if PRIVILEGED_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return true;
    }
    name.starts_with("VARS_") && VAR_MUTATIONS.iter().any(|m| name.contains(m))
}

/// Operation named by a `VARS_` action.
#[derive(Debug, Clone, PartialEq, Eq)]
enum VarOp<'a> {
    Get,
    GetFrom(&'a str),
    Set(&'a str),
    Add(i64),
}

/// Split `name_OP[_arg]` (with the `VARS_` prefix removed).
fn parse_var_action(rest: &str) -> Option<(&str, VarOp<'_>)> {
    const OPS: &[&str] = &["_SET_", "_INCREMENT_", "_DECREMENT_", "_GET_"];

    let found = OPS
        .iter()
        .filter_map(|op| rest.find(op).map(|pos| (pos, *op)))
        .min_by_key(|(pos, _)| *pos);

    if let Some((pos, op)) = found {
        let name = &rest[..pos];
        let arg = &rest[pos + op.len()..];
        let op = match op {
            "_SET_" => VarOp::Set(arg),
            "_GET_" => VarOp::GetFrom(arg),
            "_INCREMENT_" => VarOp::Add(arg.trim().parse().ok()?),
            _ => VarOp::Add(-arg.trim().parse::<i64>().ok()?),
        };
        return (!name.is_empty()).then_some((name, op));
    }

    let name = rest.strip_suffix("_GET")?;
    (!name.is_empty()).then_some((name, VarOp::Get))
}

/// Resolves actions for one evaluation.
pub struct Evaluator<'s> {
    session: &'s mut Session,
    params: Params,
    count: Option<i64>,
}

impl<'s> Evaluator<'s> {
    pub fn new(session: &'s mut Session, args: &str, count: Option<i64>) -> Self {
        Self {
            session,
            params: Params::new(args),
            count,
        }
    }

    async fn variable(&mut self, name: &str, op: VarOp<'_>) -> CommandResult<String> {
        let channel_id = self.session.channel.id;
        let tx = self.session.tx();

        match op {
            VarOp::Get => Ok(tx
                .variable(channel_id, name)
                .await?
                .map(|v| v.value)
                .unwrap_or_else(|| "(error)".to_string())),
            VarOp::GetFrom(channel) => {
                let Some(other) = tx.channel_by_name(channel).await? else {
                    return Ok("(error)".to_string());
                };
                Ok(tx
                    .variable(other.id, name)
                    .await?
                    .map(|v| v.value)
                    .unwrap_or_else(|| "(error)".to_string()))
            }
            VarOp::Set(value) => {
                let var = match tx.variable_for_update(channel_id, name).await? {
                    Some(mut v) => {
                        v.value = value.to_string();
                        v.updated_at = Utc::now();
                        v
                    }
                    None => Variable::new(channel_id, name, value),
                };
                Ok(tx.upsert_variable(var).await?.value)
            }
            VarOp::Add(delta) => {
                let mut var = tx
                    .variable_for_update(channel_id, name)
                    .await?
                    .unwrap_or_else(|| Variable::new(channel_id, name, "0"));
                var.add(delta);
                Ok(tx.upsert_variable(var).await?.value)
            }
        }
    }

    async fn list_random(&mut self, name: &str) -> CommandResult<String> {
        let channel_id = self.session.channel.id;
        let tx = self.session.tx();
        let Some(info) = tx.command_info(channel_id, name).await? else {
            return Ok(String::new());
        };
        let Some(list_id) = info.command_list_id() else {
            return Ok(String::new());
        };
        let items = tx.command_list(list_id).await?.map(|l| l.items).unwrap_or_default();
        Ok(items.choose(&mut rand::thread_rng()).cloned().unwrap_or_default())
    }

    async fn random_quote(&mut self) -> CommandResult<String> {
        let channel_id = self.session.channel.id;
        let quotes = self.session.tx().quotes(channel_id).await?;
        Ok(quotes
            .choose(&mut rand::thread_rng())
            .map(|q| q.quote.clone())
            .unwrap_or_default())
    }

    async fn uptime(&mut self) -> CommandResult<String> {
        let twitch = self.session.state.twitch.clone();
        match twitch.current_stream(self.session.channel.twitch_id).await? {
            Some(stream) => {
                let secs = (Utc::now() - stream.started_at).num_seconds().max(0) as u64;
                Ok(format_duration(secs))
            }
            None => Ok("(Not live)".to_string()),
        }
    }
}

fn random_range(a: &str, b: &str, integer: bool) -> Option<String> {
    let mut rng = rand::thread_rng();
    if integer {
        let (a, b): (i64, i64) = (a.trim().parse().ok()?, b.trim().parse().ok()?);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Some(rng.gen_range(lo..=hi).to_string())
    } else {
        let (a, b): (f64, f64) = (a.trim().parse().ok()?, b.trim().parse().ok()?);
        // The sampler panics on infinities and NaN
        if !a.is_finite() || !b.is_finite() {
            return None;
        }
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        if lo == hi {
            return Some(format!("{:.1}", lo));
        }
        Some(format!("{:.1}", rng.gen_range(lo..hi)))
    }
}

#[async_trait]
impl ActionResolver for Evaluator<'_> {
    type Error = CommandError;

    async fn action(&mut self, name: &str, node: &Node) -> CommandResult<String> {
        let s = &mut *self.session;

        // A name that only became privileged through expansion needs a moderator
        if is_privileged_name(name)
            && !is_privileged_name(&node.literal_name())
            && !s.user_is(AccessLevel::Moderator)
        {
            debug!("Refusing {} built by {} for {}", name, node, s.actor.name);
            return Err(CommandError::Halted("privileged action built from input"));
        }

        match name {
            "PARAMETER" => return Ok(self.params.next_param().unwrap_or_default()),
            "PARAMETER_CAPS" => {
                return Ok(self.params.next_param().unwrap_or_default().to_uppercase());
            }
            "USER" => return Ok(s.actor.name.clone()),
            "USER_DISPLAY" => return Ok(s.actor.display.clone()),
            "CHANNEL_URL" => return Ok(format!("twitch.tv/{}", s.channel.name)),
            "BOT_NAME" => return Ok(s.channel.bot_name.clone()),
            "COUNT" => return Ok(self.count.unwrap_or(0).to_string()),
            "MESSAGE_COUNT" => return Ok(s.channel.message_count.to_string()),
            "NUMCHANNELS" => return Ok(s.tx().count_active_channels().await?.to_string()),
            "TIME" => return Ok(Utc::now().format("%H:%M UTC").to_string()),
            "DATE" => return Ok(Utc::now().format("%b %-d, %Y").to_string()),
            "QUOTE" => return self.random_quote().await,
            "PURGE" | "TIMEOUT" | "BAN" | "DELETE" => {
                // Moderators and above are never targeted
                if s.user_is(AccessLevel::Moderator) {
                    debug!("Skipping {} against {}", name, s.actor.name);
                    return Ok(String::new());
                }
                let user = s.actor.name.clone();
                match name {
                    "PURGE" => s.purge(&user),
                    "TIMEOUT" => {
                        let secs = s.channel.timeout_duration;
                        s.timeout(&user, secs);
                    }
                    "BAN" => s.ban(&user),
                    _ => {
                        let id = s.id.clone();
                        s.delete_message(&id);
                    }
                }
                return Ok(String::new());
            }
            "SUBMODE_ON" => {
                s.send_raw("/subscribers");
                return Ok(String::new());
            }
            "SUBMODE_OFF" => {
                s.send_raw("/subscribersoff");
                return Ok(String::new());
            }
            "ONLINE_CHECK" => {
                let twitch = s.state.twitch.clone();
                if twitch.current_stream(s.channel.twitch_id).await?.is_none() {
                    return Err(CommandError::Halted("channel is offline"));
                }
                return Ok(String::new());
            }
            "UPTIME" => return self.uptime().await,
            "GAME" | "STATUS" => {
                let twitch = s.state.twitch.clone();
                let info = twitch.channel_info(s.channel.twitch_id).await?;
                return Ok(if name == "GAME" { info.game } else { info.status });
            }
            "VIEWERS" => {
                let twitch = s.state.twitch.clone();
                let viewers = twitch
                    .current_stream(s.channel.twitch_id)
                    .await?
                    .map(|st| st.viewers)
                    .unwrap_or(0);
                return Ok(viewers.to_string());
            }
            "CHATTERS" => {
                let twitch = s.state.twitch.clone();
                let chatters = twitch.chatters(&s.channel.name).await?;
                return Ok(chatters.len().to_string());
            }
            _ => {}
        }

        if let Some(rest) = name.strip_prefix("RANDOM_INT_") {
            if let Some((a, b)) = rest.split_once('_')
                && let Some(n) = random_range(a, b, true)
            {
                return Ok(n);
            }
        } else if let Some(rest) = name.strip_prefix("RANDOM_") {
            if let Some((a, b)) = rest.split_once('_')
                && let Some(n) = random_range(a, b, false)
            {
                return Ok(n);
            }
        } else if let Some(text) = name.strip_prefix("QUERYESCAPE_") {
            return Ok(query_escape(text));
        } else if let Some(rest) = name.strip_prefix("VARS_") {
            if let Some((var, op)) = parse_var_action(rest) {
                return self.variable(var, op).await;
            }
        } else if let Some(rest) = name.strip_prefix("LIST_")
            && let Some(list) = rest.strip_suffix("_RANDOM")
        {
            return self.list_random(&list.to_lowercase()).await;
        }

        Err(CommandError::UnknownAction(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::testing::Harness;
    use crate::cbp::parse;

    #[test]
    fn privileged_bodies() {
        let privileged = |body: &str| body_is_privileged(&parse(body).unwrap());

        assert!(privileged("bye (_BAN_)"));
        assert!(privileged("(_PURGE_) no links"));
        assert!(privileged("(_VARS_deaths_INCREMENT_1_)"));
        assert!(privileged("(_VARS_x_SET_(_PARAMETER_)_)"));
        assert!(privileged("(_SUBMODE_ON_)"));
        assert!(privileged("(_(_PARAMETER_)_)"));
        assert!(privileged("(_VARS_(_USER_)_GET_)"));

        assert!(!privileged("(_VARS_deaths_GET_)"));
        assert!(!privileged("hello (_USER_)"));
        assert!(!privileged("a BAN in plain text"));
    }

    #[test]
    fn var_action_forms() {
        assert_eq!(parse_var_action("deaths_GET"), Some(("deaths", VarOp::Get)));
        assert_eq!(
            parse_var_action("deaths_GET_other"),
            Some(("deaths", VarOp::GetFrom("other")))
        );
        assert_eq!(parse_var_action("x_SET_hello world"), Some(("x", VarOp::Set("hello world"))));
        assert_eq!(parse_var_action("n_INCREMENT_2"), Some(("n", VarOp::Add(2))));
        assert_eq!(parse_var_action("n_DECREMENT_3"), Some(("n", VarOp::Add(-3))));
        assert_eq!(parse_var_action("n_INCREMENT_lots"), None);
        assert_eq!(parse_var_action("_GET"), None);
        assert_eq!(parse_var_action("nothing"), None);
    }

    #[test]
    fn random_ranges() {
        for _ in 0..50 {
            let n: i64 = random_range("3", "1", true).unwrap().parse().unwrap();
            assert!((1..=3).contains(&n));
        }
        assert_eq!(random_range("2", "2", false).as_deref(), Some("2.0"));
        assert_eq!(random_range("a", "2", true), None);
        assert_eq!(random_range("1", "inf", false), None);
        assert_eq!(random_range("nan", "2", false), None);
        assert_eq!(random_range("-inf", "inf", false), None);
    }

    #[test]
    fn live_bodies() {
        assert!(body_requires_live(&parse("(_ONLINE_CHECK_) live now").unwrap()));
        assert!(!body_requires_live(&parse("(_UPTIME_)").unwrap()));
    }

    #[tokio::test]
    async fn non_finite_random_bounds_fail_quietly() {
        let h = Harness::new().await;
        let ch = h.channel("alpha", 100).await;
        h.send_as(&ch, "mia", AccessLevel::Moderator, "!command adde r (_RANDOM_1_inf_)").await;
        h.send_as(&ch, "mia", AccessLevel::Moderator, "!command adde n (_RANDOM_nan_2_)").await;

        assert!(h.send_as(&ch, "joe", AccessLevel::Everyone, "!r").await.is_empty());
        assert!(h.send_as(&ch, "joe", AccessLevel::Everyone, "!n").await.is_empty());
    }

    #[tokio::test]
    async fn built_action_names_cannot_escalate() {
        let h = Harness::new().await;
        let ch = h.channel("alpha", 100).await;

        h.send_as(&ch, "mia", AccessLevel::Moderator, "!command add echo (_(_PARAMETER_)_)").await;
        assert_eq!(h.command_level(&ch, "echo").await, Some(AccessLevel::Moderator));

        h.send_as(&ch, "mia", AccessLevel::Moderator, "!command adds open (_(_PARAMETER_)_)").await;
        assert_eq!(h.command_level(&ch, "open").await, Some(AccessLevel::Subscriber));

        let out = h.send_as(&ch, "sam", AccessLevel::Subscriber, "!open BAN").await;
        assert!(out.is_empty());
        let out = h.send_as(&ch, "sam", AccessLevel::Subscriber, "!open SUBMODE_ON").await;
        assert!(out.is_empty());
        let out = h.send_as(&ch, "sam", AccessLevel::Subscriber, "!open VARS_x_SET_1").await;
        assert!(out.is_empty());

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!var get x").await;
        assert_eq!(out, vec!["[quill] x is not set."]);

        // Harmless names still resolve
        let out = h.send_as(&ch, "sam", AccessLevel::Subscriber, "!open USER").await;
        assert_eq!(out, vec!["[quill] sam"]);

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!open SUBMODE_ON").await;
        assert_eq!(out, vec!["/subscribers"]);
    }

    #[tokio::test]
    async fn offline_check_discards_earlier_changes() {
        let h = Harness::new().await;
        let ch = h.channel("alpha", 100).await;
        h.send_as(&ch, "mia", AccessLevel::Moderator, "!command adde live (_VARS_x_INCREMENT_1_)(_ONLINE_CHECK_)done")
            .await;
        h.send_as(&ch, "mia", AccessLevel::Moderator, "!command adde late (_VARS_y_INCREMENT_1_)(_(_PARAMETER_)_)done")
            .await;

        assert!(h.send_as(&ch, "joe", AccessLevel::Everyone, "!live").await.is_empty());
        assert!(h.send_as(&ch, "joe", AccessLevel::Everyone, "!late ONLINE_CHECK").await.is_empty());

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!var get x").await;
        assert_eq!(out, vec!["[quill] x is not set."]);
        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!var get y").await;
        assert_eq!(out, vec!["[quill] y is not set."]);

        h.go_live(100, Utc::now(), 3);
        assert_eq!(h.send_as(&ch, "joe", AccessLevel::Everyone, "!live").await, vec!["[quill] 1done"]);
    }
}
