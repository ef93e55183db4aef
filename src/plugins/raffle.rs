//! Raffles.
//!
//! Entries live in the rate store as a set; only the enabled flag is a
//! channel setting.

use crate::bot::{CommandResult, Session};
use crate::permissions::AccessLevel;
use crate::utils::split_subcommand;

/// Handle !raffle.
pub async fn raffle(s: &mut Session, args: &str) -> CommandResult {
    let (sub, _) = split_subcommand(args);

    if sub.is_empty() {
        // Bare !raffle enters the sender
        if s.channel.raffle_enabled {
            let user = s.actor.name.clone();
            s.rates.raffle_add(&user).await?;
        }
        return Ok(());
    }

    s.require(AccessLevel::Moderator)?;

    match sub.as_str() {
        "enable" | "on" => {
            s.rates.raffle_reset().await?;
            s.channel.raffle_enabled = true;
            s.save_channel().await?;
            let reply = format!("Raffle enabled, type {}raffle to enter.", s.channel.prefix);
            s.reply(reply);
        }
        "disable" | "off" => {
            s.channel.raffle_enabled = false;
            s.save_channel().await?;
            s.reply("Raffle disabled.");
        }
        "reset" => {
            s.rates.raffle_reset().await?;
            s.reply("Raffle entries cleared.");
        }
        "count" => {
            let n = s.rates.raffle_count().await?;
            s.reply(format!("{} {} entered.", n, if n == 1 { "user has" } else { "users have" }));
        }
        "winner" => match s.rates.raffle_winner().await? {
            Some(winner) => s.reply(format!("The winner is {}!", winner)),
            None => s.reply("Nobody has entered the raffle."),
        },
        _ => s.reply("Usage: raffle [enable|disable|reset|count|winner]"),
    }
    Ok(())
}
