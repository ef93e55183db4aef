//! Dice, the magic conch and random picks.

use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::bot::{CommandError, CommandResult, Session};
use crate::permissions::AccessLevel;
use crate::utils::split_first;

const MAX_DICE: u64 = 100;
const MAX_SIDES: u64 = 1_000_000;

const CONCH_ANSWERS: &[&str] = &[
    "It is certain.",
    "It is decidedly so.",
    "Without a doubt.",
    "Yes, definitely.",
    "You may rely on it.",
    "As I see it, yes.",
    "Most likely.",
    "Outlook good.",
    "Yes.",
    "Signs point to yes.",
    "Reply hazy, try again.",
    "Ask again later.",
    "Better not tell you now.",
    "Cannot predict now.",
    "Concentrate and ask again.",
    "Don't count on it.",
    "My reply is no.",
    "My sources say no.",
    "Outlook not so good.",
    "Very doubtful.",
];

/// A parsed roll request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Roll {
    /// One number between 1 and the bound
    Upto(u64),
    /// `count` dice with `sides` sides each
    Dice { count: u64, sides: u64 },
}

fn parse_roll(arg: &str, default: u64) -> Option<Roll> {
    let arg = arg.trim().to_lowercase();
    if arg.is_empty() {
        return Some(Roll::Upto(default.clamp(1, MAX_SIDES)));
    }

    if let Some((count, sides)) = arg.split_once('d') {
        let count = if count.is_empty() { 1 } else { count.parse().ok()? };
        let sides = sides.parse().ok()?;
        if count == 0 || count > MAX_DICE || sides == 0 || sides > MAX_SIDES {
            return None;
        }
        return Some(Roll::Dice { count, sides });
    }

    match arg.parse::<u64>() {
        Ok(n) if (1..=MAX_SIDES).contains(&n) => Some(Roll::Upto(n)),
        _ => None,
    }
}

impl Roll {
    fn throw(self) -> u64 {
        let mut rng = rand::thread_rng();
        match self {
            Roll::Upto(n) => rng.gen_range(1..=n),
            Roll::Dice { count, sides } => (0..count)
                .map(|_| rng.gen_range(1..=sides))
                .fold(0u64, u64::saturating_add),
        }
    }
}

/// Handle !roll.
pub async fn roll(s: &mut Session, args: &str) -> CommandResult {
    s.require(s.channel.roll_level)?;

    let (arg, _) = split_first(args);
    let Some(roll) = parse_roll(arg, s.channel.roll_default.max(1) as u64) else {
        s.reply("Usage: roll [max] or roll <count>d<sides>");
        return Ok(());
    };

    if !s.user_is(AccessLevel::Moderator) && s.channel.roll_cooldown > 0 {
        let ttl = Duration::from_secs(s.channel.roll_cooldown as u64);
        if s.rates.feature_cooldown("roll", ttl).await? {
            return Err(CommandError::Silent);
        }
    }

    let result = roll.throw();
    let reply = match roll {
        Roll::Upto(_) => format!("{} rolled {}.", s.actor.display, result),
        Roll::Dice { count, sides } => {
            format!("{} rolled {}d{}: {}.", s.actor.display, count, sides, result)
        }
    };
    s.reply(reply);
    Ok(())
}

/// Handle !conch and !helix.
pub async fn conch(s: &mut Session, args: &str) -> CommandResult {
    if args.trim().is_empty() {
        s.reply("Ask me a question.");
        return Ok(());
    }
    let answer = CONCH_ANSWERS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Ask again later.");
    s.reply(answer);
    Ok(())
}

/// Handle !random: `coin`, a number range or a pick from choices.
pub async fn random(s: &mut Session, args: &str) -> CommandResult {
    let reply = match pick(args) {
        Some(r) => r,
        None => "Usage: random coin | random <max> | random <min> <max> | random <a, b, ...>".to_string(),
    };
    s.reply(reply);
    Ok(())
}

fn pick(args: &str) -> Option<String> {
    let args = args.trim();
    let mut rng = rand::thread_rng();

    if args.eq_ignore_ascii_case("coin") {
        return Some(if rng.gen_bool(0.5) { "Heads!" } else { "Tails!" }.to_string());
    }

    let words: Vec<&str> = args.split_whitespace().collect();
    let numbers: Option<Vec<i64>> = words.iter().map(|w| w.parse().ok()).collect();
    match numbers.as_deref() {
        Some([max]) if *max >= 1 => return Some(rng.gen_range(1..=*max).to_string()),
        Some([a, b]) => {
            let (lo, hi) = if a <= b { (*a, *b) } else { (*b, *a) };
            return Some(rng.gen_range(lo..=hi).to_string());
        }
        _ => {}
    }

    let choices: Vec<&str> = if args.contains(',') {
        args.split(',').map(str::trim).filter(|c| !c.is_empty()).collect()
    } else {
        words
    };
    if choices.len() < 2 {
        return None;
    }
    choices.choose(&mut rng).map(|c| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::testing::Harness;

    #[test]
    fn roll_arguments() {
        assert_eq!(parse_roll("", 20), Some(Roll::Upto(20)));
        assert_eq!(parse_roll("6", 20), Some(Roll::Upto(6)));
        assert_eq!(parse_roll("2d6", 20), Some(Roll::Dice { count: 2, sides: 6 }));
        assert_eq!(parse_roll("d8", 20), Some(Roll::Dice { count: 1, sides: 8 }));
        assert_eq!(parse_roll("0", 20), None);
        assert_eq!(parse_roll("101d6", 20), None);
        assert_eq!(parse_roll("2d0", 20), None);
        assert_eq!(parse_roll("100d18446744073709551615", 20), None);
        assert_eq!(parse_roll("18446744073709551615", 20), None);
        assert_eq!(
            parse_roll("100d1000000", 20),
            Some(Roll::Dice { count: 100, sides: 1_000_000 })
        );
    }

    #[test]
    fn dice_stay_in_range() {
        for _ in 0..100 {
            let n = Roll::Dice { count: 3, sides: 6 }.throw();
            assert!((3..=18).contains(&n));
        }
    }

    #[test]
    fn largest_roll_does_not_overflow() {
        let n = Roll::Dice { count: MAX_DICE, sides: MAX_SIDES }.throw();
        assert!((MAX_DICE..=MAX_DICE * MAX_SIDES).contains(&n));
    }

    #[test]
    fn picks() {
        assert_eq!(pick("7 7").as_deref(), Some("7"));
        assert_eq!(pick("1").as_deref(), Some("1"));
        assert_eq!(pick("only, "), None);
        let p = pick("red, green blue").unwrap();
        assert!(p == "red" || p == "green blue");
        let coin = pick("coin").unwrap();
        assert!(coin == "Heads!" || coin == "Tails!");
    }

    #[tokio::test]
    async fn roll_respects_level_and_cooldown() {
        let h = Harness::new().await;
        let ch = h.channel("alpha", 100).await;

        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "!roll 1").await;
        assert!(out.is_empty());

        let out = h.send_as(&ch, "sam", AccessLevel::Subscriber, "!roll 3d1").await;
        assert_eq!(out, vec!["[quill] sam rolled 3d1: 3."]);

        let out = h.send_as(&ch, "sam", AccessLevel::Subscriber, "!roll 1").await;
        assert!(out.is_empty());

        let out = h.send_as(&ch, "mia", AccessLevel::Moderator, "!roll 1").await;
        assert_eq!(out, vec!["[quill] mia rolled 1."]);
    }

    #[tokio::test]
    async fn huge_dice_get_usage() {
        let h = Harness::new().await;
        let ch = h.channel("alpha", 100).await;

        let out = h
            .send_as(&ch, "mia", AccessLevel::Moderator, "!roll 100d18446744073709551615")
            .await;
        assert_eq!(out, vec!["[quill] Usage: roll [max] or roll <count>d<sides>"]);
    }
}
