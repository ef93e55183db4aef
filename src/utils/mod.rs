//! Utility functions.
//!
//! Collection of helper functions used across the bot.

pub mod parser;
pub mod reply;

pub use parser::{
    clean_username, format_duration, parse_duration, parse_toggle, query_escape, split_first,
    split_subcommand,
};
pub use reply::format_reply;
