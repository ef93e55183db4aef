//! Per-message event handlers.
//!
//! These run on every message of an active channel, around command
//! resolution:
//! - `filters` before commands, when the channel moderates
//! - `autoreply` after commands, when nothing else matched

pub mod autoreply;
pub mod filters;
