//! Database model exports.

pub mod autoreply;
pub mod channel;
pub mod command_info;
pub mod quote;
pub mod repeat;
pub mod variable;

pub use autoreply::Autoreply;
pub use channel::Channel;
pub use command_info::{CommandInfo, CommandList, CommandTarget, CustomCommand};
pub use quote::Quote;
pub use repeat::{RepeatedCommand, ScheduledCommand, MIN_REPEAT_DELAY_SECS};
pub use variable::Variable;
