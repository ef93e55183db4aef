//! Bot module - Core bot functionality.

mod actions;
pub mod console;
mod dedup;
pub mod dispatcher;
mod error;
pub mod external;
pub mod message;
pub mod runtime;
mod session;

#[cfg(test)]
pub mod testing;

pub use actions::body_is_privileged;
pub use dispatcher::{AppState, Services, run_custom};
pub use error::{CommandError, CommandResult};
pub use external::{LogNotifier, NoTwitchApi};
pub use message::ChatMessage;
pub use session::Session;
