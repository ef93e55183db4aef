//! Errors raised while handling a command.

use thiserror::Error;

use crate::cbp::ParseError;

#[derive(Debug, Error)]
pub enum CommandError {
    /// The user may not run this; no reply is sent.
    #[error("not authorized")]
    NotAuthorized,

    /// Handling stopped without a reply (cooldown, ignored user, ...).
    #[error("stopped silently")]
    Silent,

    /// A body stopped partway through; whatever it changed is discarded.
    #[error("halted: {0}")]
    Halted(&'static str),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("malformed command body: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CommandError {
    /// Whether the error ends handling without counting as a failure.
    pub fn is_quiet(&self) -> bool {
        matches!(self, Self::NotAuthorized | Self::Silent)
    }
}

pub type CommandResult<T = ()> = Result<T, CommandError>;
