//! Permission system for access levels.
//!
//! This module provides the privilege order used by every command and the
//! resolver that turns a message's badges and the channel's custom lists into
//! a level.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let level = perms.user_level(&msg, Some(&channel));
//! if !level.can_access(AccessLevel::Moderator) {
//!     return Err(CommandError::NotAuthorized);
//! }
//! ```

mod checker;
mod level;

pub use checker::Permissions;
pub use level::AccessLevel;
