//! Database module exports.
//!
//! The engine talks to storage only through [`Store`] and [`Transaction`].

mod memory;
mod models;
mod store;

pub use memory::MemoryStore;
pub use models::*;
pub use store::{Store, Transaction};
