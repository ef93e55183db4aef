//! Cache module - Named caches using Moka.
//!
//! ## Architecture
//!
//! - `CacheRegistry` - Central registry holding all named caches
//! - `TypedCache` - Typed wrapper over a Moka cache
//! - `CacheConfig` - Capacity and expiry presets
//!
//! Caches in use: `message_ids` (process-local dedup), `cbp_trees` (parsed
//! command bodies) and `patterns` (compiled autoreply/filter regexes).

mod config;
mod registry;
mod typed;

pub use config::CacheConfig;
pub use registry::CacheRegistry;
pub use typed::TypedCache;
