//! Curly-brace-program notation used for command bodies.
//!
//! Text interleaved with `(_ ... _)` action nodes. Parsing produces a tree;
//! evaluation folds it bottom-up, handing each expanded action name to a
//! caller-supplied [`ActionResolver`].

mod eval;
mod parse;

pub use eval::{walk, ActionResolver, Params};
pub use parse::{parse, visit_actions, Node, ParseError};
