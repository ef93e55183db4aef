//! Parser for the curly-brace-program notation.
//!
//! Grammar:
//! - plain text is a leaf
//! - `(_` opens an action node, `_)` closes the nearest open one
//! - nesting is unlimited

use std::fmt;

use thiserror::Error;

const OPEN: &[u8] = b"(_";
const CLOSE: &[u8] = b"_)";

/// A parsed node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Literal text.
    Text(String),
    /// An action whose name is the resolved concatenation of its children.
    Action(Vec<Node>),
}

impl Node {
    /// Write this node back in source form.
    fn flatten_into(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(t),
            Node::Action(children) => {
                out.push_str("(_");
                for child in children {
                    child.flatten_into(out);
                }
                out.push_str("_)");
            }
        }
    }

    /// The literal text of an action's name, skipping nested actions.
    pub fn literal_name(&self) -> String {
        match self {
            Node::Text(t) => t.clone(),
            Node::Action(children) => children
                .iter()
                .filter_map(|c| match c {
                    Node::Text(t) => Some(t.as_str()),
                    Node::Action(_) => None,
                })
                .collect(),
        }
    }

    /// Whether this is an action whose name depends on nested actions.
    pub fn is_built(&self) -> bool {
        match self {
            Node::Text(_) => false,
            Node::Action(children) => children.iter().any(|c| matches!(c, Node::Action(_))),
        }
    }
}

/// Where a body stopped making sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A `_)` with no open action, at this byte offset.
    #[error("unexpected close at offset {offset}")]
    UnexpectedClose { offset: usize },
    /// Input ended while an action was still open.
    #[error("missing close at offset {offset}")]
    MissingClose { offset: usize },
}

/// Parse `text` into a list of top-level nodes.
pub fn parse(text: &str) -> Result<Vec<Node>, ParseError> {
    // Fast path: nothing to interpret.
    if !text.contains("(_") && !text.contains("_)") {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        return Ok(vec![Node::Text(text.to_string())]);
    }

    let bytes = text.as_bytes();
    // Stack of open frames; the bottom frame is the top level.
    let mut stack: Vec<Vec<Node>> = vec![Vec::new()];
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i..].starts_with(OPEN) {
            push_text(&mut stack, &text[text_start..i]);
            stack.push(Vec::new());
            i += OPEN.len();
            text_start = i;
            continue;
        }

        if bytes[i..].starts_with(CLOSE) {
            if stack.len() == 1 {
                return Err(ParseError::UnexpectedClose { offset: i });
            }
            push_text(&mut stack, &text[text_start..i]);
            let children = stack.pop().unwrap_or_default();
            if let Some(parent) = stack.last_mut() {
                parent.push(Node::Action(children));
            }
            i += CLOSE.len();
            text_start = i;
            continue;
        }

        i += 1;
    }

    if stack.len() > 1 {
        return Err(ParseError::MissingClose { offset: text.len() });
    }

    push_text(&mut stack, &text[text_start..]);
    Ok(stack.pop().unwrap_or_default())
}

fn push_text(stack: &mut [Vec<Node>], s: &str) {
    if s.is_empty() {
        return;
    }
    if let Some(frame) = stack.last_mut() {
        frame.push(Node::Text(s.to_string()));
    }
}

/// Visit every action node, outermost first.
pub fn visit_actions<'a>(nodes: &'a [Node], f: &mut impl FnMut(&'a Node)) {
    for node in nodes {
        if let Node::Action(children) = node {
            f(node);
            visit_actions(children, f);
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.flatten_into(&mut out);
        f.write_str(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Node {
        Node::Text(s.to_string())
    }

    fn flatten(nodes: &[Node]) -> String {
        nodes.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn plain_text_is_single_leaf() {
        assert_eq!(parse("just words").unwrap(), vec![text("just words")]);
        assert_eq!(parse("").unwrap(), vec![]);
    }

    #[test]
    fn single_action() {
        let nodes = parse("FOUND THE (_PARAMETER_CAPS_), HAVE YE?").unwrap();
        assert_eq!(
            nodes,
            vec![
                text("FOUND THE "),
                Node::Action(vec![text("PARAMETER_CAPS")]),
                text(", HAVE YE?"),
            ]
        );
    }

    #[test]
    fn nested_actions_compose() {
        let nodes = parse("(_VARS_(_PARAMETER_)_GET_)!").unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::Action(vec![
                    text("VARS_"),
                    Node::Action(vec![text("PARAMETER")]),
                    text("_GET"),
                ]),
                text("!"),
            ]
        );
    }

    #[test]
    fn inner_close_then_outer_close() {
        let nodes = parse("(_A(_B_)_)").unwrap();
        assert_eq!(
            nodes,
            vec![Node::Action(vec![text("A"), Node::Action(vec![text("B")])])]
        );
    }

    #[test]
    fn missing_close_reports_trailing_offset() {
        let input = "this action (_ is not closed";
        assert_eq!(
            parse(input),
            Err(ParseError::MissingClose { offset: input.len() })
        );
    }

    #[test]
    fn unexpected_close_reports_its_offset() {
        assert_eq!(
            parse("has a _) inside"),
            Err(ParseError::UnexpectedClose { offset: 6 })
        );
    }

    #[test]
    fn flatten_reconstructs_source() {
        for input in [
            "no markers at all",
            "(_USER_)",
            "Hi (_USER_), you said (_PARAMETER_) and (_PARAMETER_CAPS_).",
            "(_VARS_(_PARAMETER_)_INCREMENT_(_PARAMETER_)_) done",
            "a(_b(_c(_d_)e_)f_)g",
            "unicode ✓ (_USER_DISPLAY_) ✓",
        ] {
            assert_eq!(flatten(&parse(input).unwrap()), input);
        }
    }

    #[test]
    fn literal_names() {
        let nodes = parse("(_PURGE_) (_VARS_(_USER_)_GET_)").unwrap();
        let mut names = Vec::new();
        visit_actions(&nodes, &mut |n| names.push((n.literal_name(), n.is_built())));
        assert_eq!(
            names,
            vec![
                ("PURGE".to_string(), false),
                ("VARS__GET".to_string(), true),
                ("USER".to_string(), false),
            ]
        );
    }
}
