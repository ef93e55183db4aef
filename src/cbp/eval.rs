//! Bottom-up evaluation of parsed bodies.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};

use super::Node;

/// Resolves a fully-expanded action name to its replacement text.
///
/// `node` is the action the name was expanded from.
#[async_trait]
pub trait ActionResolver: Send {
    type Error: Send;

    async fn action(&mut self, name: &str, node: &Node) -> Result<String, Self::Error>;
}

/// Evaluate `nodes` into a string.
///
/// Children of an action are resolved first; their concatenation is the
/// action name handed to the resolver. The tree is never modified, so one
/// cached tree can be evaluated by many sessions at once.
pub fn walk<'a, R>(nodes: &'a [Node], resolver: &'a mut R) -> BoxFuture<'a, Result<String, R::Error>>
where
    R: ActionResolver + ?Sized,
{
    async move {
        let mut out = String::new();
        for node in nodes {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Action(children) => {
                    let name = walk(children, &mut *resolver).await?;
                    let value = resolver.action(&name, node).await?;
                    out.push_str(&value);
                }
            }
        }
        Ok(out)
    }
    .boxed()
}

/// Semicolon-delimited parameters consumed left to right.
///
/// One cursor is shared across an entire evaluation.
#[derive(Debug, Clone, Default)]
pub struct Params {
    parts: Vec<String>,
    next: usize,
}

impl Params {
    pub fn new(args: &str) -> Self {
        let args = args.trim();
        let parts = if args.is_empty() {
            Vec::new()
        } else {
            args.split(';').map(|p| p.trim().to_string()).collect()
        };
        Self { parts, next: 0 }
    }

    /// Take the next parameter, if any is left.
    pub fn next_param(&mut self) -> Option<String> {
        let p = self.parts.get(self.next).cloned();
        if p.is_some() {
            self.next += 1;
        }
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cbp::parse;

    struct Recorder {
        params: Params,
        seen: Vec<String>,
    }

    #[async_trait]
    impl ActionResolver for Recorder {
        type Error = String;

        async fn action(&mut self, name: &str, _node: &Node) -> Result<String, String> {
            self.seen.push(name.to_string());
            match name {
                "PARAMETER" => Ok(self.params.next_param().unwrap_or_default()),
                "PARAMETER_CAPS" => Ok(self.params.next_param().unwrap_or_default().to_uppercase()),
                "INNER" => Ok("NER".to_string()),
                "INNER_NER" => Ok("done".to_string()),
                other => Err(format!("unknown action {other}")),
            }
        }
    }

    fn recorder(args: &str) -> Recorder {
        Recorder {
            params: Params::new(args),
            seen: Vec::new(),
        }
    }

    #[tokio::test]
    async fn resolves_post_order() {
        let nodes = parse("(_INNER_(_INNER_)_)").unwrap();
        let mut r = recorder("");
        let out = walk(&nodes, &mut r).await.unwrap();
        assert_eq!(out, "done");
        assert_eq!(r.seen, vec!["INNER", "INNER_NER"]);
    }

    #[tokio::test]
    async fn params_advance_across_evaluation() {
        let nodes = parse("(_PARAMETER_) then (_PARAMETER_CAPS_) then (_PARAMETER_).").unwrap();
        let mut r = recorder("one; two ;three");
        assert_eq!(walk(&nodes, &mut r).await.unwrap(), "one then TWO then three.");
    }

    #[tokio::test]
    async fn unknown_action_fails_whole_evaluation() {
        let nodes = parse("ok (_NOPE_) ok").unwrap();
        let mut r = recorder("");
        assert_eq!(
            walk(&nodes, &mut r).await,
            Err("unknown action NOPE".to_string())
        );
    }

    #[test]
    fn params_split_on_semicolons() {
        let mut p = Params::new("working command");
        assert_eq!(p.next_param().as_deref(), Some("working command"));
        assert_eq!(p.next_param(), None);
        assert_eq!(Params::new("   ").next_param(), None);
    }
}
