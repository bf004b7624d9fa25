//! Matcher combinators.
//!
//! A [`Matcher`] tests whether a node (and, through nested matchers, the
//! producers bound to its inputs) has a given shape. A successful test
//! yields a [`Match`] tree that the rewriter consumes. Failing to match is
//! `None`, never an error.
//!
//! Matchers are values: they are built once when a rule is created and
//! shared by every scan of the graph. State that has to live across the
//! nested matchers of a single attempt is kept in the explicit
//! [`MatchContext`].
//!
//! ```ignore
//! use flowopt_rewrite::matcher::*;
//!
//! // math/add whose inputs are both literals, bound as `a` and `b`
//! let m = by_id_and_inputs(
//!     "math/add",
//!     named([
//!         port("s1", constant_node()).alias("a"),
//!         port("s2", constant_node()).alias("b"),
//!     ]),
//! );
//! ```

mod basic;
mod constant;
mod inputs;
mod lambda;
mod movable;
mod same;

pub use basic::{any, any_with, capture, from_fn, once, one_of, same_as, with_state, AnyOptions};
pub use constant::{constant_node, constant_value, is_constant, values_equal};
pub use inputs::{by_id, by_id_and_inputs, named, port, positional, InputSpec, Inputs};
pub use lambda::{lambda, lambda_implementation, LambdaOptions};
pub use movable::{is_movable, movable};
pub use same::{by_id_and_same_inputs, structurally_equal};

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;

use flowopt_core::{Graph, NodeId, Port};

use crate::error::RewriteError;

/// Key of a bound input: the port name or alias for named inputs, the
/// position for positional inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InputKey {
    Port(String),
    Index(usize),
}

impl From<&str> for InputKey {
    fn from(name: &str) -> Self {
        InputKey::Port(name.to_string())
    }
}

impl From<usize> for InputKey {
    fn from(index: usize) -> Self {
        InputKey::Index(index)
    }
}

impl fmt::Display for InputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKey::Port(name) => write!(f, "{}", name),
            InputKey::Index(i) => write!(f, "#{}", i),
        }
    }
}

/// Result of a successful match.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// The matched node.
    pub node: NodeId,
    /// Matches of the producers bound to the node's inputs.
    pub inputs: IndexMap<InputKey, Match>,
    /// Input port of the consumer this match was reached through.
    pub in_port: Option<String>,
    /// Output port of `node` the value leaves from.
    pub port: Option<String>,
    /// Set when the input is not bound to any producer node (an unbound
    /// parameter); `node` and `port` then name the boundary port.
    pub dangling: bool,
}

impl Match {
    pub fn new(node: NodeId) -> Self {
        Match {
            node,
            inputs: IndexMap::new(),
            in_port: None,
            port: None,
            dangling: false,
        }
    }

    pub fn dangling(node: NodeId, port: Option<String>) -> Self {
        Match {
            port,
            dangling: true,
            ..Match::new(node)
        }
    }

    pub fn input(&self, key: impl Into<InputKey>) -> Option<&Match> {
        self.inputs.get(&key.into())
    }

    /// Like [`Match::input`], for rewriters that rely on the matcher having
    /// bound the input.
    pub fn require(&self, key: impl Into<InputKey>) -> Result<&Match, RewriteError> {
        let key = key.into();
        self.inputs
            .get(&key)
            .ok_or_else(|| RewriteError::malformed(format!("input '{}' is not bound", key)))
    }

    /// The producer port of this match, when known.
    pub fn producer(&self) -> Option<Port> {
        self.port.as_ref().map(|p| Port::new(self.node, p.clone()))
    }

    /// The consumer input port this match was bound to.
    pub fn consumer_port(&self) -> Result<&str, RewriteError> {
        self.in_port
            .as_deref()
            .ok_or_else(|| RewriteError::malformed("match is not bound to an input port"))
    }
}

/// Named bindings shared by the nested matchers of one match attempt.
#[derive(Debug, Clone, Default)]
pub struct MatchContext {
    bindings: HashMap<String, Match>,
}

impl MatchContext {
    pub fn new() -> Self {
        MatchContext::default()
    }

    pub fn bind(&mut self, name: impl Into<String>, m: Match) {
        self.bindings.insert(name.into(), m);
    }

    pub fn binding(&self, name: &str) -> Option<&Match> {
        self.bindings.get(name)
    }

    pub fn snapshot(&self) -> MatchContext {
        self.clone()
    }

    pub fn restore(&mut self, snapshot: MatchContext) {
        *self = snapshot;
    }
}

/// A composable predicate over a node and the port it is reached through.
pub trait Matcher {
    /// Tests `node`. `port` is the output port of `node` the value was
    /// traced through, `None` when the node is tested directly.
    fn matches(&self, ctx: &mut MatchContext, graph: &Graph, node: NodeId, port: Option<&str>) -> Option<Match>;

    /// Whether an input without a producer node satisfies this matcher.
    fn accepts_unbound(&self) -> bool {
        false
    }
}

pub type BoxMatcher = Box<dyn Matcher>;

impl Matcher for BoxMatcher {
    fn matches(&self, ctx: &mut MatchContext, graph: &Graph, node: NodeId, port: Option<&str>) -> Option<Match> {
        (**self).matches(ctx, graph, node, port)
    }

    fn accepts_unbound(&self) -> bool {
        (**self).accepts_unbound()
    }
}

/// Boxing helper for building matcher lists.
pub trait MatcherExt: Matcher + Sized + 'static {
    fn boxed(self) -> BoxMatcher {
        Box::new(self)
    }
}

impl<M: Matcher + Sized + 'static> MatcherExt for M {}

/// Tests `matcher` against a node with a fresh context.
pub fn test(matcher: &dyn Matcher, graph: &Graph, node: NodeId) -> Option<Match> {
    matcher.matches(&mut MatchContext::new(), graph, node, None)
}
