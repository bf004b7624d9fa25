use std::cell::Cell;

use flowopt_core::{Graph, NodeId};

use super::{same::same_producer, BoxMatcher, Match, MatchContext, Matcher};

/// Options of [`any_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnyOptions {
    /// When `false`, an input without a producer node matches as well.
    pub require_node: bool,
}

impl Default for AnyOptions {
    fn default() -> Self {
        AnyOptions { require_node: true }
    }
}

pub struct Any {
    options: AnyOptions,
}

impl Matcher for Any {
    fn matches(&self, _: &mut MatchContext, _: &Graph, node: NodeId, _: Option<&str>) -> Option<Match> {
        Some(Match::new(node))
    }

    fn accepts_unbound(&self) -> bool {
        !self.options.require_node
    }
}

/// Matches every node.
pub fn any() -> Any {
    any_with(AnyOptions::default())
}

pub fn any_with(options: AnyOptions) -> Any {
    Any { options }
}

pub struct OneOf {
    matchers: Vec<BoxMatcher>,
}

impl Matcher for OneOf {
    fn matches(&self, ctx: &mut MatchContext, graph: &Graph, node: NodeId, port: Option<&str>) -> Option<Match> {
        for matcher in &self.matchers {
            let snapshot = ctx.snapshot();
            if let Some(m) = matcher.matches(ctx, graph, node, port) {
                return Some(m);
            }
            ctx.restore(snapshot);
        }
        None
    }

    fn accepts_unbound(&self) -> bool {
        self.matchers.iter().any(|m| m.accepts_unbound())
    }
}

/// First successful matcher wins. Bindings made by a failed alternative are
/// rolled back.
pub fn one_of(matchers: impl IntoIterator<Item = BoxMatcher>) -> OneOf {
    OneOf {
        matchers: matchers.into_iter().collect(),
    }
}

pub struct FromFn<F>(F);

impl<F> Matcher for FromFn<F>
where
    F: Fn(&mut MatchContext, &Graph, NodeId, Option<&str>) -> Option<Match>,
{
    fn matches(&self, ctx: &mut MatchContext, graph: &Graph, node: NodeId, port: Option<&str>) -> Option<Match> {
        (self.0)(ctx, graph, node, port)
    }
}

/// Wraps a closure as a matcher.
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: Fn(&mut MatchContext, &Graph, NodeId, Option<&str>) -> Option<Match>,
{
    FromFn(f)
}

pub struct Once<M> {
    inner: M,
    fired: Cell<bool>,
}

impl<M: Matcher> Matcher for Once<M> {
    fn matches(&self, ctx: &mut MatchContext, graph: &Graph, node: NodeId, port: Option<&str>) -> Option<Match> {
        if self.fired.get() {
            return None;
        }
        let m = self.inner.matches(ctx, graph, node, port)?;
        self.fired.set(true);
        Some(m)
    }

    fn accepts_unbound(&self) -> bool {
        self.inner.accepts_unbound()
    }
}

/// Matches at most once over the lifetime of the matcher.
pub fn once<M: Matcher>(inner: M) -> Once<M> {
    Once {
        inner,
        fired: Cell::new(false),
    }
}

pub struct WithState<M> {
    inner: M,
}

impl<M: Matcher> Matcher for WithState<M> {
    fn matches(&self, ctx: &mut MatchContext, graph: &Graph, node: NodeId, port: Option<&str>) -> Option<Match> {
        let outer = ctx.snapshot();
        let mut local = MatchContext::new();
        let result = self.inner.matches(&mut local, graph, node, port);
        ctx.restore(outer);
        result
    }

    fn accepts_unbound(&self) -> bool {
        self.inner.accepts_unbound()
    }
}

/// Runs `inner` with bindings of its own, discarded afterwards.
pub fn with_state<M: Matcher>(inner: M) -> WithState<M> {
    WithState { inner }
}

pub struct Capture<M> {
    name: String,
    inner: M,
}

impl<M: Matcher> Matcher for Capture<M> {
    fn matches(&self, ctx: &mut MatchContext, graph: &Graph, node: NodeId, port: Option<&str>) -> Option<Match> {
        let mut m = self.inner.matches(ctx, graph, node, port)?;
        if m.port.is_none() {
            m.port = port.map(str::to_string);
        }
        ctx.bind(self.name.clone(), m.clone());
        Some(m)
    }

    fn accepts_unbound(&self) -> bool {
        self.inner.accepts_unbound()
    }
}

/// Matches like `inner` and binds the result under `name`.
pub fn capture<M: Matcher>(name: impl Into<String>, inner: M) -> Capture<M> {
    Capture {
        name: name.into(),
        inner,
    }
}

pub struct SameAs {
    name: String,
}

impl Matcher for SameAs {
    fn matches(&self, ctx: &mut MatchContext, graph: &Graph, node: NodeId, port: Option<&str>) -> Option<Match> {
        let bound = ctx.binding(&self.name)?;
        same_producer(graph, bound, node, port).then(|| Match::new(node))
    }

    fn accepts_unbound(&self) -> bool {
        true
    }
}

/// Matches the producer bound under `name`, or one structurally equal to it.
pub fn same_as(name: impl Into<String>) -> SameAs {
    SameAs { name: name.into() }
}
