use std::collections::HashSet;

use flowopt_core::{Graph, NodeId, Port, PortDirection};

use super::{BoxMatcher, InputKey, Match, MatchContext, Matcher, MatcherExt};
use crate::walk::is_recursive_boundary;

/// A named input of [`by_id_and_inputs`].
pub struct InputSpec {
    port: String,
    alias: Option<String>,
    matcher: BoxMatcher,
}

impl InputSpec {
    /// Stores the match under `alias` instead of the port name.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// Binds the producer of input `name` to `matcher`.
pub fn port<M: Matcher + 'static>(name: impl Into<String>, matcher: M) -> InputSpec {
    InputSpec {
        port: name.into(),
        alias: None,
        matcher: matcher.boxed(),
    }
}

/// Input patterns of [`by_id_and_inputs`].
pub enum Inputs {
    /// Each pattern names its port.
    Named(Vec<InputSpec>),
    /// Patterns are assigned greedily, in order, to the first unused input
    /// port (in argument order) they match.
    Positional(Vec<BoxMatcher>),
}

pub fn named(specs: impl IntoIterator<Item = InputSpec>) -> Inputs {
    Inputs::Named(specs.into_iter().collect())
}

pub fn positional(matchers: impl IntoIterator<Item = BoxMatcher>) -> Inputs {
    Inputs::Positional(matchers.into_iter().collect())
}

pub struct ByIdAndInputs {
    kind: String,
    inputs: Inputs,
}

impl Matcher for ByIdAndInputs {
    fn matches(&self, ctx: &mut MatchContext, graph: &Graph, node: NodeId, port: Option<&str>) -> Option<Match> {
        let value = graph.node(node)?;
        if value.kind != self.kind {
            return None;
        }
        let mut result = Match::new(node);
        result.port = port.map(str::to_string);
        match &self.inputs {
            Inputs::Named(specs) => {
                for spec in specs {
                    let m = match_input(ctx, graph, node, &spec.port, &spec.matcher)?;
                    let key = spec.alias.as_deref().unwrap_or(&spec.port);
                    result.inputs.insert(InputKey::from(key), m);
                }
            }
            Inputs::Positional(matchers) => {
                let mut unused = graph.input_ports(node);
                for (index, matcher) in matchers.iter().enumerate() {
                    let (at, m) = unused.iter().enumerate().find_map(|(at, p)| {
                        let snapshot = ctx.snapshot();
                        match match_input(ctx, graph, node, p, matcher) {
                            Some(m) => Some((at, m)),
                            None => {
                                ctx.restore(snapshot);
                                None
                            }
                        }
                    })?;
                    unused.remove(at);
                    result.inputs.insert(InputKey::Index(index), m);
                }
            }
        }
        tracing::trace!(kind = %self.kind, node = %graph.label(node), "matched");
        Some(result)
    }
}

/// Matches a node of `kind` whose inputs satisfy `inputs`.
pub fn by_id_and_inputs(kind: impl Into<String>, inputs: Inputs) -> ByIdAndInputs {
    ByIdAndInputs {
        kind: kind.into(),
        inputs,
    }
}

/// Matches any node of `kind`.
pub fn by_id(kind: impl Into<String>) -> ByIdAndInputs {
    by_id_and_inputs(kind, Inputs::Named(Vec::new()))
}

/// Traces the single producer of `(consumer, in_port)` and tests `matcher`
/// on it.
///
/// The path to the producer is followed one edge at a time. Every node the
/// value leaves through an output port is a candidate, outermost wrapper
/// first, so a compound that does not match is stepped into until an
/// atomic node is tried. Recursive boundaries are not entered. An input
/// whose path ends at an unbound parameter only satisfies matchers that
/// accept unbound inputs.
fn match_input(
    ctx: &mut MatchContext,
    graph: &Graph,
    consumer: NodeId,
    in_port: &str,
    matcher: &BoxMatcher,
) -> Option<Match> {
    let mut next = graph.predecessors(consumer, in_port);
    if next.is_empty() {
        return matcher
            .accepts_unbound()
            .then(|| bound(Match::dangling(consumer, None), in_port));
    }
    let mut visited = HashSet::new();
    loop {
        if next.len() != 1 {
            return None;
        }
        let current: Port = next.remove(0);
        if !visited.insert(current.clone()) {
            return None;
        }
        let node = graph.node(current.node)?;
        let opaque = node.atomic || is_recursive_boundary(node);
        if node.port_direction(&current.port) == Some(PortDirection::Output) {
            let snapshot = ctx.snapshot();
            if let Some(mut m) = matcher.matches(ctx, graph, current.node, Some(&current.port)) {
                if m.port.is_none() {
                    m.port = Some(current.port.clone());
                }
                return Some(bound(m, in_port));
            }
            ctx.restore(snapshot);
            if opaque {
                return None;
            }
        } else if opaque {
            return dangling(ctx, graph, matcher, current, in_port);
        }
        next = graph.predecessors(current.node, &current.port);
        if next.is_empty() {
            return dangling(ctx, graph, matcher, current, in_port);
        }
    }
}

fn dangling(
    ctx: &mut MatchContext,
    graph: &Graph,
    matcher: &BoxMatcher,
    at: Port,
    in_port: &str,
) -> Option<Match> {
    if !matcher.accepts_unbound() {
        return None;
    }
    let mut m = matcher.matches(ctx, graph, at.node, Some(&at.port))?;
    m.node = at.node;
    m.port = Some(at.port);
    m.dangling = true;
    Some(bound(m, in_port))
}

fn bound(mut m: Match, in_port: &str) -> Match {
    m.in_port = Some(in_port.to_string());
    m
}
