use std::collections::HashSet;

use flowopt_core::{Graph, NodeId};

use super::basic::{capture, same_as, with_state};
use super::inputs::{by_id_and_inputs, named, port, InputSpec};
use super::{Match, Matcher};

/// Returns `true` if `(node, port)` is the producer recorded in `bound`, or
/// a node structurally equal to it.
pub(crate) fn same_producer(graph: &Graph, bound: &Match, node: NodeId, port: Option<&str>) -> bool {
    if bound.node == node && bound.port.as_deref() == port {
        return true;
    }
    !bound.dangling && bound.port.as_deref() == port && structurally_equal(graph, bound.node, node)
}

/// Two nodes are structurally equal when they have the same kind, ports and
/// parameters, no children, and pairwise equal producers on every input.
pub fn structurally_equal(graph: &Graph, a: NodeId, b: NodeId) -> bool {
    let mut seen = HashSet::new();
    equal(graph, a, b, &mut seen)
}

fn equal(graph: &Graph, a: NodeId, b: NodeId, seen: &mut HashSet<(NodeId, NodeId)>) -> bool {
    if a == b {
        return true;
    }
    if !seen.insert((a, b)) {
        return true;
    }
    let (Some(x), Some(y)) = (graph.node(a), graph.node(b)) else {
        return false;
    };
    if x.kind != y.kind
        || x.atomic != y.atomic
        || x.params != y.params
        || x.input_ports != y.input_ports
        || x.output_ports != y.output_ports
        || x.recursive != y.recursive
        || graph.has_children(a)
        || graph.has_children(b)
    {
        return false;
    }
    x.input_ports.keys().all(|p| {
        let pa = graph.predecessors(a, p);
        let pb = graph.predecessors(b, p);
        pa.len() == pb.len()
            && pa.iter().zip(pb.iter()).all(|(u, v)| {
                u == v || (u.port == v.port && equal(graph, u.node, v.node, seen))
            })
    })
}

/// Matches a node of `kind` whose `ports` are all bound to the same (or a
/// structurally equal) producer, which must satisfy `inner`. The producer
/// match is stored under the first port.
pub fn by_id_and_same_inputs<M: Matcher + 'static>(
    kind: &str,
    ports: &[&str],
    inner: M,
) -> impl Matcher {
    let mut specs: Vec<InputSpec> = Vec::new();
    let mut names = ports.iter();
    if let Some(first) = names.next() {
        specs.push(port(*first, capture("same", inner)));
    }
    for name in names {
        specs.push(port(*name, same_as("same")));
    }
    with_state(by_id_and_inputs(kind, named(specs)))
}
