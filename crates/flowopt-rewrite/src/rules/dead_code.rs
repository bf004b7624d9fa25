use std::collections::HashSet;

use flowopt_core::{Graph, NodeId, Port};

use super::literal;
use crate::error::RewriteError;
use crate::eval::truthy;
use crate::matcher::{any_with, by_id_and_inputs, constant_node, named, port, AnyOptions, Match};
use crate::nodes::{LAMBDA, MUX};
use crate::rewriter::{bridge_over, Bridge};
use crate::rule::{FnRule, RewriteRule};
use crate::walk::{self, is_recursive_boundary};

/// A mux with a literal control is replaced by the branch it selects.
pub fn replace_constant_mux() -> RewriteRule {
    let branch = || any_with(AnyOptions { require_node: false });
    RewriteRule::new(
        "replace_constant_mux",
        "replace mux with a constant control",
        by_id_and_inputs(
            MUX,
            named([
                port("control", constant_node()),
                port("input1", branch()),
                port("input2", branch()),
            ]),
        ),
        bridge_over(|graph: &Graph, m: &Match| {
            let side = if truthy(&literal(graph, m, "control")?) { "input1" } else { "input2" };
            Ok(graph
                .predecessors(m.node, side)
                .into_iter()
                .take(1)
                .map(|source| Bridge {
                    source,
                    target: Port::new(m.node, "output"),
                })
                .collect())
        }),
    )
}

/// Removes every node that no sink depends on.
pub fn remove_unused_branches() -> FnRule<fn(&mut Graph) -> Result<bool, RewriteError>> {
    FnRule::new(
        "remove_unused_branches",
        "remove unused branches",
        remove_unused as fn(&mut Graph) -> Result<bool, RewriteError>,
    )
}

fn remove_unused(graph: &mut Graph) -> Result<bool, RewriteError> {
    let sinks: Vec<NodeId> = graph
        .node_ids()
        .into_iter()
        .filter(|&n| graph.node(n).is_some_and(|v| v.is_sink))
        .collect();
    if sinks.is_empty() {
        return Ok(false);
    }

    let mut required = HashSet::new();
    let mut queue = sinks;
    while let Some(node) = queue.pop() {
        if !required.insert(node) {
            continue;
        }
        if let Some(parent) = graph.parent(node) {
            queue.push(parent);
        }
        let Some(value) = graph.node(node) else {
            continue;
        };
        // Lambda bodies and recursive definitions are kept whole.
        if value.kind == LAMBDA || is_recursive_boundary(value) {
            queue.extend(graph.descendants(node));
        }
        for input in graph.input_ports(node) {
            queue.extend(walk::predecessors(graph, node, &input).iter().map(|p| p.node));
        }
    }

    let unused: Vec<NodeId> = graph
        .node_ids()
        .into_iter()
        .filter(|n| !required.contains(n))
        .collect();
    let mut removed = false;
    for node in unused {
        if graph.contains_node(node) {
            graph.remove_subtree(node)?;
            removed = true;
        }
    }
    if removed {
        tracing::debug!(kept = required.len(), "removed unused branches");
    }
    Ok(removed)
}
