//! Rules on compound nodes and recursive definitions.

use flowopt_core::{Graph, NodeId, Port};

use crate::edit::{
    create_input_port, is_unnecessary_compound, move_predecessors_into, remove_port, unique_shared_port_name,
    unpack_compound_node,
};
use crate::error::RewriteError;
use crate::matcher::{from_fn as matcher_fn, is_movable, Match, MatchContext};
use crate::recursion::{self, match_linear_recursive_compound, match_tail_recursive_compound, recursive_calls};
use crate::rewriter::from_fn;
use crate::rule::RewriteRule;
use crate::walk::{self, WalkOptions};

/// Unpacks compounds whose nesting carries no meaning.
pub fn remove_unnecessary_compounds() -> RewriteRule {
    RewriteRule::new(
        "remove_unnecessary_compounds",
        "remove unnecessary compounds",
        matcher_fn(|_: &mut MatchContext, graph: &Graph, node: NodeId, _: Option<&str>| {
            is_unnecessary_compound(graph, node).then(|| Match::new(node))
        }),
        from_fn(|graph, m| unpack_compound_node(graph, m.node)),
    )
}

// ---------------------------------------------------------------------------
// move_inputs_into_recursive_compounds
// ---------------------------------------------------------------------------

/// An input of a recursive definition that receives the same value on the
/// initial call and on every recursive call.
fn constant_input_port(graph: &Graph, root: NodeId, calls: &[NodeId]) -> Option<(String, Port)> {
    graph.input_ports(root).into_iter().find_map(|port| {
        let outer = walk::predecessors(graph, root, &port);
        let [producer] = outer.as_slice() else {
            return None;
        };
        let raw = graph.predecessors(root, &port);
        if raw.as_slice() != [producer.clone()] || !is_movable(graph, producer.node) {
            return None;
        }
        let same_everywhere = calls.iter().all(|&call| {
            let inner = walk::predecessors_with(graph, call, &port, WalkOptions::crossing());
            inner.as_slice() == [producer.clone()]
        });
        same_everywhere.then(|| (port, producer.clone()))
    })
}

/// Moves an argument that never changes between recursive calls into the
/// recursive definition and drops the parameter.
pub fn move_inputs_into_recursive_compounds() -> RewriteRule {
    RewriteRule::new(
        "move_inputs_into_recursive_compounds",
        "move constant input into recursive compound",
        matcher_fn(|_: &mut MatchContext, graph: &Graph, node: NodeId, _: Option<&str>| {
            if graph.node(node)?.atomic {
                return None;
            }
            let calls = recursive_calls(graph, node);
            if calls.is_empty() {
                return None;
            }
            constant_input_port(graph, node, &calls).map(|_| Match::new(node))
        }),
        from_fn(|graph, m| {
            let root = m.node;
            let calls = recursive_calls(graph, root);
            let (port, producer) = constant_input_port(graph, root, &calls)
                .ok_or_else(|| RewriteError::malformed("constant input disappeared before the rewrite"))?;
            let consumers: Vec<Port> = graph
                .successors(root, &port)
                .into_iter()
                .filter(|c| !calls.contains(&c.node))
                .collect();

            move_predecessors_into(graph, &Port::new(root, port.as_str()), root)?;
            for consumer in &consumers {
                graph.add_edge(&producer, consumer)?;
            }
            remove_port(graph, root, &port)?;
            for call in calls {
                remove_port(graph, call, &port)?;
            }
            tracing::debug!(root = %graph.label(root), port = %port, "moved constant input into recursion");
            Ok(())
        }),
    )
}

// ---------------------------------------------------------------------------
// Recursion normalizers
// ---------------------------------------------------------------------------

pub fn linear_recursion_to_tail_recursion() -> RewriteRule {
    RewriteRule::new(
        "linear_recursion_to_tail_recursion",
        "convert linear recursion to tail recursion",
        matcher_fn(|_: &mut MatchContext, graph: &Graph, node: NodeId, _: Option<&str>| {
            match_linear_recursive_compound(graph, node).map(|_| Match::new(node))
        }),
        from_fn(|graph, m| {
            let recursion = match_linear_recursive_compound(graph, m.node)
                .ok_or_else(|| RewriteError::malformed("linear recursion changed before the rewrite"))?;
            recursion::linear_recursion_to_tail_recursion(graph, &recursion)
        }),
    )
}

pub fn tail_recursion_to_loop() -> RewriteRule {
    RewriteRule::new(
        "tail_recursion_to_loop",
        "convert tail recursion to a loop",
        matcher_fn(|_: &mut MatchContext, graph: &Graph, node: NodeId, _: Option<&str>| {
            match_tail_recursive_compound(graph, node).map(|_| Match::new(node))
        }),
        from_fn(|graph, m| {
            let recursion = match_tail_recursive_compound(graph, m.node)
                .ok_or_else(|| RewriteError::malformed("tail recursion changed before the rewrite"))?;
            recursion::tail_recursion_to_loop(graph, &recursion)
        }),
    )
}

// ---------------------------------------------------------------------------
// move_constants_out_of_recursive_compounds
// ---------------------------------------------------------------------------

/// Children of a recursive root that depend on nothing and can be hoisted.
fn hoistable_children(graph: &Graph, root: NodeId) -> Vec<NodeId> {
    graph
        .children(root)
        .into_iter()
        .filter(|&c| {
            graph.node(c).is_some_and(|v| {
                !v.recursive && !v.is_sink && !v.side_effects && v.input_ports.is_empty() && v.output_ports.len() == 1
            }) && !graph.has_children(c)
                && is_movable(graph, c)
        })
        .collect()
}

/// Hoists input-free children of a recursive definition out of it. Each
/// hoisted value enters through a new parameter that every recursive call
/// passes on unchanged.
pub fn move_constants_out_of_recursive_compounds() -> RewriteRule {
    RewriteRule::new(
        "move_constants_out_of_recursive_compounds",
        "move constants out of recursive compounds",
        matcher_fn(|_: &mut MatchContext, graph: &Graph, node: NodeId, _: Option<&str>| {
            let value = graph.node(node)?;
            if value.atomic || !value.recursive_root {
                return None;
            }
            let calls = recursive_calls(graph, node);
            if calls.iter().any(|&c| graph.parent(c) != Some(node)) || hoistable_children(graph, node).is_empty() {
                return None;
            }
            Some(Match::new(node))
        }),
        from_fn(|graph, m| hoist_constants(graph, m.node)),
    )
}

fn hoist_constants(graph: &mut Graph, root: NodeId) -> Result<(), RewriteError> {
    let calls = recursive_calls(graph, root);
    let outer = graph.parent(root);
    for child in hoistable_children(graph, root) {
        let output = graph
            .output_ports(child)
            .into_iter()
            .next()
            .ok_or_else(|| RewriteError::malformed("hoisted node has no output"))?;
        let ty = graph.require(child)?.port_type(&output).unwrap_or("generic").to_string();
        let consumers = graph.successors(child, &output);
        for id in graph.edges_from(child, &output) {
            graph.remove_edge(id)?;
        }
        graph.set_parent(child, outer)?;

        let mut owners = vec![root];
        owners.extend(&calls);
        let name = unique_shared_port_name(graph, &owners, &graph.label(child));
        let parameter = Port::new(root, name.as_str());
        create_input_port(graph, root, &name, &ty)?;
        graph.add_edge(&Port::new(child, output.as_str()), &parameter)?;
        for consumer in &consumers {
            graph.add_edge(&parameter, consumer)?;
        }
        for &call in &calls {
            create_input_port(graph, call, &name, &ty)?;
            graph.add_edge(&parameter, &Port::new(call, name.as_str()))?;
        }
        tracing::debug!(root = %graph.label(root), parameter = %name, "hoisted constant out of recursion");
    }
    Ok(())
}
