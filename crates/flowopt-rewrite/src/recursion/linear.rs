//! Linear recursion to tail recursion.
//!
//! `f(x) = c ? base : op(f(x'), other)` becomes
//! `f(x, acc) = c ? op(base, acc) : f(x', op(other, acc))`, seeded with the
//! neutral element of `op`. The rewrite is only valid for associative
//! operations; the known monoids below are assumed to be.

use flowopt_core::{Graph, NodeId, Port};

use super::{recursive_calls, single_producer};
use crate::edit::{create_input_port, unique_shared_port_name};
use crate::error::RewriteError;
use crate::nodes::{self, MUX};

/// An associative operation with a neutral element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Monoid {
    pub kind: &'static str,
    pub neutral: f64,
}

pub const KNOWN_MONOIDS: [Monoid; 2] = [
    Monoid {
        kind: "math/multiply",
        neutral: 1.0,
    },
    Monoid {
        kind: "math/add",
        neutral: 0.0,
    },
];

pub fn monoid(kind: &str) -> Option<Monoid> {
    KNOWN_MONOIDS.iter().copied().find(|m| m.kind == kind)
}

/// A linear-recursive definition.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRecursion {
    pub root: NodeId,
    pub call: NodeId,
    pub mux: NodeId,
    /// Mux input fed by the operation.
    pub recursive_side: String,
    /// The other mux input.
    pub base_side: String,
    pub operation: NodeId,
    /// Input of the operation fed by the recursive call.
    pub call_port: String,
    /// The other input of the operation.
    pub other_port: String,
    pub monoid: Monoid,
}

/// The operation on `side` of `mux`, if it combines the result of `call`
/// with one other value and is consumed by nothing else.
fn operation_on(graph: &Graph, root: NodeId, mux: NodeId, side: &str, call: NodeId) -> Option<(NodeId, String, String, Monoid)> {
    let producer = single_producer(graph, mux, side)?;
    let op = producer.node;
    let value = graph.node(op)?;
    let monoid = monoid(&value.kind)?;
    if graph.parent(op) != Some(root) || graph.successors(op, &producer.port).len() != 1 {
        return None;
    }
    let [result]: [String; 1] = graph.output_ports(op).try_into().ok()?;
    if result != producer.port {
        return None;
    }
    let inputs = graph.input_ports(op);
    let [first, second] = inputs.as_slice() else {
        return None;
    };
    let from_call = |p: &str| single_producer(graph, op, p).is_some_and(|s| s.node == call);
    let (call_port, other_port) = match (from_call(first), from_call(second)) {
        (true, false) => (first.clone(), second.clone()),
        (false, true) => (second.clone(), first.clone()),
        _ => return None,
    };
    single_producer(graph, op, &other_port)?;
    let call_consumers = graph
        .output_ports(call)
        .iter()
        .flat_map(|p| graph.successors(call, p))
        .collect::<Vec<_>>();
    if call_consumers != [Port::new(op, call_port.clone())] {
        return None;
    }
    Some((op, call_port, other_port, monoid))
}

/// Matches a recursive root with exactly one recursive call, whose output
/// is a mux choosing between a base value and a known monoid operation
/// applied to the call's result.
pub fn match_linear_recursive_compound(graph: &Graph, node: NodeId) -> Option<LinearRecursion> {
    let value = graph.node(node)?;
    if !value.recursive_root || value.atomic {
        return None;
    }
    let [output]: [String; 1] = graph.output_ports(node).try_into().ok()?;
    let [call]: [NodeId; 1] = recursive_calls(graph, node).try_into().ok()?;
    if graph.parent(call) != Some(node) {
        return None;
    }
    let producer = single_producer(graph, node, &output)?;
    let mux = producer.node;
    if graph.parent(mux) != Some(node) || graph.node(mux)?.kind != MUX {
        return None;
    }
    for (recursive_side, base_side) in [("input1", "input2"), ("input2", "input1")] {
        if let Some((operation, call_port, other_port, monoid)) = operation_on(graph, node, mux, recursive_side, call) {
            single_producer(graph, mux, base_side)?;
            return Some(LinearRecursion {
                root: node,
                call,
                mux,
                recursive_side: recursive_side.to_string(),
                base_side: base_side.to_string(),
                operation,
                call_port,
                other_port,
                monoid,
            });
        }
    }
    None
}

/// Threads an accumulator through a linear-recursive definition, leaving a
/// tail-recursive one.
pub fn linear_recursion_to_tail_recursion(graph: &mut Graph, recursion: &LinearRecursion) -> Result<(), RewriteError> {
    let LinearRecursion {
        root,
        call,
        mux,
        operation,
        monoid,
        ..
    } = *recursion;
    let missing = || RewriteError::malformed("linear recursion changed before the rewrite");

    let op_inputs = graph.input_ports(operation);
    let op_output = graph.output_ports(operation).into_iter().next().ok_or_else(missing)?;
    let call_output = graph.output_ports(call).into_iter().next().ok_or_else(missing)?;
    let base = single_producer(graph, mux, &recursion.base_side).ok_or_else(missing)?;
    let other = single_producer(graph, operation, &recursion.other_port).ok_or_else(missing)?;
    let call_is_left = op_inputs.first() == Some(&recursion.call_port);
    if op_inputs.len() != 2 {
        return Err(missing());
    }
    let template = graph.require(operation)?.clone();

    let accumulator = unique_shared_port_name(graph, &[root, call], "accumulator");
    create_input_port(graph, root, &accumulator, "number")?;
    create_input_port(graph, call, &accumulator, "number")?;
    let acc = Port::new(root, accumulator.clone());

    let seed = graph.add_node_in(nodes::constant_number(monoid.neutral), graph.parent(root))?;
    graph.add_edge(&Port::new(seed, "output"), &acc)?;

    for id in graph.edges_into(mux, &recursion.base_side) {
        graph.remove_edge(id)?;
    }
    graph.remove_node(operation)?;

    let op_base = graph.add_node_in(template.clone(), Some(root))?;
    let op_update = graph.add_node_in(template, Some(root))?;
    let [left, right] = op_inputs.as_slice() else {
        return Err(missing());
    };
    if call_is_left {
        graph.add_edge(&base, &Port::new(op_base, left.as_str()))?;
        graph.add_edge(&acc, &Port::new(op_base, right.as_str()))?;
        graph.add_edge(&other, &Port::new(op_update, left.as_str()))?;
        graph.add_edge(&acc, &Port::new(op_update, right.as_str()))?;
    } else {
        graph.add_edge(&acc, &Port::new(op_base, left.as_str()))?;
        graph.add_edge(&base, &Port::new(op_base, right.as_str()))?;
        graph.add_edge(&acc, &Port::new(op_update, left.as_str()))?;
        graph.add_edge(&other, &Port::new(op_update, right.as_str()))?;
    }
    graph.add_edge(&Port::new(call, call_output), &Port::new(mux, recursion.recursive_side.as_str()))?;
    graph.add_edge(&Port::new(op_base, op_output.as_str()), &Port::new(mux, recursion.base_side.as_str()))?;
    graph.add_edge(&Port::new(op_update, op_output.as_str()), &Port::new(call, accumulator.as_str()))?;
    tracing::debug!(
        root = %graph.label(root),
        operation = monoid.kind,
        "threaded accumulator through linear recursion"
    );
    Ok(())
}
