//! Recursion normalizers.
//!
//! A recursive function is a compound marked `recursiveRoot`; its recursive
//! calls are childless nodes of the same kind nested inside it. Linear
//! recursion over a known monoid is first turned into tail recursion, and
//! tail recursion into a `tailrec` loop node.

mod lambda;
mod linear;
mod tail;

pub use lambda::{extract_into_lambda, LambdaOutput, IMPLEMENTATION};
pub use linear::{
    linear_recursion_to_tail_recursion, match_linear_recursive_compound, monoid, LinearRecursion, Monoid,
    KNOWN_MONOIDS,
};
pub use tail::{match_tail_recursive_compound, tail_recursion_to_loop, BranchValue, TailBranch, TailRecursion};

use flowopt_core::{Graph, NodeId, Port};

/// The recursive calls nested anywhere inside `root`.
pub fn recursive_calls(graph: &Graph, root: NodeId) -> Vec<NodeId> {
    let Some(kind) = graph.node(root).map(|n| n.kind.as_str()) else {
        return Vec::new();
    };
    graph
        .descendants(root)
        .into_iter()
        .filter(|&n| {
            !graph.has_children(n) && graph.node(n).is_some_and(|v| v.kind == kind && !v.recursive_root)
        })
        .collect()
}

/// The producer of `(node, port)` when there is exactly one edge into it.
pub(crate) fn single_producer(graph: &Graph, node: NodeId, port: &str) -> Option<Port> {
    let producers = graph.predecessors(node, port);
    match producers.as_slice() {
        [single] => Some(single.clone()),
        _ => None,
    }
}
