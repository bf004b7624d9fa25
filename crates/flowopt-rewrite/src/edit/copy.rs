//! Deep copies of nodes and their nested subgraphs.

use std::collections::{BTreeSet, HashMap, VecDeque};

use flowopt_core::{Graph, NodeId, Port};

use crate::error::RewriteError;

/// Copies `nodes` (with all nested children) into `target`.
///
/// The whole original-to-copy table is built breadth first before any edge
/// is created. Then:
/// - edges between copied nodes are recreated between the copies,
/// - edges entering a copied node from outside are recreated from the same
///   producer,
/// - edges leaving a copied descendant for the outside are recreated,
/// - edges leaving one of the copied roots for the outside are not: a fresh
///   copy has no consumers.
///
/// Returns the original-to-copy table.
pub fn copy_nodes_into(
    graph: &mut Graph,
    nodes: &[NodeId],
    target: Option<NodeId>,
) -> Result<HashMap<NodeId, NodeId>, RewriteError> {
    let mut table = HashMap::new();
    let mut queue: VecDeque<(NodeId, Option<NodeId>)> =
        nodes.iter().map(|n| (*n, target)).collect();
    while let Some((original, parent)) = queue.pop_front() {
        if table.contains_key(&original) {
            continue;
        }
        let value = graph.require(original)?.clone();
        let copy = graph.add_node_in(value, parent)?;
        table.insert(original, copy);
        for child in graph.children(original) {
            queue.push_back((child, Some(copy)));
        }
    }

    let mut edges = BTreeSet::new();
    for original in table.keys() {
        edges.extend(graph.in_edges(*original));
        edges.extend(graph.out_edges(*original));
    }
    for id in edges {
        let Some((source, dest)) = graph.edge_ports(id) else {
            continue;
        };
        let new_source = table.get(&source.node).copied();
        let new_dest = table.get(&dest.node).copied();
        let (from, to) = match (new_source, new_dest) {
            (Some(s), Some(d)) => (Port::new(s, source.port), Port::new(d, dest.port)),
            (None, Some(d)) => (source, Port::new(d, dest.port)),
            (Some(s), None) if !nodes.contains(&source.node) => (Port::new(s, source.port), dest),
            _ => continue,
        };
        graph.add_edge(&from, &to)?;
    }
    Ok(table)
}

/// Copies one node into `target` and returns the copy.
pub fn copy_node_into(graph: &mut Graph, node: NodeId, target: Option<NodeId>) -> Result<NodeId, RewriteError> {
    let table = copy_nodes_into(graph, &[node], target)?;
    table
        .get(&node)
        .copied()
        .ok_or_else(|| RewriteError::malformed("copied node missing from the copy table"))
}

/// Copies a node next to itself.
pub fn copy_node(graph: &mut Graph, node: NodeId) -> Result<NodeId, RewriteError> {
    let parent = graph.parent(node);
    copy_node_into(graph, node, parent)
}
