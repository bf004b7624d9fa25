//! Structural edit primitives.
//!
//! Rewriters never touch petgraph directly; they compose these operations.
//! Every operation either completes or returns an error that leaves the
//! caller responsible for the graph, there is no rollback.

mod copy;
mod ports;
mod subgraph;

pub use copy::{copy_node, copy_node_into, copy_nodes_into};
pub use ports::{
    create_input_port, create_output_port, remove_port, rename_port, unique_port_name, unique_shared_port_name,
};
pub use subgraph::{create_subgraph, CreatedSubgraph, SubgraphNode, SubgraphSpec};

use std::collections::{HashSet, VecDeque};

use flowopt_core::{EdgeId, Graph, NodeId, Port, PortDirection};

use crate::error::RewriteError;
use crate::walk;

/// Kind of the nodes that wrap a lambda implementation.
pub const LAMBDA: &str = "functional/lambda";

/// One end of an edge to create: an explicit port, or a node whose single
/// port of the needed direction is selected automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeEnd {
    Port(Port),
    Node(NodeId),
}

impl From<Port> for EdgeEnd {
    fn from(port: Port) -> Self {
        EdgeEnd::Port(port)
    }
}

impl From<&Port> for EdgeEnd {
    fn from(port: &Port) -> Self {
        EdgeEnd::Port(port.clone())
    }
}

impl From<NodeId> for EdgeEnd {
    fn from(node: NodeId) -> Self {
        EdgeEnd::Node(node)
    }
}

impl From<(NodeId, &str)> for EdgeEnd {
    fn from((node, port): (NodeId, &str)) -> Self {
        EdgeEnd::Port(Port::new(node, port))
    }
}

/// Resolves an [`EdgeEnd`] to a port. Bare nodes must have exactly one port
/// in `direction`.
pub fn resolve_end(graph: &Graph, end: EdgeEnd, direction: PortDirection) -> Result<Port, RewriteError> {
    match end {
        EdgeEnd::Port(port) => Ok(port),
        EdgeEnd::Node(node) => {
            let ports = match direction {
                PortDirection::Input => graph.input_ports(node),
                PortDirection::Output => graph.output_ports(node),
            };
            match ports.as_slice() {
                [single] => Ok(Port::new(node, single.clone())),
                [] => Err(RewriteError::MissingPort {
                    node: graph.label(node),
                    direction,
                }),
                _ => Err(RewriteError::AmbiguousPort {
                    node: graph.label(node),
                    direction,
                    count: ports.len(),
                }),
            }
        }
    }
}

/// Connects `source` to `target`. A bare source selects its single output
/// port, a bare target its single input port.
pub fn create_edge(
    graph: &mut Graph,
    source: impl Into<EdgeEnd>,
    target: impl Into<EdgeEnd>,
) -> Result<EdgeId, RewriteError> {
    let source = resolve_end(graph, source.into(), PortDirection::Output)?;
    let target = resolve_end(graph, target.into(), PortDirection::Input)?;
    Ok(graph.add_edge(&source, &target)?)
}

/// Connects `source` to every consumer of the output port `target`.
pub fn create_edge_to_each_successor(
    graph: &mut Graph,
    source: impl Into<EdgeEnd>,
    target: impl Into<EdgeEnd>,
) -> Result<(), RewriteError> {
    let source = resolve_end(graph, source.into(), PortDirection::Output)?;
    let target = resolve_end(graph, target.into(), PortDirection::Output)?;
    for consumer in graph.successors(target.node, &target.port) {
        graph.add_edge(&source, &consumer)?;
    }
    Ok(())
}

/// Connects every producer of the input port `source` to `target`.
pub fn create_edge_from_each_predecessor(
    graph: &mut Graph,
    source: impl Into<EdgeEnd>,
    target: impl Into<EdgeEnd>,
) -> Result<(), RewriteError> {
    let source = resolve_end(graph, source.into(), PortDirection::Input)?;
    let target = resolve_end(graph, target.into(), PortDirection::Input)?;
    for producer in graph.predecessors(source.node, &source.port) {
        graph.add_edge(&producer, &target)?;
    }
    Ok(())
}

/// Removes every producer of `node` whose only consumers are `node` or
/// nodes nested inside it, cascading up the producer chains.
///
/// Producers are removed together with their nested children. Ancestors of
/// `node` (the scopes it lives in) are never removed.
pub fn delete_unused_predecessors(graph: &mut Graph, node: NodeId) -> Result<(), RewriteError> {
    delete_unused_into(graph, node, node)
}

fn delete_unused_into(graph: &mut Graph, consumer: NodeId, scope: NodeId) -> Result<(), RewriteError> {
    for port in graph.input_ports(consumer) {
        for producer in walk::predecessors(graph, consumer, &port) {
            let p = producer.node;
            if !graph.contains_node(p)
                || p == scope
                || p == consumer
                || graph.is_ancestor(p, consumer)
                || graph.is_ancestor(p, scope)
                || graph.is_ancestor(scope, p)
            {
                continue;
            }
            if only_used_within(graph, p, scope) {
                tracing::trace!(producer = %graph.label(p), "removing unused producer");
                delete_unused_predecessors(graph, p)?;
                if graph.contains_node(p) {
                    graph.remove_subtree(p)?;
                }
            }
        }
    }
    Ok(())
}

/// Returns `true` if every atomic consumer of `producer` is `scope` or a
/// node nested inside it.
pub fn only_used_within(graph: &Graph, producer: NodeId, scope: NodeId) -> bool {
    walk::all_atomic_successors(graph, producer)
        .iter()
        .all(|c| c.node == scope || graph.is_ancestor(scope, c.node))
}

/// Removes `node` with all nested children, after removing the producers
/// that only fed the removed subtree.
pub fn deep_remove_node(graph: &mut Graph, node: NodeId) -> Result<(), RewriteError> {
    graph.require(node)?;
    let mut subtree = vec![node];
    subtree.extend(graph.descendants(node));
    for n in subtree {
        if graph.contains_node(n) {
            delete_unused_into(graph, n, node)?;
        }
    }
    graph.remove_subtree(node)?;
    Ok(())
}

/// A compound whose nesting carries no meaning: not atomic, not part of a
/// recursive definition and not the implementation of a lambda.
pub fn is_unnecessary_compound(graph: &Graph, node: NodeId) -> bool {
    let Some(value) = graph.node(node) else {
        return false;
    };
    if value.atomic || value.recursive || value.recursive_root {
        return false;
    }
    !graph
        .parent(node)
        .and_then(|p| graph.node(p))
        .is_some_and(|p| p.kind == LAMBDA)
}

/// Splices a compound out of the hierarchy.
///
/// Children move to the compound's parent and every edge that used a
/// boundary port is replaced by direct edges between the producers and
/// consumers on both sides, including input-to-output pass-through edges.
pub fn unpack_compound_node(graph: &mut Graph, node: NodeId) -> Result<(), RewriteError> {
    let value = graph.require(node)?;
    if value.atomic {
        return Err(RewriteError::malformed(format!(
            "cannot unpack atomic node '{}'",
            value.label
        )));
    }
    let mut bridges = Vec::new();
    for port in graph.input_ports(node) {
        let producers = graph.predecessors(node, &port);
        for consumer in graph.successors(node, &port) {
            let targets = if consumer.node == node {
                graph.successors(node, &consumer.port).into_vec()
            } else {
                vec![consumer]
            };
            for target in targets {
                for producer in &producers {
                    bridges.push((producer.clone(), target.clone()));
                }
            }
        }
    }
    for port in graph.output_ports(node) {
        let consumers = graph.successors(node, &port);
        for producer in graph.predecessors(node, &port) {
            if producer.node == node {
                continue;
            }
            for consumer in &consumers {
                bridges.push((producer.clone(), consumer.clone()));
            }
        }
    }

    let parent = graph.parent(node);
    for child in graph.children(node) {
        graph.set_parent(child, parent)?;
    }
    graph.remove_node(node)?;
    for (source, target) in bridges {
        graph.add_edge(&source, &target)?;
    }
    Ok(())
}

/// Re-parents `node` into `target`.
pub fn move_node_into(graph: &mut Graph, node: NodeId, target: NodeId) -> Result<(), RewriteError> {
    graph.set_parent(node, Some(target))?;
    Ok(())
}

/// Moves the producer cone of `port` into `target`.
///
/// The cone is every node reachable backwards from `port` that lives in
/// the same scope as `port.node`; it stops at the scope's boundary ports.
/// Returns the moved nodes in discovery order.
pub fn move_predecessors_into(
    graph: &mut Graph,
    port: &Port,
    target: NodeId,
) -> Result<Vec<NodeId>, RewriteError> {
    graph.require(target)?;
    let scope = graph.parent(port.node);
    let mut cone = Vec::new();
    let mut seen = HashSet::new();
    let mut queue: VecDeque<Port> = graph.predecessors(port.node, &port.port).into_iter().collect();
    while let Some(producer) = queue.pop_front() {
        let p = producer.node;
        if p == target || graph.parent(p) != scope || !seen.insert(p) {
            continue;
        }
        cone.push(p);
        for input in graph.input_ports(p) {
            queue.extend(graph.predecessors(p, &input));
        }
    }
    for &node in &cone {
        move_node_into(graph, node, target)?;
    }
    Ok(cone)
}
