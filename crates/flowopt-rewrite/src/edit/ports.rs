//! Port primitives.
//!
//! These are the only operations that change a node's port maps. They keep
//! `settings.argumentOrdering` in step with the maps and update or drop the
//! edges attached to the port.

use flowopt_core::{CoreError, Graph, NodeId, PortDirection};

use crate::error::RewriteError;

fn duplicate(graph: &Graph, node: NodeId, port: &str) -> RewriteError {
    RewriteError::Graph(CoreError::DuplicatePort {
        node: graph.label(node),
        port: port.to_string(),
    })
}

fn not_found(graph: &Graph, node: NodeId, port: &str) -> RewriteError {
    RewriteError::Graph(CoreError::PortNotFound {
        node: graph.label(node),
        port: port.to_string(),
    })
}

/// Returns `base`, or `base_<n>` for the first `n` not used by any port of
/// the node.
pub fn unique_port_name(graph: &Graph, node: NodeId, base: &str) -> String {
    let taken = |name: &str| graph.node(node).is_some_and(|n| n.has_port(name));
    if !taken(base) {
        return base.to_string();
    }
    (1..)
        .map(|i| format!("{}_{}", base, i))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Like [`unique_port_name`], free on every node of `nodes`.
pub fn unique_shared_port_name(graph: &Graph, nodes: &[NodeId], base: &str) -> String {
    let taken = |name: &str| nodes.iter().any(|&n| graph.node(n).is_some_and(|v| v.has_port(name)));
    if !taken(base) {
        return base.to_string();
    }
    (1..)
        .map(|i| format!("{}_{}", base, i))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Adds an input port. With an argument ordering the new port is placed
/// after the last input port already in the ordering.
pub fn create_input_port(graph: &mut Graph, node: NodeId, name: &str, ty: &str) -> Result<(), RewriteError> {
    if graph.require(node)?.has_port(name) {
        return Err(duplicate(graph, node, name));
    }
    let value = graph.require_mut(node)?;
    if let Some(ordering) = value.settings.argument_ordering.as_mut() {
        let at = ordering
            .iter()
            .rposition(|p| value.input_ports.contains_key(p))
            .map_or(0, |i| i + 1);
        ordering.insert(at, name.to_string());
    }
    value.input_ports.insert(name.to_string(), ty.to_string());
    Ok(())
}

/// Adds an output port at the end of the argument ordering.
pub fn create_output_port(graph: &mut Graph, node: NodeId, name: &str, ty: &str) -> Result<(), RewriteError> {
    if graph.require(node)?.has_port(name) {
        return Err(duplicate(graph, node, name));
    }
    let value = graph.require_mut(node)?;
    if let Some(ordering) = value.settings.argument_ordering.as_mut() {
        ordering.push(name.to_string());
    }
    value.output_ports.insert(name.to_string(), ty.to_string());
    Ok(())
}

/// Renames a port in place, keeping its position, and rewrites the port
/// names stored on its edges.
pub fn rename_port(graph: &mut Graph, node: NodeId, old: &str, new: &str) -> Result<(), RewriteError> {
    if old == new {
        return Ok(());
    }
    let direction = graph
        .require(node)?
        .port_direction(old)
        .ok_or_else(|| not_found(graph, node, old))?;
    if graph.require(node)?.has_port(new) {
        return Err(duplicate(graph, node, new));
    }

    let incoming = graph.edges_into(node, old);
    let outgoing = graph.edges_from(node, old);

    let value = graph.require_mut(node)?;
    let ports = match direction {
        PortDirection::Input => &mut value.input_ports,
        PortDirection::Output => &mut value.output_ports,
    };
    if let Some((index, _, ty)) = ports.shift_remove_full(old) {
        ports.shift_insert(index, new.to_string(), ty);
    }
    if let Some(ordering) = value.settings.argument_ordering.as_mut() {
        for entry in ordering.iter_mut().filter(|p| p.as_str() == old) {
            *entry = new.to_string();
        }
    }

    for id in incoming {
        if let Some(edge) = graph.edge_mut(id) {
            edge.in_port = new.to_string();
        }
    }
    for id in outgoing {
        if let Some(edge) = graph.edge_mut(id) {
            edge.out_port = new.to_string();
        }
    }
    Ok(())
}

/// Removes a port and every edge attached to it.
pub fn remove_port(graph: &mut Graph, node: NodeId, name: &str) -> Result<(), RewriteError> {
    if !graph.require(node)?.has_port(name) {
        return Err(not_found(graph, node, name));
    }
    let mut edges = graph.edges_into(node, name);
    edges.extend(graph.edges_from(node, name));
    for id in edges {
        graph.remove_edge(id)?;
    }
    let value = graph.require_mut(node)?;
    value.input_ports.shift_remove(name);
    value.output_ports.shift_remove(name);
    if let Some(ordering) = value.settings.argument_ordering.as_mut() {
        ordering.retain(|p| p != name);
    }
    Ok(())
}
