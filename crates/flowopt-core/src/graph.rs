//! Graph: the hierarchical, port-typed dataflow multigraph.
//!
//! [`Graph`] owns a petgraph `StableGraph<Node, Edge>` arena plus the
//! parent/child hierarchy of compound nodes. Node and edge ids stay valid
//! while other entities are removed, so rewrites can hold on to ids across
//! edits.
//!
//! # Invariants
//!
//! - Every edge connects a declared port of its source to a declared port
//!   of its target.
//! - Parent/child links form a forest; a node is never its own ancestor.
//! - Input and output port names of a node are disjoint, so the port name
//!   alone tells whether an edge enters a compound from outside (input port)
//!   or leaves its children (output port).
//! - Node labels are unique.
//!
//! All mutations go through `Graph` methods; [`Graph::validate`] rescans
//! the whole structure.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};

use crate::edge::{edge_label, Edge};
use crate::error::CoreError;
use crate::id::{EdgeId, NodeId};
use crate::node::Node;
use crate::port::{Port, PortDirection, PortList};

/// The hierarchical dataflow graph.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    inner: StableGraph<Node, Edge, Directed, u32>,
    parents: HashMap<NodeId, NodeId>,
    children: HashMap<NodeId, Vec<NodeId>>,
    labels: HashMap<String, NodeId>,
    next_suffix: u64,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    // -----------------------------------------------------------------------
    // Node methods
    // -----------------------------------------------------------------------

    /// Adds a top-level node. The node's label is made unique by suffixing
    /// it when it is already taken (or empty).
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        node.label = self.unique_label(&node.label);
        let label = node.label.clone();
        let id = NodeId::from(self.inner.add_node(node));
        self.labels.insert(label, id);
        id
    }

    /// Adds a node as a child of `parent` (top-level when `None`).
    pub fn add_node_in(&mut self, node: Node, parent: Option<NodeId>) -> Result<NodeId, CoreError> {
        if let Some(parent) = parent {
            self.require(parent)?;
        }
        let id = self.add_node(node);
        if let Some(parent) = parent {
            self.link(id, parent);
        }
        Ok(id)
    }

    fn unique_label(&mut self, base: &str) -> String {
        let base = if base.is_empty() { "node" } else { base };
        if !self.labels.contains_key(base) {
            return base.to_string();
        }
        loop {
            self.next_suffix += 1;
            let candidate = format!("{}_{}", base, self.next_suffix);
            if !self.labels.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Removes a node and all its incident edges.
    ///
    /// Fails with [`CoreError::HasChildren`] when the node still has nested
    /// children; use [`Graph::remove_subtree`] to remove a compound node
    /// together with its contents.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, CoreError> {
        let count = self.children.get(&id).map_or(0, Vec::len);
        if count > 0 {
            return Err(CoreError::HasChildren {
                node: self.label(id),
                count,
            });
        }
        let node = self
            .inner
            .remove_node(id.into())
            .ok_or(CoreError::NodeNotFound { id })?;
        self.unlink(id);
        self.children.remove(&id);
        self.labels.remove(&node.label);
        Ok(node)
    }

    /// Removes a node together with all of its nested children.
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<(), CoreError> {
        self.require(id)?;
        let mut order = vec![id];
        order.extend(self.descendants(id));
        // Deepest nodes come last in breadth-first order.
        for node in order.into_iter().rev() {
            self.remove_node(node)?;
        }
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.inner.node_weight(id.into())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.inner.node_weight_mut(id.into())
    }

    /// Looks up a node, turning a missing id into a [`CoreError`].
    pub fn require(&self, id: NodeId) -> Result<&Node, CoreError> {
        self.node(id).ok_or(CoreError::NodeNotFound { id })
    }

    pub fn require_mut(&mut self, id: NodeId) -> Result<&mut Node, CoreError> {
        self.inner
            .node_weight_mut(id.into())
            .ok_or(CoreError::NodeNotFound { id })
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.inner.contains_node(id.into())
    }

    /// Returns the node's label, or a placeholder for removed nodes.
    pub fn label(&self, id: NodeId) -> String {
        self.node(id)
            .map(|n| n.label.clone())
            .unwrap_or_else(|| format!("<removed {}>", id))
    }

    pub fn find(&self, label: &str) -> Option<NodeId> {
        self.labels.get(label).copied()
    }

    /// All node ids in the graph's native enumeration order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.inner.node_indices().map(NodeId::from).collect()
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    // -----------------------------------------------------------------------
    // Hierarchy methods
    // -----------------------------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    /// Direct children in insertion order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.children.get(&id).cloned().unwrap_or_default()
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        self.children.get(&id).is_some_and(|c| !c.is_empty())
    }

    /// All nested children, breadth first.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut queue: VecDeque<NodeId> = self.children(id).into();
        while let Some(next) = queue.pop_front() {
            out.push(next);
            queue.extend(self.children(next));
        }
        out
    }

    /// Returns `true` if `ancestor` is a strict ancestor of `node`.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    /// Moves `child` under `parent` (top-level when `None`).
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> Result<(), CoreError> {
        self.require(child)?;
        if let Some(parent) = parent {
            self.require(parent)?;
            if parent == child || self.is_ancestor(child, parent) {
                return Err(CoreError::HierarchyCycle {
                    child: self.label(child),
                    parent: self.label(parent),
                });
            }
        }
        self.unlink(child);
        if let Some(parent) = parent {
            self.link(child, parent);
        }
        Ok(())
    }

    fn link(&mut self, child: NodeId, parent: NodeId) {
        self.parents.insert(child, parent);
        self.children.entry(parent).or_default().push(child);
    }

    fn unlink(&mut self, child: NodeId) {
        if let Some(old) = self.parents.remove(&child) {
            if let Some(siblings) = self.children.get_mut(&old) {
                siblings.retain(|c| *c != child);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Edge methods
    // -----------------------------------------------------------------------

    /// Adds an edge between two declared ports.
    ///
    /// Adding an edge that already exists returns the existing id.
    pub fn add_edge(&mut self, source: &Port, target: &Port) -> Result<EdgeId, CoreError> {
        self.require_port(source)?;
        self.require_port(target)?;
        let edge = Edge::new(source.port.clone(), target.port.clone());
        let existing = self
            .inner
            .edges_directed(source.node.into(), Direction::Outgoing)
            .find(|e| NodeId::from(e.target()) == target.node && *e.weight() == edge)
            .map(|e| EdgeId::from(e.id()));
        if let Some(id) = existing {
            return Ok(id);
        }
        let idx = self
            .inner
            .add_edge(source.node.into(), target.node.into(), edge);
        Ok(EdgeId::from(idx))
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Result<Edge, CoreError> {
        self.inner
            .remove_edge(id.into())
            .ok_or(CoreError::EdgeNotFound { id })
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.inner.edge_weight(id.into())
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.inner.edge_weight_mut(id.into())
    }

    /// Source and target ports of an edge.
    pub fn edge_ports(&self, id: EdgeId) -> Option<(Port, Port)> {
        let idx: EdgeIndex<u32> = id.into();
        let (source, target) = self.inner.edge_endpoints(idx)?;
        let edge = self.inner.edge_weight(idx)?;
        Some((
            Port::new(NodeId::from(source), edge.out_port.clone()),
            Port::new(NodeId::from(target), edge.in_port.clone()),
        ))
    }

    /// Debug label of an edge, `source@out_to_target@in`.
    pub fn edge_name(&self, id: EdgeId) -> Option<String> {
        let (source, target) = self.edge_ports(id)?;
        let edge = self.edge(id)?;
        Some(edge_label(&self.label(source.node), &self.label(target.node), edge))
    }

    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.inner.edge_indices().map(EdgeId::from).collect()
    }

    /// Edges ending at the node, regardless of port.
    pub fn in_edges(&self, id: NodeId) -> Vec<EdgeId> {
        self.directed_edges(id, Direction::Incoming)
    }

    /// Edges starting at the node, regardless of port.
    pub fn out_edges(&self, id: NodeId) -> Vec<EdgeId> {
        self.directed_edges(id, Direction::Outgoing)
    }

    fn directed_edges(&self, id: NodeId, direction: Direction) -> Vec<EdgeId> {
        let idx: NodeIndex<u32> = id.into();
        if !self.inner.contains_node(idx) {
            return Vec::new();
        }
        let mut edges: Vec<EdgeId> = self
            .inner
            .edges_directed(idx, direction)
            .map(|e| EdgeId::from(e.id()))
            .collect();
        edges.sort();
        edges
    }

    /// Edges whose target is exactly `(node, port)`.
    pub fn edges_into(&self, node: NodeId, port: &str) -> Vec<EdgeId> {
        self.in_edges(node)
            .into_iter()
            .filter(|e| self.edge(*e).is_some_and(|w| w.in_port == port))
            .collect()
    }

    /// Edges whose source is exactly `(node, port)`.
    pub fn edges_from(&self, node: NodeId, port: &str) -> Vec<EdgeId> {
        self.out_edges(node)
            .into_iter()
            .filter(|e| self.edge(*e).is_some_and(|w| w.out_port == port))
            .collect()
    }

    /// One-step producers of `(node, port)`: the source ports of the edges
    /// ending there. No boundary is crossed.
    pub fn predecessors(&self, node: NodeId, port: &str) -> PortList {
        self.edges_into(node, port)
            .into_iter()
            .filter_map(|e| self.edge_ports(e).map(|(source, _)| source))
            .collect()
    }

    /// One-step consumers of `(node, port)`: the target ports of the edges
    /// starting there. No boundary is crossed.
    pub fn successors(&self, node: NodeId, port: &str) -> PortList {
        self.edges_from(node, port)
            .into_iter()
            .filter_map(|e| self.edge_ports(e).map(|(_, target)| target))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Port methods
    // -----------------------------------------------------------------------

    /// Direction of a port, `None` if the node or port does not exist.
    pub fn port_direction(&self, port: &Port) -> Option<PortDirection> {
        self.node(port.node)?.port_direction(&port.port)
    }

    pub fn require_port(&self, port: &Port) -> Result<PortDirection, CoreError> {
        let node = self.require(port.node)?;
        node.port_direction(&port.port)
            .ok_or_else(|| CoreError::PortNotFound {
                node: node.label.clone(),
                port: port.port.clone(),
            })
    }

    /// Input port names of a node in argument order.
    pub fn input_ports(&self, id: NodeId) -> Vec<String> {
        self.node(id).map(Node::input_port_names).unwrap_or_default()
    }

    /// Output port names of a node in argument order.
    pub fn output_ports(&self, id: NodeId) -> Vec<String> {
        self.node(id).map(Node::output_port_names).unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Consistency
    // -----------------------------------------------------------------------

    /// Full scan of the structural invariants.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut seen_labels = HashSet::new();
        for id in self.node_ids() {
            let node = self.require(id)?;
            if !seen_labels.insert(node.label.as_str()) || self.find(&node.label) != Some(id) {
                return Err(CoreError::GraphInconsistency {
                    reason: format!("label '{}' is not unique", node.label),
                });
            }
            if let Some(port) = node.input_ports.keys().find(|p| node.output_ports.contains_key(*p)) {
                return Err(CoreError::DuplicatePort {
                    node: node.label.clone(),
                    port: port.clone(),
                });
            }
            if let Some(parent) = self.parent(id) {
                if !self.contains_node(parent) {
                    return Err(CoreError::GraphInconsistency {
                        reason: format!("'{}' has a removed parent", node.label),
                    });
                }
                let mut visited = HashSet::from([id]);
                let mut current = Some(parent);
                while let Some(p) = current {
                    if !visited.insert(p) {
                        return Err(CoreError::HierarchyCycle {
                            child: node.label.clone(),
                            parent: self.label(parent),
                        });
                    }
                    current = self.parent(p);
                }
            }
        }
        for edge in self.edge_ids() {
            let (source, target) = self
                .edge_ports(edge)
                .ok_or(CoreError::EdgeNotFound { id: edge })?;
            for port in [&source, &target] {
                self.require_port(port).map_err(|e| CoreError::InvalidEdge {
                    reason: format!(
                        "{}: {}",
                        self.edge_name(edge).unwrap_or_default(),
                        e
                    ),
                })?;
            }
        }
        Ok(())
    }
}
