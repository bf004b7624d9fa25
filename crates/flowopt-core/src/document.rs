//! JSON graph documents.
//!
//! Graphs are exchanged in the graphlib JSON layout:
//!
//! ```json
//! {
//!   "options": { "directed": true, "multigraph": true, "compound": true },
//!   "nodes": [{ "v": "add", "value": { "id": "math/add", ... }, "parent": "fn" }],
//!   "edges": [{ "v": "c", "w": "add", "name": "c@output_to_add@s1",
//!               "value": { "outPort": "output", "inPort": "s1" } }]
//! }
//! ```
//!
//! Node labels (`v`) become [`Node::label`]; everything else in `value` is
//! deserialized into [`Node`]. Loading validates labels, parents and edge
//! ports, so a successfully loaded graph satisfies [`Graph::validate`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::edge::{edge_label, Edge};
use crate::error::CoreError;
use crate::graph::Graph;
use crate::node::Node;
use crate::port::Port;

/// The serialized form of a [`Graph`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default = "default_options")]
    pub options: Value,
    #[serde(default)]
    pub nodes: Vec<NodeEntry>,
    #[serde(default)]
    pub edges: Vec<EdgeEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub v: String,
    pub value: Node,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeEntry {
    pub v: String,
    pub w: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub value: Edge,
}

fn default_options() -> Value {
    serde_json::json!({ "directed": true, "multigraph": true, "compound": true })
}

impl Graph {
    /// Builds a graph from a document, rejecting duplicate labels, unknown
    /// parents, hierarchy cycles and edges between undeclared ports.
    pub fn from_document(doc: GraphDocument) -> Result<Graph, CoreError> {
        let mut graph = Graph::new();
        let mut seen = HashSet::new();
        for entry in &doc.nodes {
            if !seen.insert(entry.v.as_str()) {
                return Err(CoreError::InvalidDocument {
                    reason: format!("duplicate node '{}'", entry.v),
                });
            }
        }

        for entry in &doc.nodes {
            let mut node = entry.value.clone();
            node.label = entry.v.clone();
            if let Some(port) = node
                .input_ports
                .keys()
                .find(|p| node.output_ports.contains_key(*p))
            {
                return Err(CoreError::DuplicatePort {
                    node: entry.v.clone(),
                    port: port.clone(),
                });
            }
            graph.add_node(node);
        }

        for entry in &doc.nodes {
            if let Some(parent) = &entry.parent {
                let child = graph.find(&entry.v).ok_or_else(|| missing(&entry.v))?;
                let parent = graph.find(parent).ok_or_else(|| missing(parent))?;
                graph.set_parent(child, Some(parent))?;
            }
        }

        for entry in &doc.edges {
            let source = graph.find(&entry.v).ok_or_else(|| missing(&entry.v))?;
            let target = graph.find(&entry.w).ok_or_else(|| missing(&entry.w))?;
            graph
                .add_edge(
                    &Port::new(source, entry.value.out_port.clone()),
                    &Port::new(target, entry.value.in_port.clone()),
                )
                .map_err(|e| CoreError::InvalidDocument {
                    reason: format!("edge {} -> {}: {}", entry.v, entry.w, e),
                })?;
        }

        Ok(graph)
    }

    /// Serializes the graph. Nodes and edges are listed in arena order.
    pub fn to_document(&self) -> GraphDocument {
        let nodes = self
            .node_ids()
            .into_iter()
            .filter_map(|id| {
                let node = self.node(id)?;
                Some(NodeEntry {
                    v: node.label.clone(),
                    value: node.clone(),
                    parent: self.parent(id).map(|p| self.label(p)),
                })
            })
            .collect();
        let edges = self
            .edge_ids()
            .into_iter()
            .filter_map(|id| {
                let (source, target) = self.edge_ports(id)?;
                let edge = self.edge(id)?.clone();
                let v = self.label(source.node);
                let w = self.label(target.node);
                Some(EdgeEntry {
                    name: Some(edge_label(&v, &w, &edge)),
                    v,
                    w,
                    value: edge,
                })
            })
            .collect();
        GraphDocument {
            options: default_options(),
            nodes,
            edges,
        }
    }

    /// Parses a graph from a JSON string.
    pub fn from_json(json: &str) -> Result<Graph, CoreError> {
        let doc: GraphDocument =
            serde_json::from_str(json).map_err(|e| CoreError::InvalidDocument {
                reason: e.to_string(),
            })?;
        Graph::from_document(doc)
    }

    /// Serializes the graph as a JSON value.
    pub fn to_json(&self) -> Value {
        // A document of plain maps and strings always serializes.
        serde_json::to_value(self.to_document()).unwrap_or(Value::Null)
    }
}

fn missing(label: &str) -> CoreError {
    CoreError::InvalidDocument {
        reason: format!("unknown node '{}'", label),
    }
}
