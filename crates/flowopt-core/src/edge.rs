//! Edge payloads.
//!
//! Edges carry a value from a source port to a target port. The nodes are
//! the petgraph endpoints of the edge; the payload only names the ports.
//! Boundary edges of a compound node use the compound's input port as a
//! source (feeding its children) and its output port as a target (fed by its
//! children).

use serde::{Deserialize, Serialize};

/// Port names of a dataflow edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Port on the source node the value leaves from.
    pub out_port: String,
    /// Port on the target node the value enters.
    pub in_port: String,
}

impl Edge {
    pub fn new(out_port: impl Into<String>, in_port: impl Into<String>) -> Self {
        Edge {
            out_port: out_port.into(),
            in_port: in_port.into(),
        }
    }
}

/// Builds the human-readable edge label `source@out_to_target@in`.
///
/// Labels are for serialization and debugging only; edges are identified
/// by [`EdgeId`](crate::id::EdgeId).
pub fn edge_label(source: &str, target: &str, edge: &Edge) -> String {
    format!("{}@{}_to_{}@{}", source, edge.out_port, target, edge.in_port)
}
