//! Declarative construction of small subgraphs.
//!
//! Rules that synthesize several connected nodes describe them as a tree of
//! [`SubgraphSpec`]s rooted at the node whose output they need. Leaves may
//! refer to existing ports, so the new nodes can be wired to the rest of
//! the graph in the same step.

use indexmap::IndexMap;

use flowopt_core::{Graph, Node, NodeId, Port, PortDirection};

use crate::edit::{resolve_end, EdgeEnd};
use crate::error::RewriteError;

/// A node of the subgraph: created fresh, or already in the graph.
#[derive(Debug, Clone)]
pub enum SubgraphNode {
    New(Node),
    Existing(NodeId),
}

/// A node plus the nodes to connect to its ports.
#[derive(Debug, Clone)]
pub struct SubgraphSpec {
    pub node: SubgraphNode,
    /// Port to connect to the parent spec. Selected automatically when the
    /// node has a single port of the needed direction.
    pub port: Option<String>,
    /// Specs producing values for this node, by input port.
    pub predecessors: IndexMap<String, SubgraphSpec>,
    /// Specs consuming values of this node, by output port.
    pub successors: IndexMap<String, SubgraphSpec>,
}

impl SubgraphSpec {
    pub fn new(node: Node) -> Self {
        SubgraphSpec::from_node(SubgraphNode::New(node))
    }

    pub fn existing(node: NodeId) -> Self {
        SubgraphSpec::from_node(SubgraphNode::Existing(node))
    }

    /// An existing port, used as a leaf.
    pub fn port_of(port: &Port) -> Self {
        SubgraphSpec::existing(port.node).port(port.port.clone())
    }

    fn from_node(node: SubgraphNode) -> Self {
        SubgraphSpec {
            node,
            port: None,
            predecessors: IndexMap::new(),
            successors: IndexMap::new(),
        }
    }

    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    pub fn predecessor(mut self, input: impl Into<String>, spec: SubgraphSpec) -> Self {
        self.predecessors.insert(input.into(), spec);
        self
    }

    pub fn successor(mut self, output: impl Into<String>, spec: SubgraphSpec) -> Self {
        self.successors.insert(output.into(), spec);
        self
    }
}

/// The root of a created subgraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSubgraph {
    pub node: NodeId,
    pub port: Option<String>,
}

/// Builds `spec` inside `context` and returns its root with the root's
/// output port.
pub fn create_subgraph(
    graph: &mut Graph,
    context: Option<NodeId>,
    spec: SubgraphSpec,
) -> Result<CreatedSubgraph, RewriteError> {
    let (node, port) = build(graph, context, spec, PortDirection::Output)?;
    Ok(CreatedSubgraph {
        node,
        port: port.map(|p| p.port),
    })
}

fn build(
    graph: &mut Graph,
    context: Option<NodeId>,
    spec: SubgraphSpec,
    role: PortDirection,
) -> Result<(NodeId, Option<Port>), RewriteError> {
    let node = match spec.node {
        SubgraphNode::New(value) => graph.add_node_in(value, context)?,
        SubgraphNode::Existing(id) => {
            graph.require(id)?;
            id
        }
    };
    let port = match spec.port {
        Some(port) => Some(Port::new(node, port)),
        None => resolve_end(graph, EdgeEnd::Node(node), role).ok(),
    };

    for (input, pred) in spec.predecessors {
        let (pred_node, pred_port) = build(graph, context, pred, PortDirection::Output)?;
        let source = match pred_port {
            Some(port) => port,
            None => resolve_end(graph, EdgeEnd::Node(pred_node), PortDirection::Output)?,
        };
        graph.add_edge(&source, &Port::new(node, input))?;
    }
    for (output, succ) in spec.successors {
        let (succ_node, succ_port) = build(graph, context, succ, PortDirection::Input)?;
        let target = match succ_port {
            Some(port) => port,
            None => resolve_end(graph, EdgeEnd::Node(succ_node), PortDirection::Input)?,
        };
        graph.add_edge(&Port::new(node, output), &target)?;
    }
    Ok((node, port))
}
