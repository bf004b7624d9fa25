//! Rewriters: graph edits driven by a [`Match`].
//!
//! Every rewriter leaves the graph free of the matched node and of the
//! producers that only fed it. Edges are rewired between the matched node's
//! direct neighbours, so new edges never cross a scope boundary the old
//! ones did not cross.

use flowopt_core::{Graph, Node, NodeId, Port};

use crate::edit::delete_unused_predecessors;
use crate::error::RewriteError;
use crate::matcher::Match;

/// A graph edit applied to a successful match.
pub trait Rewriter {
    fn rewrite(&self, graph: &mut Graph, m: &Match) -> Result<(), RewriteError>;
}

pub type BoxRewriter = Box<dyn Rewriter>;

impl Rewriter for BoxRewriter {
    fn rewrite(&self, graph: &mut Graph, m: &Match) -> Result<(), RewriteError> {
        (**self).rewrite(graph, m)
    }
}

/// Removes the matched node and every producer only it used.
pub(crate) fn remove_matched(graph: &mut Graph, node: NodeId) -> Result<(), RewriteError> {
    delete_unused_predecessors(graph, node)?;
    if graph.contains_node(node) {
        graph.remove_subtree(node)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// with_node
// ---------------------------------------------------------------------------

/// An old-port to new-port mapping of a [`Replacement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRewrite {
    pub old_port: String,
    pub new_port: String,
}

/// The node that takes the place of a matched node.
#[derive(Debug, Clone)]
pub struct Replacement {
    pub node: Node,
    pub rewrite_input_ports: Vec<PortRewrite>,
    pub rewrite_output_ports: Vec<PortRewrite>,
}

impl Replacement {
    pub fn new(node: Node) -> Self {
        Replacement {
            node,
            rewrite_input_ports: Vec::new(),
            rewrite_output_ports: Vec::new(),
        }
    }

    /// Feeds the new node's `new_port` from the producers of `old_port`.
    pub fn input(mut self, old_port: impl Into<String>, new_port: impl Into<String>) -> Self {
        self.rewrite_input_ports.push(PortRewrite {
            old_port: old_port.into(),
            new_port: new_port.into(),
        });
        self
    }

    /// Connects the new node's `new_port` to every consumer of `old_port`.
    pub fn output(mut self, old_port: impl Into<String>, new_port: impl Into<String>) -> Self {
        self.rewrite_output_ports.push(PortRewrite {
            old_port: old_port.into(),
            new_port: new_port.into(),
        });
        self
    }
}

pub struct WithNode<F>(F);

impl<F> Rewriter for WithNode<F>
where
    F: Fn(&Graph, &Match) -> Result<Replacement, RewriteError>,
{
    fn rewrite(&self, graph: &mut Graph, m: &Match) -> Result<(), RewriteError> {
        let replacement = (self.0)(graph, m)?;
        let old = m.node;
        let mut inputs = Vec::new();
        for PortRewrite { old_port, new_port } in &replacement.rewrite_input_ports {
            for producer in graph.predecessors(old, old_port) {
                inputs.push((producer, new_port.clone()));
            }
        }
        let mut outputs = Vec::new();
        for PortRewrite { old_port, new_port } in &replacement.rewrite_output_ports {
            for consumer in graph.successors(old, old_port) {
                outputs.push((new_port.clone(), consumer));
            }
        }

        let parent = graph.parent(old);
        let new = graph.add_node_in(replacement.node, parent)?;
        for (producer, port) in inputs {
            graph.add_edge(&producer, &Port::new(new, port))?;
        }
        for (port, consumer) in outputs {
            graph.add_edge(&Port::new(new, port), &consumer)?;
        }
        tracing::trace!(old = %graph.label(old), new = %graph.label(new), "replacing node");
        remove_matched(graph, old)
    }
}

/// Replaces the matched node with the node built by `creator`, at the same
/// position in the hierarchy. Only the declared port mappings are rewired.
pub fn with_node<F>(creator: F) -> WithNode<F>
where
    F: Fn(&Graph, &Match) -> Result<Replacement, RewriteError>,
{
    WithNode(creator)
}

// ---------------------------------------------------------------------------
// remove_node
// ---------------------------------------------------------------------------

/// Splices the producers of input `from_port` of the matched node to the
/// consumers of its output `to_port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBridge {
    pub from_port: String,
    pub to_port: String,
}

impl PortBridge {
    pub fn new(from_port: impl Into<String>, to_port: impl Into<String>) -> Self {
        PortBridge {
            from_port: from_port.into(),
            to_port: to_port.into(),
        }
    }
}

pub struct RemoveNode<F>(F);

impl<F> Rewriter for RemoveNode<F>
where
    F: Fn(&Graph, &Match) -> Result<Vec<PortBridge>, RewriteError>,
{
    fn rewrite(&self, graph: &mut Graph, m: &Match) -> Result<(), RewriteError> {
        for bridge in (self.0)(graph, m)? {
            let producers = graph.predecessors(m.node, &bridge.from_port);
            let consumers = graph.successors(m.node, &bridge.to_port);
            for producer in &producers {
                for consumer in &consumers {
                    graph.add_edge(producer, consumer)?;
                }
            }
        }
        remove_matched(graph, m.node)
    }
}

/// Removes the matched node, splicing the bridged ports together first.
///
/// The splice uses the one-step neighbours of the matched node, not the
/// real producers and consumers found by walking through compound
/// boundaries. Inside a compound, a producer that is the compound's input
/// port stays that port, so the new edges never leave the matched node's
/// scope.
pub fn remove_node<F>(bridges: F) -> RemoveNode<F>
where
    F: Fn(&Graph, &Match) -> Result<Vec<PortBridge>, RewriteError>,
{
    RemoveNode(bridges)
}

// ---------------------------------------------------------------------------
// bridge_over
// ---------------------------------------------------------------------------

/// Connects `source` to every consumer of the output port `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bridge {
    pub source: Port,
    pub target: Port,
}

pub struct BridgeOver<F>(F);

impl<F> Rewriter for BridgeOver<F>
where
    F: Fn(&Graph, &Match) -> Result<Vec<Bridge>, RewriteError>,
{
    fn rewrite(&self, graph: &mut Graph, m: &Match) -> Result<(), RewriteError> {
        for Bridge { source, target } in (self.0)(graph, m)? {
            for consumer in graph.successors(target.node, &target.port) {
                graph.add_edge(&source, &consumer)?;
            }
        }
        remove_matched(graph, m.node)
    }
}

/// Short-circuits the matched node: each bridge source takes over the
/// consumers of its target.
pub fn bridge_over<F>(bridges: F) -> BridgeOver<F>
where
    F: Fn(&Graph, &Match) -> Result<Vec<Bridge>, RewriteError>,
{
    BridgeOver(bridges)
}

// ---------------------------------------------------------------------------
// from_fn
// ---------------------------------------------------------------------------

pub struct FromFn<F>(F);

impl<F> Rewriter for FromFn<F>
where
    F: Fn(&mut Graph, &Match) -> Result<(), RewriteError>,
{
    fn rewrite(&self, graph: &mut Graph, m: &Match) -> Result<(), RewriteError> {
        (self.0)(graph, m)
    }
}

/// Wraps a closure as a rewriter.
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: Fn(&mut Graph, &Match) -> Result<(), RewriteError>,
{
    FromFn(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes;
    use crate::walk::tests::{add, constant, edge};

    fn sink(graph: &mut Graph) -> NodeId {
        graph.add_node(Node::atomic("io/print").with_input("value", "number").sink())
    }

    /// `c1 -> add.s1`, `c2 -> add.s2`, `add.sum -> sink1`, `add.sum -> sink2`.
    fn fan_out() -> (Graph, NodeId, [NodeId; 2], [NodeId; 2]) {
        let mut graph = Graph::new();
        let c1 = constant(&mut graph, 2, None);
        let c2 = constant(&mut graph, 3, None);
        let a = add(&mut graph, None);
        let s1 = sink(&mut graph);
        let s2 = sink(&mut graph);
        edge(&mut graph, (c1, "output"), (a, "s1"));
        edge(&mut graph, (c2, "output"), (a, "s2"));
        edge(&mut graph, (a, "sum"), (s1, "value"));
        edge(&mut graph, (a, "sum"), (s2, "value"));
        (graph, a, [c1, c2], [s1, s2])
    }

    #[test]
    fn with_node_rewires_every_consumer() {
        let (mut graph, a, [c1, c2], [s1, s2]) = fan_out();
        let rewriter = with_node(|_: &Graph, _: &Match| {
            Ok(Replacement::new(nodes::constant_number(5.0)).output("sum", "output"))
        });
        rewriter.rewrite(&mut graph, &Match::new(a)).unwrap();

        assert!(!graph.contains_node(a));
        assert!(!graph.contains_node(c1));
        assert!(!graph.contains_node(c2));
        let p1 = graph.predecessors(s1, "value");
        let p2 = graph.predecessors(s2, "value");
        assert_eq!(p1.len(), 1);
        assert_eq!(p1, p2);
        assert_eq!(graph.node(p1[0].node).unwrap().value(), Some(&serde_json::json!(5)));
        graph.validate().unwrap();
    }

    #[test]
    fn with_node_keeps_mapped_producers() {
        let (mut graph, a, [c1, c2], _) = fan_out();
        let rewriter = with_node(|_: &Graph, _: &Match| {
            Ok(Replacement::new(nodes::logic_not())
                .input("s1", "input")
                .output("sum", "output"))
        });
        rewriter.rewrite(&mut graph, &Match::new(a)).unwrap();
        assert!(graph.contains_node(c1));
        assert!(!graph.contains_node(c2));
    }

    #[test]
    fn with_node_keeps_the_hierarchy_position() {
        let mut graph = Graph::new();
        let scope = graph.add_node(Node::compound("scope").with_output("out", "number"));
        let a = add(&mut graph, Some(scope));
        edge(&mut graph, (a, "sum"), (scope, "out"));
        let rewriter = with_node(|_: &Graph, _: &Match| {
            Ok(Replacement::new(nodes::constant_number(0.0)).output("sum", "output"))
        });
        rewriter.rewrite(&mut graph, &Match::new(a)).unwrap();
        let producer = graph.predecessors(scope, "out");
        assert_eq!(graph.parent(producer[0].node), Some(scope));
    }

    #[test]
    fn remove_node_splices_ports() {
        let (mut graph, a, [c1, c2], [s1, _]) = fan_out();
        let rewriter = remove_node(|_: &Graph, _: &Match| Ok(vec![PortBridge::new("s2", "sum")]));
        rewriter.rewrite(&mut graph, &Match::new(a)).unwrap();
        assert!(!graph.contains_node(c1));
        assert_eq!(graph.predecessors(s1, "value").as_slice(), &[Port::new(c2, "output")]);
    }

    #[test]
    fn remove_node_splices_within_the_enclosing_scope() {
        let mut graph = Graph::new();
        let outer = constant(&mut graph, 7, None);
        let scope = graph.add_node(
            Node::compound("scope")
                .with_input("x", "number")
                .with_output("out", "number"),
        );
        let zero = constant(&mut graph, 0, Some(scope));
        let a = add(&mut graph, Some(scope));
        let s = sink(&mut graph);
        edge(&mut graph, (outer, "output"), (scope, "x"));
        edge(&mut graph, (scope, "x"), (a, "s1"));
        edge(&mut graph, (zero, "output"), (a, "s2"));
        edge(&mut graph, (a, "sum"), (scope, "out"));
        edge(&mut graph, (scope, "out"), (s, "value"));

        let rewriter = remove_node(|_: &Graph, _: &Match| Ok(vec![PortBridge::new("s1", "sum")]));
        rewriter.rewrite(&mut graph, &Match::new(a)).unwrap();

        assert!(!graph.contains_node(a));
        assert!(!graph.contains_node(zero));
        assert!(graph.contains_node(outer));
        assert_eq!(graph.predecessors(scope, "out").as_slice(), &[Port::new(scope, "x")]);
        assert_eq!(graph.predecessors(scope, "x").as_slice(), &[Port::new(outer, "output")]);
        graph.validate().unwrap();
    }

    #[test]
    fn bridge_over_takes_over_the_consumers() {
        let (mut graph, a, [c1, _], [s1, s2]) = fan_out();
        let rewriter = bridge_over(move |_: &Graph, m: &Match| {
            Ok(vec![Bridge {
                source: Port::new(c1, "output"),
                target: Port::new(m.node, "sum"),
            }])
        });
        rewriter.rewrite(&mut graph, &Match::new(a)).unwrap();
        assert!(!graph.contains_node(a));
        for s in [s1, s2] {
            assert_eq!(graph.predecessors(s, "value").as_slice(), &[Port::new(c1, "output")]);
        }
        assert_eq!(graph.node_count(), 3);
    }
}
