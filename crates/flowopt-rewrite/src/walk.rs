//! Directed walks over the port graph.
//!
//! [`Graph::predecessors`] and [`Graph::successors`] only follow single
//! edges. The walks here resolve the *real* producer or consumer of a port
//! by tunnelling through compound boundaries:
//!
//! - outward, when the edge starts at the input port of the enclosing
//!   compound (or ends at its output port),
//! - inward, when the edge starts at the output port of a sibling compound
//!   (or ends at its input port).
//!
//! Recursive definitions and recursive call sites are opaque: the real walk
//! stops at their boundary port and returns it, unless
//! [`WalkOptions::cross_recursive_boundaries`] is set. A boundary port with
//! nothing on its far side is returned as well, so a dangling parameter
//! still resolves to the port that would carry it.
//!
//! The atomic walks ignore recursive boundaries and only ever return ports
//! of atomic nodes or of childless compounds (call sites).

use std::collections::HashSet;

use flowopt_core::{Graph, Node, NodeId, Port, PortDirection, PortList};

/// Walk configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkOptions {
    /// Tunnel through recursive roots and recursive call sites.
    pub cross_recursive_boundaries: bool,
}

impl WalkOptions {
    pub fn crossing() -> Self {
        WalkOptions {
            cross_recursive_boundaries: true,
        }
    }
}

/// The single place that decides whether a walk may tunnel through a node.
pub fn is_recursive_boundary(node: &Node) -> bool {
    node.recursive_root || node.recursive
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Step {
    Back,
    Forward,
}

impl Step {
    fn next(self, graph: &Graph, port: &Port) -> PortList {
        match self {
            Step::Back => graph.predecessors(port.node, &port.port),
            Step::Forward => graph.successors(port.node, &port.port),
        }
    }

    /// The port direction that leads into a compound's children.
    fn inward(self) -> PortDirection {
        match self {
            Step::Back => PortDirection::Output,
            Step::Forward => PortDirection::Input,
        }
    }
}

fn resolve(
    graph: &Graph,
    port: Port,
    step: Step,
    options: WalkOptions,
    visited: &mut HashSet<Port>,
    out: &mut PortList,
) {
    let Some(node) = graph.node(port.node) else {
        return;
    };
    if node.atomic
        || (is_recursive_boundary(node) && !options.cross_recursive_boundaries)
        || !visited.insert(port.clone())
    {
        out.push(port);
        return;
    }
    let next = step.next(graph, &port);
    if next.is_empty() {
        out.push(port);
        return;
    }
    for p in next {
        resolve(graph, p, step, options, visited, out);
    }
}

fn real_walk(graph: &Graph, node: NodeId, port: &str, step: Step, options: WalkOptions) -> PortList {
    let mut out = PortList::new();
    let mut visited = HashSet::new();
    let start = Port::new(node, port);
    for p in step.next(graph, &start) {
        resolve(graph, p, step, options, &mut visited, &mut out);
    }
    out
}

/// Real producers of `(node, port)`, stopping at recursive boundaries.
pub fn predecessors(graph: &Graph, node: NodeId, port: &str) -> PortList {
    real_walk(graph, node, port, Step::Back, WalkOptions::default())
}

pub fn predecessors_with(graph: &Graph, node: NodeId, port: &str, options: WalkOptions) -> PortList {
    real_walk(graph, node, port, Step::Back, options)
}

/// Real consumers of `(node, port)`, stopping at recursive boundaries.
pub fn successors(graph: &Graph, node: NodeId, port: &str) -> PortList {
    real_walk(graph, node, port, Step::Forward, WalkOptions::default())
}

pub fn successors_with(graph: &Graph, node: NodeId, port: &str, options: WalkOptions) -> PortList {
    real_walk(graph, node, port, Step::Forward, options)
}

fn atomic_resolve(
    graph: &Graph,
    port: Port,
    step: Step,
    visited: &mut HashSet<Port>,
    out: &mut PortList,
) {
    let Some(node) = graph.node(port.node) else {
        return;
    };
    if node.atomic {
        out.push(port);
        return;
    }
    if !visited.insert(port.clone()) {
        return;
    }
    let next = step.next(graph, &port);
    if next.is_empty() {
        // A childless compound entered from outside is a leaf (a call site).
        if !graph.has_children(port.node) && node.port_direction(&port.port) == Some(step.inward()) {
            out.push(port);
        }
        return;
    }
    for p in next {
        atomic_resolve(graph, p, step, visited, out);
    }
}

fn atomic_walk(graph: &Graph, node: NodeId, port: &str, step: Step) -> PortList {
    let mut out = PortList::new();
    let mut visited = HashSet::new();
    for p in step.next(graph, &Port::new(node, port)) {
        atomic_resolve(graph, p, step, &mut visited, &mut out);
    }
    out
}

/// Atomic producers of `(node, port)`, through every compound layer.
/// Dangling boundary ports are dropped.
pub fn atomic_predecessors(graph: &Graph, node: NodeId, port: &str) -> PortList {
    atomic_walk(graph, node, port, Step::Back)
}

/// Atomic consumers of `(node, port)`, through every compound layer.
pub fn atomic_successors(graph: &Graph, node: NodeId, port: &str) -> PortList {
    atomic_walk(graph, node, port, Step::Forward)
}

/// Atomic consumers over all output ports of a node.
pub fn all_atomic_successors(graph: &Graph, node: NodeId) -> PortList {
    graph
        .output_ports(node)
        .iter()
        .flat_map(|p| atomic_successors(graph, node, p))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn constant(graph: &mut Graph, value: i64, parent: Option<NodeId>) -> NodeId {
        graph
            .add_node_in(
                Node::atomic("math/const")
                    .with_output("output", "number")
                    .with_param("value", value),
                parent,
            )
            .unwrap()
    }

    pub(crate) fn add(graph: &mut Graph, parent: Option<NodeId>) -> NodeId {
        graph
            .add_node_in(
                Node::atomic("math/add")
                    .with_input("s1", "number")
                    .with_input("s2", "number")
                    .with_output("sum", "number"),
                parent,
            )
            .unwrap()
    }

    pub(crate) fn edge(graph: &mut Graph, from: (NodeId, &str), to: (NodeId, &str)) {
        graph
            .add_edge(&Port::new(from.0, from.1), &Port::new(to.0, to.1))
            .unwrap();
    }

    /// `const -> wrap.x`, inside `wrap`: `x -> add.s1`, `add.sum -> wrap.out`,
    /// `wrap.out -> sink.value`.
    fn wrapped_add(recursive: bool) -> (Graph, [NodeId; 4]) {
        let mut graph = Graph::new();
        let c = constant(&mut graph, 1, None);
        let mut wrap = Node::compound("wrap")
            .with_input("x", "number")
            .with_output("out", "number");
        if recursive {
            wrap = wrap.recursive_root();
        }
        let wrap = graph.add_node(wrap);
        let a = add(&mut graph, Some(wrap));
        let sink = graph.add_node(Node::atomic("io/print").with_input("value", "number").sink());
        edge(&mut graph, (c, "output"), (wrap, "x"));
        edge(&mut graph, (wrap, "x"), (a, "s1"));
        edge(&mut graph, (a, "sum"), (wrap, "out"));
        edge(&mut graph, (wrap, "out"), (sink, "value"));
        (graph, [c, wrap, a, sink])
    }

    #[test]
    fn tunnels_through_plain_compounds() {
        let (graph, [c, wrap, a, sink]) = wrapped_add(false);
        assert_eq!(predecessors(&graph, a, "s1").as_slice(), &[Port::new(c, "output")]);
        assert_eq!(predecessors(&graph, sink, "value").as_slice(), &[Port::new(a, "sum")]);
        assert_eq!(successors(&graph, c, "output").as_slice(), &[Port::new(a, "s1")]);
        assert_eq!(successors(&graph, a, "sum").as_slice(), &[Port::new(sink, "value")]);
        assert!(!is_recursive_boundary(graph.node(wrap).unwrap()));
    }

    #[test]
    fn stops_at_recursive_roots() {
        let (graph, [c, wrap, a, sink]) = wrapped_add(true);
        assert_eq!(predecessors(&graph, a, "s1").as_slice(), &[Port::new(wrap, "x")]);
        assert_eq!(predecessors(&graph, sink, "value").as_slice(), &[Port::new(wrap, "out")]);
        assert_eq!(
            predecessors_with(&graph, a, "s1", WalkOptions::crossing()).as_slice(),
            &[Port::new(c, "output")]
        );
        assert_eq!(atomic_predecessors(&graph, sink, "value").as_slice(), &[Port::new(a, "sum")]);
    }

    #[test]
    fn unbound_parameters_resolve_to_the_boundary_port() {
        let (mut graph, [c, wrap, a, _]) = wrapped_add(false);
        graph.remove_node(c).unwrap();
        assert_eq!(predecessors(&graph, a, "s1").as_slice(), &[Port::new(wrap, "x")]);
        assert!(atomic_predecessors(&graph, a, "s1").is_empty());
    }

    #[test]
    fn unconnected_ports_have_no_peers() {
        let (graph, [_, _, a, _]) = wrapped_add(false);
        assert!(predecessors(&graph, a, "s2").is_empty());
    }

    #[test]
    fn pass_through_edges_are_followed() {
        let mut graph = Graph::new();
        let c = constant(&mut graph, 4, None);
        let wrap = graph.add_node(
            Node::compound("wrap")
                .with_input("x", "number")
                .with_output("out", "number"),
        );
        let sink = graph.add_node(Node::atomic("io/print").with_input("value", "number"));
        edge(&mut graph, (c, "output"), (wrap, "x"));
        edge(&mut graph, (wrap, "x"), (wrap, "out"));
        edge(&mut graph, (wrap, "out"), (sink, "value"));
        assert_eq!(predecessors(&graph, sink, "value").as_slice(), &[Port::new(c, "output")]);
        assert_eq!(atomic_successors(&graph, c, "output").as_slice(), &[Port::new(sink, "value")]);
    }

    #[test]
    fn call_sites_are_atomic_leaves() {
        let mut graph = Graph::new();
        let def = graph.add_node(
            Node::compound("fac")
                .with_input("n", "number")
                .with_output("out", "number")
                .recursive_root(),
        );
        let call = graph
            .add_node_in(
                Node::compound("fac")
                    .with_input("n", "number")
                    .with_output("out", "number")
                    .recursive_call(),
                Some(def),
            )
            .unwrap();
        edge(&mut graph, (def, "n"), (call, "n"));
        edge(&mut graph, (call, "out"), (def, "out"));
        assert_eq!(atomic_successors(&graph, def, "n").as_slice(), &[Port::new(call, "n")]);
        assert_eq!(predecessors(&graph, def, "out").as_slice(), &[Port::new(call, "out")]);
    }
}
