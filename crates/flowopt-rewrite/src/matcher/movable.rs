use std::collections::{HashSet, VecDeque};

use flowopt_core::{Graph, NodeId};

use super::{Match, MatchContext, Matcher};

/// Returns `true` if `node` and the producers it depends on can be moved
/// into another scope without changing the program.
///
/// That holds when every node of the producer cone lives in the same scope
/// as `node` (no producer reaches in through the scope's boundary) and each
/// of them has exactly one consumer.
pub fn is_movable(graph: &Graph, node: NodeId) -> bool {
    let scope = graph.parent(node);
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([node]);
    while let Some(current) = queue.pop_front() {
        if !seen.insert(current) {
            continue;
        }
        let consumers: usize = graph
            .output_ports(current)
            .iter()
            .map(|p| graph.successors(current, p).len())
            .sum();
        if consumers != 1 {
            return false;
        }
        for input in graph.input_ports(current) {
            for producer in graph.predecessors(current, &input) {
                if graph.parent(producer.node) != scope || Some(producer.node) == scope {
                    return false;
                }
                queue.push_back(producer.node);
            }
        }
    }
    true
}

pub struct Movable<M> {
    inner: M,
}

impl<M: Matcher> Matcher for Movable<M> {
    fn matches(&self, ctx: &mut MatchContext, graph: &Graph, node: NodeId, port: Option<&str>) -> Option<Match> {
        let m = self.inner.matches(ctx, graph, node, port)?;
        (!m.dangling && is_movable(graph, node)).then_some(m)
    }
}

/// Matches like `inner`, restricted to movable nodes.
pub fn movable<M: Matcher>(inner: M) -> Movable<M> {
    Movable { inner }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{any, test};
    use crate::walk::tests::{add, constant, edge};
    use flowopt_core::Node;

    fn sink(graph: &mut Graph, parent: Option<NodeId>) -> NodeId {
        graph
            .add_node_in(Node::atomic("io/print").with_input("value", "number").sink(), parent)
            .unwrap()
    }

    #[test]
    fn a_private_cone_is_movable() {
        let mut graph = Graph::new();
        let c1 = constant(&mut graph, 1, None);
        let c2 = constant(&mut graph, 2, None);
        let a = add(&mut graph, None);
        let s = sink(&mut graph, None);
        edge(&mut graph, (c1, "output"), (a, "s1"));
        edge(&mut graph, (c2, "output"), (a, "s2"));
        edge(&mut graph, (a, "sum"), (s, "value"));
        assert!(is_movable(&graph, a));
        assert!(test(&movable(any()), &graph, a).is_some());
    }

    #[test]
    fn shared_producers_are_not_movable() {
        let mut graph = Graph::new();
        let c = constant(&mut graph, 1, None);
        let a = add(&mut graph, None);
        let s1 = sink(&mut graph, None);
        let s2 = sink(&mut graph, None);
        edge(&mut graph, (c, "output"), (a, "s1"));
        edge(&mut graph, (c, "output"), (s2, "value"));
        edge(&mut graph, (a, "sum"), (s1, "value"));
        assert!(!is_movable(&graph, a));
    }

    #[test]
    fn parameters_pin_a_node_to_its_scope() {
        let mut graph = Graph::new();
        let scope = graph.add_node(
            Node::compound("f")
                .with_input("x", "number")
                .with_output("out", "number"),
        );
        let a = add(&mut graph, Some(scope));
        edge(&mut graph, (scope, "x"), (a, "s1"));
        edge(&mut graph, (a, "sum"), (scope, "out"));
        assert!(!is_movable(&graph, a));
    }
}
