use flowopt_core::{Graph, NodeId};

use super::{Match, MatchContext, Matcher};
use crate::nodes::LAMBDA;

/// Constraints of [`lambda`]. `None` leaves a property unconstrained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LambdaOptions {
    pub recursive: Option<bool>,
    pub side_effects: Option<bool>,
    /// Number of input ports of the implementation.
    pub input_ports: Option<usize>,
    /// Number of output ports of the implementation.
    pub output_ports: Option<usize>,
}

/// The implementation compound of a lambda node, its first child.
pub fn lambda_implementation(graph: &Graph, lambda: NodeId) -> Option<NodeId> {
    graph.children(lambda).first().copied()
}

pub struct Lambda {
    options: LambdaOptions,
}

impl Matcher for Lambda {
    fn matches(&self, _: &mut MatchContext, graph: &Graph, node: NodeId, _: Option<&str>) -> Option<Match> {
        let value = graph.node(node)?;
        if value.kind != LAMBDA {
            return None;
        }
        let implementation = graph.node(lambda_implementation(graph, node)?)?;
        let recursive = value.recursive || implementation.recursive || implementation.recursive_root;
        let side_effects = value.side_effects || implementation.side_effects;
        let options = &self.options;
        if options.recursive.is_some_and(|r| r != recursive)
            || options.side_effects.is_some_and(|s| s != side_effects)
            || options.input_ports.is_some_and(|n| n != implementation.input_ports.len())
            || options.output_ports.is_some_and(|n| n != implementation.output_ports.len())
        {
            return None;
        }
        Some(Match::new(node))
    }
}

/// Matches a `functional/lambda` node whose implementation satisfies
/// `options`.
pub fn lambda(options: LambdaOptions) -> Lambda {
    Lambda { options }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::test;
    use crate::nodes;
    use flowopt_core::Node;

    fn lambda_with(graph: &mut Graph, implementation: Node) -> NodeId {
        let l = graph.add_node(nodes::lambda());
        graph.add_node_in(implementation, Some(l)).unwrap();
        l
    }

    #[test]
    fn implementation_is_the_first_child() {
        let mut graph = Graph::new();
        let l = lambda_with(&mut graph, Node::compound("impl").with_output("value", "number"));
        let implementation = lambda_implementation(&graph, l).unwrap();
        assert_eq!(graph.node(implementation).unwrap().kind, "impl");
    }

    #[test]
    fn options_constrain_the_implementation() {
        let mut graph = Graph::new();
        let plain = lambda_with(&mut graph, Node::compound("impl").with_output("value", "number"));
        let recursive = lambda_with(
            &mut graph,
            Node::compound("rec")
                .with_input("n", "number")
                .with_output("value", "number")
                .recursive_root(),
        );
        let pure = lambda(LambdaOptions {
            recursive: Some(false),
            side_effects: Some(false),
            input_ports: Some(0),
            ..LambdaOptions::default()
        });
        assert!(test(&pure, &graph, plain).is_some());
        assert!(test(&pure, &graph, recursive).is_none());
        assert!(test(&lambda(LambdaOptions::default()), &graph, recursive).is_some());

        graph.node_mut(plain).unwrap().side_effects = true;
        assert!(test(&pure, &graph, plain).is_none());
    }

    #[test]
    fn lambdas_need_an_implementation() {
        let mut graph = Graph::new();
        let l = graph.add_node(nodes::lambda());
        assert!(test(&lambda(LambdaOptions::default()), &graph, l).is_none());
    }
}
