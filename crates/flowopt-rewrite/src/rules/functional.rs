use serde_json::Value;

use flowopt_core::{Graph, NodeId, Port};

use super::direct;
use crate::edit::{copy_node_into, create_edge_to_each_successor, move_predecessors_into, remove_port};
use crate::error::RewriteError;
use crate::matcher::{
    any, by_id_and_inputs, lambda, lambda_implementation, movable, named, port, LambdaOptions, Match,
};
use crate::nodes::{CALL, PARTIAL};
use crate::rewriter::{from_fn, remove_matched};
use crate::rule::RewriteRule;

fn implementation_of(graph: &Graph, lambda: NodeId) -> Result<NodeId, RewriteError> {
    lambda_implementation(graph, lambda)
        .ok_or_else(|| RewriteError::malformed(format!("lambda '{}' has no implementation", graph.label(lambda))))
}

/// Inlines calls of parameterless, non-recursive lambdas without side
/// effects.
pub fn replace_non_recursive_call() -> RewriteRule {
    RewriteRule::new(
        "replace_non_recursive_call",
        "inline non-recursive call",
        by_id_and_inputs(
            CALL,
            named([port(
                "fn",
                lambda(LambdaOptions {
                    recursive: Some(false),
                    side_effects: Some(false),
                    input_ports: Some(0),
                    output_ports: Some(1),
                }),
            )]),
        ),
        from_fn(|graph, m| {
            let implementation = implementation_of(graph, m.require("fn")?.node)?;
            let inlined = copy_node_into(graph, implementation, graph.parent(m.node))?;
            create_edge_to_each_successor(graph, inlined, (m.node, "result"))?;
            remove_matched(graph, m.node)
        }),
    )
}

/// Moves the bound value of a partial application into a copy of the
/// lambda, dropping the parameter it was bound to.
pub fn replace_non_recursive_partial() -> RewriteRule {
    RewriteRule::new(
        "replace_non_recursive_partial",
        "inline partial application",
        direct(
            by_id_and_inputs(
                PARTIAL,
                named([
                    port(
                        "fn",
                        lambda(LambdaOptions {
                            recursive: Some(false),
                            side_effects: Some(false),
                            ..LambdaOptions::default()
                        }),
                    ),
                    port("value", movable(any())),
                ]),
            ),
            &["value"],
        ),
        from_fn(inline_partial),
    )
}

fn inline_partial(graph: &mut Graph, m: &Match) -> Result<(), RewriteError> {
    let partial = m.node;
    let index = graph
        .require(partial)?
        .params
        .get("partial")
        .and_then(Value::as_u64)
        .unwrap_or(0) as usize;
    let value = m
        .require("value")?
        .producer()
        .ok_or_else(|| RewriteError::malformed("partial value has no producer port"))?;

    let copy = copy_node_into(graph, m.require("fn")?.node, graph.parent(partial))?;
    create_edge_to_each_successor(graph, (copy, "fn"), (partial, "result"))?;
    let implementation = implementation_of(graph, copy)?;
    let parameter = graph.input_ports(implementation).get(index).cloned().ok_or_else(|| {
        RewriteError::malformed(format!(
            "lambda '{}' has no parameter {}",
            graph.label(copy),
            index
        ))
    })?;

    move_predecessors_into(graph, &Port::new(partial, "value"), implementation)?;
    for consumer in graph.successors(implementation, &parameter) {
        graph.add_edge(&value, &consumer)?;
    }
    remove_port(graph, implementation, &parameter)?;
    tracing::trace!(lambda = %graph.label(copy), parameter = %parameter, "bound partial argument");
    remove_matched(graph, partial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::apply_rule;
    use crate::nodes;
    use crate::walk::{self, tests::{add, constant, edge}};
    use flowopt_core::Node;
    use serde_json::json;

    fn lambda_with(graph: &mut Graph, implementation: Node) -> (NodeId, NodeId) {
        let lambda = graph.add_node(nodes::lambda());
        let body = graph.add_node_in(implementation, Some(lambda)).unwrap();
        (lambda, body)
    }

    #[test]
    fn parameterless_calls_are_inlined() {
        let mut graph = Graph::new();
        let (lambda, body) = lambda_with(
            &mut graph,
            Node::compound("functional/implementation").with_output("value", "number"),
        );
        let five = constant(&mut graph, 5, Some(body));
        edge(&mut graph, (five, "output"), (body, "value"));
        let call = graph.add_node(nodes::call());
        let sink = graph.add_node(Node::atomic("io/print").with_input("value", "number").sink());
        edge(&mut graph, (lambda, "fn"), (call, "fn"));
        edge(&mut graph, (call, "result"), (sink, "value"));

        assert!(apply_rule(&mut graph, &replace_non_recursive_call()).unwrap());
        assert!(!graph.contains_node(lambda));
        assert!(!graph.contains_node(call));
        assert_eq!(graph.node_count(), 3);
        let producer = walk::predecessors(&graph, sink, "value")[0].node;
        assert_eq!(graph.node(producer).unwrap().value(), Some(&json!(5)));
    }

    #[test]
    fn calls_of_lambdas_with_parameters_are_kept() {
        let mut graph = Graph::new();
        let (lambda, _) = lambda_with(
            &mut graph,
            Node::compound("functional/implementation")
                .with_input("a", "number")
                .with_output("value", "number"),
        );
        let call = graph.add_node(nodes::call());
        edge(&mut graph, (lambda, "fn"), (call, "fn"));
        assert!(!apply_rule(&mut graph, &replace_non_recursive_call()).unwrap());
    }

    #[test]
    fn partial_arguments_move_into_the_lambda() {
        let mut graph = Graph::new();
        let (lambda, body) = lambda_with(
            &mut graph,
            Node::compound("functional/implementation")
                .with_input("a", "number")
                .with_input("b", "number")
                .with_output("value", "number"),
        );
        let sum = add(&mut graph, Some(body));
        edge(&mut graph, (body, "a"), (sum, "s1"));
        edge(&mut graph, (body, "b"), (sum, "s2"));
        edge(&mut graph, (sum, "sum"), (body, "value"));
        let three = constant(&mut graph, 3, None);
        let partial = graph.add_node(nodes::partial(0));
        let sink = graph.add_node(Node::atomic("io/call").with_input("value", "function").sink());
        edge(&mut graph, (lambda, "fn"), (partial, "fn"));
        edge(&mut graph, (three, "output"), (partial, "value"));
        edge(&mut graph, (partial, "result"), (sink, "value"));

        assert!(apply_rule(&mut graph, &replace_non_recursive_partial()).unwrap());
        assert!(!graph.contains_node(lambda));
        assert!(!graph.contains_node(partial));

        let copy = graph.predecessors(sink, "value")[0].node;
        assert_eq!(graph.node(copy).unwrap().kind, nodes::LAMBDA);
        let new_body = lambda_implementation(&graph, copy).unwrap();
        assert_eq!(graph.input_ports(new_body), ["b"]);
        assert_eq!(graph.parent(three), Some(new_body));
        let new_sum = graph
            .children(new_body)
            .into_iter()
            .find(|&n| graph.node(n).unwrap().kind == "math/add")
            .unwrap();
        assert_eq!(graph.predecessors(new_sum, "s1").as_slice(), &[Port::new(three, "output")]);
        assert_eq!(graph.predecessors(new_sum, "s2").as_slice(), &[Port::new(new_body, "b")]);
    }

    #[test]
    fn shared_partial_arguments_are_not_moved() {
        let mut graph = Graph::new();
        let (lambda, _) = lambda_with(
            &mut graph,
            Node::compound("functional/implementation")
                .with_input("a", "number")
                .with_output("value", "number"),
        );
        let three = constant(&mut graph, 3, None);
        let partial = graph.add_node(nodes::partial(0));
        let other = graph.add_node(Node::atomic("io/print").with_input("value", "number").sink());
        edge(&mut graph, (lambda, "fn"), (partial, "fn"));
        edge(&mut graph, (three, "output"), (partial, "value"));
        edge(&mut graph, (three, "output"), (other, "value"));

        assert!(!apply_rule(&mut graph, &replace_non_recursive_partial()).unwrap());
    }
}
