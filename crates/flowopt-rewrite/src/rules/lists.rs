use flowopt_core::{Graph, NodeId, Port};

use super::{direct, first_output};
use crate::edit::{create_edge_to_each_successor, create_subgraph, SubgraphSpec};
use crate::error::RewriteError;
use crate::matcher::{any, by_id_and_inputs, named, once, port};
use crate::nodes;
use crate::recursion::single_producer;
use crate::rewriter::{from_fn, remove_matched};
use crate::rule::RewriteRule;

fn bound_producer(graph: &Graph, node: NodeId, input: &str) -> Result<Port, RewriteError> {
    single_producer(graph, node, input).ok_or_else(|| {
        RewriteError::malformed(format!("input '{}' of '{}' is not bound", input, graph.label(node)))
    })
}

/// `first(map(list, fn))` only needs `fn` applied to `first(list)`.
pub fn replace_head_after_map() -> RewriteRule {
    RewriteRule::new(
        "replace_head_after_map",
        "replace head after map",
        once(direct(
            by_id_and_inputs(
                "array/first",
                named([port(
                    "array",
                    by_id_and_inputs("map", named([port("list", any()), port("fn", any())])),
                )]),
            ),
            &["array"],
        )),
        from_fn(|graph, m| {
            let map = m.require("array")?.node;
            let list = bound_producer(graph, map, "list")?;
            let function = bound_producer(graph, map, "fn")?;
            let head = SubgraphSpec::new(nodes::array_first()).predecessor("array", SubgraphSpec::port_of(&list));
            let spec = SubgraphSpec::new(nodes::call()).predecessor(
                "fn",
                SubgraphSpec::new(nodes::partial(0))
                    .predecessor("value", head)
                    .predecessor("fn", SubgraphSpec::port_of(&function)),
            );
            let created = create_subgraph(graph, graph.parent(m.node), spec)?;
            let output = first_output(graph, m.node)?;
            create_edge_to_each_successor(graph, created.node, (m.node, output.as_str()))?;
            remove_matched(graph, m.node)
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::apply_rule;
    use crate::nodes::{CALL, PARTIAL};
    use flowopt_core::Node;

    fn connect(graph: &mut Graph, from: (NodeId, &str), to: (NodeId, &str)) {
        graph.add_edge(&Port::new(from.0, from.1), &Port::new(to.0, to.1)).unwrap();
    }

    #[test]
    fn head_of_a_map_applies_the_function_once() {
        let mut graph = Graph::new();
        let list = graph.add_node(Node::atomic("io/read_list").with_output("output", "[number]"));
        let function = graph.add_node(nodes::lambda());
        let map = graph.add_node(
            Node::atomic("map")
                .with_input("list", "[number]")
                .with_input("fn", "function")
                .with_output("result", "[number]"),
        );
        let first = graph.add_node(nodes::array_first());
        let sink = graph.add_node(Node::atomic("io/print").with_input("value", "number").sink());
        connect(&mut graph, (list, "output"), (map, "list"));
        connect(&mut graph, (function, "fn"), (map, "fn"));
        connect(&mut graph, (map, "result"), (first, "array"));
        connect(&mut graph, (first, "value"), (sink, "value"));

        let rule = replace_head_after_map();
        assert!(apply_rule(&mut graph, &rule).unwrap());
        assert!(!graph.contains_node(map));
        assert!(!graph.contains_node(first));

        let call = graph.predecessors(sink, "value")[0].node;
        assert_eq!(graph.node(call).unwrap().kind, CALL);
        let partial = graph.predecessors(call, "fn")[0].node;
        assert_eq!(graph.node(partial).unwrap().kind, PARTIAL);
        assert_eq!(graph.predecessors(partial, "fn").as_slice(), &[Port::new(function, "fn")]);
        let head = graph.predecessors(partial, "value")[0].node;
        assert_eq!(graph.predecessors(head, "array").as_slice(), &[Port::new(list, "output")]);
    }

    #[test]
    fn the_rule_fires_only_once() {
        let mut graph = Graph::new();
        let mut firsts = Vec::new();
        for _ in 0..2 {
            let list = graph.add_node(Node::atomic("io/read_list").with_output("output", "[number]"));
            let function = graph.add_node(nodes::lambda());
            let map = graph.add_node(
                Node::atomic("map")
                    .with_input("list", "[number]")
                    .with_input("fn", "function")
                    .with_output("result", "[number]"),
            );
            let first = graph.add_node(nodes::array_first());
            connect(&mut graph, (list, "output"), (map, "list"));
            connect(&mut graph, (function, "fn"), (map, "fn"));
            connect(&mut graph, (map, "result"), (first, "array"));
            firsts.push(first);
        }

        let rule = replace_head_after_map();
        assert!(apply_rule(&mut graph, &rule).unwrap());
        assert_eq!(firsts.iter().filter(|&&f| graph.contains_node(f)).count(), 1);
    }
}
