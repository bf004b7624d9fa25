//! Extraction of part of a compound's body into a standalone lambda.

use std::collections::{HashSet, VecDeque};

use flowopt_core::{Graph, Node, NodeId, Port};

use crate::edit::copy_nodes_into;
use crate::error::RewriteError;
use crate::nodes;

/// Kind of the implementation compound of an extracted lambda.
pub const IMPLEMENTATION: &str = "functional/implementation";

/// One output of an extracted lambda and the port inside `root` computing
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaOutput {
    pub name: String,
    pub source: Port,
}

impl LambdaOutput {
    pub fn new(name: impl Into<String>, source: Port) -> Self {
        LambdaOutput {
            name: name.into(),
            source,
        }
    }
}

/// The children of `root` that the given sources depend on, in discovery
/// order. The walk stops at `root`'s own input ports.
fn producer_cone(graph: &Graph, root: NodeId, sources: &[&Port]) -> Vec<NodeId> {
    let mut cone = Vec::new();
    let mut seen = HashSet::new();
    let mut queue: VecDeque<NodeId> = sources.iter().map(|p| p.node).collect();
    while let Some(node) = queue.pop_front() {
        if node == root || graph.parent(node) != Some(root) || !seen.insert(node) {
            continue;
        }
        cone.push(node);
        for input in graph.input_ports(node) {
            queue.extend(graph.predecessors(node, &input).into_iter().map(|p| p.node));
        }
    }
    cone
}

/// Copies the subgraph of `root` computing `outputs` into a new lambda,
/// placed next to `root`.
///
/// The implementation of the lambda takes the same inputs as `root`; uses
/// of `root`'s parameters inside the copy are rewired to the
/// implementation's parameters. With `negate`, every output is passed
/// through a `logic/not` first. Returns the lambda node.
pub fn extract_into_lambda(
    graph: &mut Graph,
    root: NodeId,
    outputs: &[LambdaOutput],
    negate: bool,
) -> Result<NodeId, RewriteError> {
    let value = graph.require(root)?;
    let parameters: Vec<(String, String)> = value
        .input_port_names()
        .into_iter()
        .map(|p| {
            let ty = value.port_type(&p).unwrap_or("generic").to_string();
            (p, ty)
        })
        .collect();

    let mut implementation = Node::compound(IMPLEMENTATION);
    for (name, ty) in &parameters {
        implementation = implementation.with_input(name.as_str(), ty.as_str());
    }
    for output in outputs {
        let ty = if negate {
            "bool".to_string()
        } else {
            graph
                .node(output.source.node)
                .and_then(|n| n.port_type(&output.source.port))
                .unwrap_or("generic")
                .to_string()
        };
        implementation = implementation.with_output(output.name.as_str(), ty);
    }
    let ordering: Vec<String> = parameters
        .iter()
        .map(|(p, _)| p.clone())
        .chain(outputs.iter().map(|o| o.name.clone()))
        .collect();
    implementation = implementation.with_argument_ordering(ordering);

    let lambda = graph.add_node_in(nodes::lambda(), graph.parent(root))?;
    let body = graph.add_node_in(implementation, Some(lambda))?;

    let sources: Vec<&Port> = outputs.iter().map(|o| &o.source).collect();
    let cone = producer_cone(graph, root, &sources);
    let table = copy_nodes_into(graph, &cone, Some(body))?;

    // Parameters of `root` become parameters of the implementation.
    for &copy in table.values() {
        for id in graph.in_edges(copy) {
            let Some((source, dest)) = graph.edge_ports(id) else {
                continue;
            };
            if source.node == root {
                graph.remove_edge(id)?;
                graph.add_edge(&Port::new(body, source.port), &dest)?;
            }
        }
    }

    for output in outputs {
        let source = if output.source.node == root {
            Port::new(body, output.source.port.clone())
        } else {
            let copy = table.get(&output.source.node).copied().ok_or_else(|| {
                RewriteError::malformed(format!(
                    "source '{}' is not inside '{}'",
                    graph.label(output.source.node),
                    graph.label(root)
                ))
            })?;
            Port::new(copy, output.source.port.clone())
        };
        let target = Port::new(body, output.name.clone());
        if negate {
            let not = graph.add_node_in(nodes::logic_not(), Some(body))?;
            graph.add_edge(&source, &Port::new(not, "input"))?;
            graph.add_edge(&Port::new(not, "output"), &target)?;
        } else {
            graph.add_edge(&source, &target)?;
        }
    }
    tracing::trace!(root = %graph.label(root), lambda = %graph.label(lambda), nodes = cone.len(), "extracted lambda");
    Ok(lambda)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::lambda_implementation;
    use crate::walk::tests::{add, constant, edge};

    /// `f(x) = x + 1`, called with 4.
    fn increment() -> (Graph, NodeId, NodeId) {
        let mut graph = Graph::new();
        let four = constant(&mut graph, 4, None);
        let f = graph.add_node(
            Node::compound("f")
                .with_input("x", "number")
                .with_output("out", "number")
                .recursive_root(),
        );
        let one = constant(&mut graph, 1, Some(f));
        let a = add(&mut graph, Some(f));
        edge(&mut graph, (four, "output"), (f, "x"));
        edge(&mut graph, (f, "x"), (a, "s1"));
        edge(&mut graph, (one, "output"), (a, "s2"));
        edge(&mut graph, (a, "sum"), (f, "out"));
        (graph, f, a)
    }

    #[test]
    fn copies_the_cone_and_rebinds_parameters() {
        let (mut graph, f, a) = increment();
        let before = graph.children(f).len();
        let lambda = extract_into_lambda(&mut graph, f, &[LambdaOutput::new("value", Port::new(a, "sum"))], false)
            .unwrap();

        assert_eq!(graph.parent(lambda), graph.parent(f));
        assert_eq!(graph.children(f).len(), before);
        let body = lambda_implementation(&graph, lambda).unwrap();
        assert_eq!(graph.input_ports(body), vec!["x"]);
        assert_eq!(graph.output_ports(body), vec!["value"]);
        assert_eq!(graph.children(body).len(), 2);

        let copied_add = graph.predecessors(body, "value")[0].node;
        assert_ne!(copied_add, a);
        assert_eq!(graph.predecessors(copied_add, "s1").as_slice(), &[Port::new(body, "x")]);
        graph.validate().unwrap();
    }

    #[test]
    fn parameters_pass_through() {
        let (mut graph, f, _) = increment();
        let lambda =
            extract_into_lambda(&mut graph, f, &[LambdaOutput::new("next_x", Port::new(f, "x"))], false).unwrap();
        let body = lambda_implementation(&graph, lambda).unwrap();
        assert!(graph.children(body).is_empty());
        assert_eq!(graph.predecessors(body, "next_x").as_slice(), &[Port::new(body, "x")]);
    }

    #[test]
    fn negated_outputs_go_through_not() {
        let (mut graph, f, a) = increment();
        let lambda = extract_into_lambda(&mut graph, f, &[LambdaOutput::new("value", Port::new(a, "sum"))], true)
            .unwrap();
        let body = lambda_implementation(&graph, lambda).unwrap();
        let last = graph.predecessors(body, "value")[0].node;
        assert_eq!(graph.node(last).unwrap().kind, nodes::NOT);
        assert_eq!(graph.node(body).unwrap().port_type("value"), Some("bool"));
    }
}
