//! Recursion normalization on small recursive definitions.

use serde_json::json;

use flowopt_core::{Graph, Node, NodeId, Port};
use flowopt_rewrite::nodes::{self, TAILREC};
use flowopt_rewrite::recursion::{match_linear_recursive_compound, match_tail_recursive_compound};
use flowopt_rewrite::rules::{linear_recursion_to_tail_recursion, tail_recursion_to_loop};
use flowopt_rewrite::{apply_rule, optimize, OptimizeOptions};

fn connect(graph: &mut Graph, from: (NodeId, &str), to: (NodeId, &str)) {
    graph.add_edge(&Port::new(from.0, from.1), &Port::new(to.0, to.1)).unwrap();
}

fn number(graph: &mut Graph, value: i64, parent: Option<NodeId>) -> NodeId {
    graph.add_node_in(nodes::constant(value), parent).unwrap()
}

fn is_zero(graph: &mut Graph, parent: NodeId) -> NodeId {
    graph
        .add_node_in(
            Node::atomic("math/is_zero")
                .with_input("value", "number")
                .with_output("output", "bool"),
            Some(parent),
        )
        .unwrap()
}

fn binary(graph: &mut Graph, kind: &str, parent: NodeId) -> NodeId {
    let (a, b, out) = if kind == "math/add" { ("s1", "s2", "sum") } else { ("m1", "m2", "product") };
    graph
        .add_node_in(
            Node::atomic(kind)
                .with_input(a, "number")
                .with_input(b, "number")
                .with_output(out, "number"),
            Some(parent),
        )
        .unwrap()
}

fn sink(graph: &mut Graph) -> NodeId {
    graph.add_node(Node::atomic("io/print").with_input("value", "number").sink())
}

fn nodes_of_kind(graph: &Graph, kind: &str) -> Vec<NodeId> {
    graph
        .node_ids()
        .into_iter()
        .filter(|&n| graph.node(n).is_some_and(|v| v.kind == kind))
        .collect()
}

/// `count(n, acc) = n == 0 ? acc : count(n - 1, acc + n)`, applied to
/// `(5, 0)`.
fn count_down() -> (Graph, NodeId, NodeId) {
    let mut graph = Graph::new();
    let (root, out) = add_count_down(&mut graph, 5);
    (graph, root, out)
}

/// Adds one use of `count`, applied to `(start, 0)`, with its own sink.
fn add_count_down(graph: &mut Graph, start: i64) -> (NodeId, NodeId) {
    let definition = || {
        Node::compound("count")
            .with_input("n", "number")
            .with_input("acc", "number")
            .with_output("out", "number")
    };
    let start = number(graph, start, None);
    let zero = number(graph, 0, None);
    let root = graph.add_node(definition().recursive_root());
    let test = is_zero(graph, root);
    let minus_one = number(graph, -1, Some(root));
    let dec = binary(graph, "math/add", root);
    let next_acc = binary(graph, "math/add", root);
    let call = graph.add_node_in(definition().recursive_call(), Some(root)).unwrap();
    let mux = graph.add_node_in(nodes::mux("number"), Some(root)).unwrap();
    let out = sink(graph);

    connect(graph, (start, "output"), (root, "n"));
    connect(graph, (zero, "output"), (root, "acc"));
    connect(graph, (root, "n"), (test, "value"));
    connect(graph, (root, "n"), (dec, "s1"));
    connect(graph, (minus_one, "output"), (dec, "s2"));
    connect(graph, (root, "acc"), (next_acc, "s1"));
    connect(graph, (root, "n"), (next_acc, "s2"));
    connect(graph, (dec, "sum"), (call, "n"));
    connect(graph, (next_acc, "sum"), (call, "acc"));
    connect(graph, (test, "output"), (mux, "control"));
    connect(graph, (root, "acc"), (mux, "input1"));
    connect(graph, (call, "out"), (mux, "input2"));
    connect(graph, (mux, "output"), (root, "out"));
    connect(graph, (root, "out"), (out, "value"));
    (root, out)
}

/// `f(n) = n == 0 ? base : op(f(n - 1), n)`, applied to `5`.
fn linear(kind: &str, base: i64) -> (Graph, NodeId) {
    let (graph, root, _, _) = linear_with_call_on(kind, base, 0);
    (graph, root)
}

/// Like [`linear`], with the recursive call on input `operand` of the
/// operation and `n` on the other. Returns the graph, the root, the base
/// constant and the recursive call.
fn linear_with_call_on(kind: &str, base: i64, operand: usize) -> (Graph, NodeId, NodeId, NodeId) {
    let definition = || Node::compound("f").with_input("n", "number").with_output("out", "number");
    let mut graph = Graph::new();
    let start = number(&mut graph, 5, None);
    let root = graph.add_node(definition().recursive_root());
    let test = is_zero(&mut graph, root);
    let base = number(&mut graph, base, Some(root));
    let minus_one = number(&mut graph, -1, Some(root));
    let dec = binary(&mut graph, "math/add", root);
    let call = graph.add_node_in(definition().recursive_call(), Some(root)).unwrap();
    let op = binary(&mut graph, kind, root);
    let mux = graph.add_node_in(nodes::mux("number"), Some(root)).unwrap();
    let out = sink(&mut graph);
    let inputs = graph.input_ports(op);

    connect(&mut graph, (start, "output"), (root, "n"));
    connect(&mut graph, (root, "n"), (test, "value"));
    connect(&mut graph, (root, "n"), (dec, "s1"));
    connect(&mut graph, (minus_one, "output"), (dec, "s2"));
    connect(&mut graph, (dec, "sum"), (call, "n"));
    connect(&mut graph, (call, "out"), (op, inputs[operand].as_str()));
    connect(&mut graph, (root, "n"), (op, inputs[1 - operand].as_str()));
    let result = graph.output_ports(op).remove(0);
    connect(&mut graph, (op, result.as_str()), (mux, "input2"));
    connect(&mut graph, (test, "output"), (mux, "control"));
    connect(&mut graph, (base, "output"), (mux, "input1"));
    connect(&mut graph, (mux, "output"), (root, "out"));
    connect(&mut graph, (root, "out"), (out, "value"));
    (graph, root, base, call)
}

#[test]
fn tail_recursion_is_recognized_as_a_decision_list() {
    let (graph, root, _) = count_down();
    let recursion = match_tail_recursive_compound(&graph, root).unwrap();
    assert_eq!(recursion.branches.len(), 1);
    assert!(!recursion.branches[0].negated);
    assert!(match_linear_recursive_compound(&graph, root).is_none());
}

#[test]
fn tail_recursion_becomes_a_tailrec_node() {
    let (mut graph, root, out) = count_down();
    assert!(apply_rule(&mut graph, &tail_recursion_to_loop()).unwrap());

    assert!(!graph.contains_node(root));
    assert!(nodes_of_kind(&graph, "count").is_empty());
    let [tailrec]: [NodeId; 1] = nodes_of_kind(&graph, TAILREC).try_into().unwrap();
    let value = graph.node(tailrec).unwrap();
    // 2n + 1 closures for n = 1 predicates, plus one initial value per parameter.
    assert_eq!(
        graph.input_ports(tailrec),
        ["predicate0", "then0", "else", "initial_n", "initial_acc"]
    );
    assert_eq!(value.params.get("branches"), Some(&json!(["return", "continue"])));
    assert_eq!(graph.predecessors(out, "value").as_slice(), &[Port::new(tailrec, "out")]);

    for closure in ["predicate0", "then0", "else"] {
        let lambda = graph.predecessors(tailrec, closure)[0].node;
        assert_eq!(graph.node(lambda).unwrap().kind, nodes::LAMBDA);
    }
    let initial = graph.predecessors(tailrec, "initial_n")[0].node;
    assert_eq!(graph.node(initial).unwrap().value(), Some(&json!(5)));
    graph.validate().unwrap();
}

#[test]
fn continuation_lambdas_compute_every_next_argument() {
    let (mut graph, _, _) = count_down();
    assert!(apply_rule(&mut graph, &tail_recursion_to_loop()).unwrap());
    let [tailrec]: [NodeId; 1] = nodes_of_kind(&graph, TAILREC).try_into().unwrap();
    let lambda = graph.predecessors(tailrec, "else")[0].node;
    let implementation = graph.children(lambda)[0];
    assert_eq!(graph.input_ports(implementation), ["n", "acc"]);
    assert_eq!(graph.output_ports(implementation), ["next_n", "next_acc"]);
}

#[test]
fn linear_recursion_seeds_the_neutral_element() {
    for (kind, neutral) in [("math/add", 0), ("math/multiply", 1)] {
        let (mut graph, root) = linear(kind, 7);
        assert!(match_linear_recursive_compound(&graph, root).is_some());
        assert!(apply_rule(&mut graph, &linear_recursion_to_tail_recursion()).unwrap());

        assert_eq!(graph.input_ports(root), ["n", "accumulator"]);
        let seed = graph.predecessors(root, "accumulator")[0].node;
        assert_eq!(graph.node(seed).unwrap().value(), Some(&json!(neutral)));
        assert_eq!(graph.parent(seed), None);
        assert!(match_tail_recursive_compound(&graph, root).is_some());
        graph.validate().unwrap();
    }
}

#[test]
fn accumulator_goes_first_when_the_call_is_the_second_operand() {
    let (mut graph, root, base, call) = linear_with_call_on("math/multiply", 1, 1);
    let recursion = match_linear_recursive_compound(&graph, root).unwrap();
    assert_eq!(recursion.call_port, "m2");
    assert!(apply_rule(&mut graph, &linear_recursion_to_tail_recursion()).unwrap());

    let accumulator = Port::new(root, "accumulator");
    // Base case: `acc * base`.
    let mux = graph.predecessors(root, "out")[0].node;
    let on_base = graph.predecessors(mux, "input1")[0].node;
    assert_eq!(graph.predecessors(on_base, "m1").as_slice(), &[accumulator.clone()]);
    assert_eq!(graph.predecessors(on_base, "m2").as_slice(), &[Port::new(base, "output")]);
    // Recursive case: the call receives `acc * n`.
    let update = graph.predecessors(call, "accumulator")[0].node;
    assert_eq!(graph.predecessors(update, "m1").as_slice(), &[accumulator]);
    assert_eq!(graph.predecessors(update, "m2").as_slice(), &[Port::new(root, "n")]);
    assert_eq!(graph.predecessors(mux, "input2").as_slice(), &[Port::new(call, "out")]);
    graph.validate().unwrap();
}

#[test]
fn factorial_optimizes_to_a_loop() {
    let (graph, _) = linear("math/multiply", 1);
    let optimized = optimize(graph, OptimizeOptions::default()).unwrap().graph;

    assert!(nodes_of_kind(&optimized, "f").is_empty());
    let [tailrec]: [NodeId; 1] = nodes_of_kind(&optimized, TAILREC).try_into().unwrap();
    assert_eq!(
        optimized.input_ports(tailrec),
        ["predicate0", "then0", "else", "initial_n", "initial_accumulator"]
    );
    let seed = optimized.predecessors(tailrec, "initial_accumulator")[0].node;
    assert_eq!(optimized.node(seed).unwrap().value(), Some(&json!(1)));
    optimized.validate().unwrap();
}

#[test]
fn every_use_of_a_recursive_function_becomes_a_loop() {
    let mut graph = Graph::new();
    let (first, _) = add_count_down(&mut graph, 5);
    let (second, _) = add_count_down(&mut graph, 3);
    assert!(match_tail_recursive_compound(&graph, first).is_some());
    assert!(match_tail_recursive_compound(&graph, second).is_some());

    let optimized = optimize(graph, OptimizeOptions::default()).unwrap().graph;
    assert!(nodes_of_kind(&optimized, "count").is_empty());
    assert_eq!(nodes_of_kind(&optimized, TAILREC).len(), 2);
    optimized.validate().unwrap();
}
