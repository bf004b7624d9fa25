//! Tail recursion to an explicit loop.
//!
//! A recursive definition whose output is computed by a chain of
//! `logic/mux` nodes, with every recursive call sitting directly on that
//! chain, is a decision list: each mux tests a predicate and either returns
//! a value or continues with new arguments. The rewrite turns the
//! definition into a single `tailrec` node fed by one lambda per predicate
//! and per branch.

use std::collections::HashSet;

use serde_json::Value;

use flowopt_core::{Graph, Node, NodeId, Port};

use super::lambda::{extract_into_lambda, LambdaOutput};
use super::{recursive_calls, single_producer};
use crate::edit::deep_remove_node;
use crate::error::RewriteError;
use crate::nodes::{MUX, TAILREC};

/// What a branch of the decision list evaluates to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchValue {
    /// Return the value on this port.
    Return(Port),
    /// Continue with the arguments of this recursive call.
    Continue(NodeId),
}

impl BranchValue {
    fn kind(&self) -> &'static str {
        match self {
            BranchValue::Return(_) => "return",
            BranchValue::Continue(_) => "continue",
        }
    }
}

/// One entry of the decision list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailBranch {
    /// Producer of the mux control.
    pub predicate: Port,
    /// The branch is taken when the predicate is false.
    pub negated: bool,
    pub value: BranchValue,
}

/// A tail-recursive definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailRecursion {
    pub root: NodeId,
    pub output: String,
    pub branches: Vec<TailBranch>,
    /// Taken when no predicate holds.
    pub otherwise: BranchValue,
}

fn is_chain_mux(graph: &Graph, root: NodeId, port: &Port) -> bool {
    port.port == "output"
        && graph.parent(port.node) == Some(root)
        && graph.node(port.node).is_some_and(|n| n.kind == MUX)
}

fn classify(calls: &[NodeId], port: Port) -> BranchValue {
    if calls.contains(&port.node) {
        BranchValue::Continue(port.node)
    } else {
        BranchValue::Return(port)
    }
}

/// Matches a recursive root whose recursive calls are all tail calls on
/// the mux chain feeding its single output.
///
/// Only calls inside `node` are considered. Every use of a recursive
/// function is its own root instance, so other instances of the same kind
/// are left alone.
pub fn match_tail_recursive_compound(graph: &Graph, node: NodeId) -> Option<TailRecursion> {
    let value = graph.node(node)?;
    if !value.recursive_root || value.atomic {
        return None;
    }
    let outputs = graph.output_ports(node);
    let [output] = outputs.as_slice() else {
        return None;
    };
    let calls = recursive_calls(graph, node);
    if calls.is_empty() {
        return None;
    }
    let mut branches = Vec::new();
    let mut muxes = HashSet::new();
    let mut current = single_producer(graph, node, output)?;
    let otherwise = loop {
        if !is_chain_mux(graph, node, &current) {
            return None;
        }
        let mux = current.node;
        if !muxes.insert(mux) || graph.successors(mux, "output").len() != 1 {
            return None;
        }
        let control = single_producer(graph, mux, "control")?;
        let input1 = single_producer(graph, mux, "input1")?;
        let input2 = single_producer(graph, mux, "input2")?;
        match (is_chain_mux(graph, node, &input1), is_chain_mux(graph, node, &input2)) {
            (true, true) => return None,
            (false, true) => {
                branches.push(TailBranch {
                    predicate: control,
                    negated: false,
                    value: classify(&calls, input1),
                });
                current = input2;
            }
            (true, false) => {
                branches.push(TailBranch {
                    predicate: control,
                    negated: true,
                    value: classify(&calls, input2),
                });
                current = input1;
            }
            (false, false) => {
                branches.push(TailBranch {
                    predicate: control,
                    negated: false,
                    value: classify(&calls, input1),
                });
                break classify(&calls, input2);
            }
        }
    };

    let continued: Vec<NodeId> = branches
        .iter()
        .map(|b| &b.value)
        .chain(std::iter::once(&otherwise))
        .filter_map(|v| match v {
            BranchValue::Continue(call) => Some(*call),
            BranchValue::Return(_) => None,
        })
        .collect();
    let distinct: HashSet<NodeId> = continued.iter().copied().collect();
    if distinct.len() != continued.len() || distinct.len() != calls.len() {
        return None;
    }
    for &call in &calls {
        if graph.parent(call) != Some(node) {
            return None;
        }
        let consumers_ok = graph
            .output_ports(call)
            .iter()
            .flat_map(|p| graph.successors(call, p))
            .all(|c| c.node == node || muxes.contains(&c.node));
        let arguments_ok = graph
            .input_ports(node)
            .iter()
            .all(|p| single_producer(graph, call, p).is_some());
        if !consumers_ok || !arguments_ok {
            return None;
        }
    }

    Some(TailRecursion {
        root: node,
        output: output.clone(),
        branches,
        otherwise,
    })
}

/// Builds the lambda computing a branch value.
fn branch_lambda(graph: &mut Graph, root: NodeId, value: &BranchValue) -> Result<NodeId, RewriteError> {
    match value {
        BranchValue::Return(port) => {
            extract_into_lambda(graph, root, &[LambdaOutput::new("value", port.clone())], false)
        }
        BranchValue::Continue(call) => {
            let mut outputs = Vec::new();
            for parameter in graph.input_ports(root) {
                let source = single_producer(graph, *call, &parameter).ok_or_else(|| {
                    RewriteError::malformed(format!("argument '{}' of a tail call is not bound", parameter))
                })?;
                outputs.push(LambdaOutput::new(format!("next_{}", parameter), source));
            }
            extract_into_lambda(graph, root, &outputs, false)
        }
    }
}

/// Replaces a tail-recursive definition with a `tailrec` node.
///
/// The node has `predicate<i>`, `then<i>` and `else` lambda inputs, one
/// `initial_<name>` input per parameter of the definition, and the
/// definition's output port. `params.branches` records for every `then<i>`
/// and the final `else` whether it returns or continues.
pub fn tail_recursion_to_loop(graph: &mut Graph, recursion: &TailRecursion) -> Result<(), RewriteError> {
    let root = recursion.root;
    let value = graph.require(root)?;
    let parameters: Vec<(String, String)> = value
        .input_port_names()
        .into_iter()
        .map(|p| {
            let ty = value.port_type(&p).unwrap_or("generic").to_string();
            (p, ty)
        })
        .collect();
    let output_type = value.port_type(&recursion.output).unwrap_or("generic").to_string();

    let n = recursion.branches.len();
    let mut node = Node::atomic(TAILREC);
    let mut ordering = Vec::new();
    for i in 0..n {
        node = node.with_input(format!("predicate{}", i), "function");
        ordering.push(format!("predicate{}", i));
    }
    for i in 0..n {
        node = node.with_input(format!("then{}", i), "function");
        ordering.push(format!("then{}", i));
    }
    node = node.with_input("else", "function");
    ordering.push("else".to_string());
    for (name, ty) in &parameters {
        node = node.with_input(format!("initial_{}", name), ty.as_str());
        ordering.push(format!("initial_{}", name));
    }
    node = node.with_output(recursion.output.as_str(), output_type);
    ordering.push(recursion.output.clone());
    let kinds: Vec<Value> = recursion
        .branches
        .iter()
        .map(|b| &b.value)
        .chain(std::iter::once(&recursion.otherwise))
        .map(|v| Value::from(v.kind()))
        .collect();
    node = node
        .with_param("branches", Value::Array(kinds))
        .with_argument_ordering(ordering);
    node.extra.insert("version".into(), Value::from("0.2.0"));

    let tailrec = graph.add_node_in(node, graph.parent(root))?;
    for (i, branch) in recursion.branches.iter().enumerate() {
        let predicate = extract_into_lambda(
            graph,
            root,
            &[LambdaOutput::new("value", branch.predicate.clone())],
            branch.negated,
        )?;
        graph.add_edge(&Port::new(predicate, "fn"), &Port::new(tailrec, format!("predicate{}", i)))?;
        let then = branch_lambda(graph, root, &branch.value)?;
        graph.add_edge(&Port::new(then, "fn"), &Port::new(tailrec, format!("then{}", i)))?;
    }
    let otherwise = branch_lambda(graph, root, &recursion.otherwise)?;
    graph.add_edge(&Port::new(otherwise, "fn"), &Port::new(tailrec, "else"))?;

    for (name, _) in &parameters {
        for producer in graph.predecessors(root, name) {
            graph.add_edge(&producer, &Port::new(tailrec, format!("initial_{}", name)))?;
        }
    }
    for consumer in graph.successors(root, &recursion.output) {
        graph.add_edge(&Port::new(tailrec, recursion.output.clone()), &consumer)?;
    }
    tracing::debug!(
        root = %graph.label(root),
        tailrec = %graph.label(tailrec),
        branches = n,
        "converted tail recursion to loop"
    );
    deep_remove_node(graph, root)
}
