use flowopt_core::{Graph, Port};

use super::{direct, literal};
use crate::edit::{create_edge, create_edge_from_each_predecessor, create_edge_to_each_successor};
use crate::error::RewriteError;
use crate::eval::evaluate;
use crate::matcher::{
    any_with, by_id, by_id_and_inputs, by_id_and_same_inputs, constant_node, constant_value, named, port,
    positional, AnyOptions, Match, MatcherExt,
};
use crate::nodes::{self, MUX, NOT};
use crate::rewriter::{bridge_over, from_fn, remove_matched, remove_node, with_node, Bridge, PortBridge, Replacement};
use crate::rule::RewriteRule;

const AND: &str = "logic/and";
const OR: &str = "logic/or";

fn unbound_ok() -> AnyOptions {
    AnyOptions { require_node: false }
}

fn fold_binary(kind: &'static str, output: &'static str) -> impl Fn(&Graph, &Match) -> Result<Replacement, RewriteError> {
    move |graph: &Graph, m: &Match| {
        let value = evaluate(kind, &[literal(graph, m, "i1")?, literal(graph, m, "i2")?])?;
        Ok(Replacement::new(nodes::constant(value)).output(output, "output"))
    }
}

pub fn replace_constant_and() -> RewriteRule {
    RewriteRule::new(
        "replace_constant_and",
        "replace and of two literals",
        by_id_and_inputs(
            AND,
            named([port("i1", constant_node()), port("i2", constant_node())]),
        ),
        with_node(fold_binary(AND, "and")),
    )
}

/// `false && x` is `false` whatever `x` is.
pub fn replace_false_and() -> RewriteRule {
    RewriteRule::new(
        "replace_false_and",
        "replace and with a false operand",
        by_id_and_inputs(
            AND,
            positional([constant_value(false).boxed(), any_with(unbound_ok()).boxed()]),
        ),
        with_node(|_: &Graph, _: &Match| Ok(Replacement::new(nodes::constant_bool(false)).output("and", "output"))),
    )
}

pub fn replace_constant_or() -> RewriteRule {
    RewriteRule::new(
        "replace_constant_or",
        "replace or of two literals",
        by_id_and_inputs(
            OR,
            named([port("i1", constant_node()), port("i2", constant_node())]),
        ),
        with_node(fold_binary(OR, "or")),
    )
}

/// `true || x` is `true` whatever `x` is.
pub fn replace_true_or() -> RewriteRule {
    RewriteRule::new(
        "replace_true_or",
        "replace or with a true operand",
        by_id_and_inputs(
            OR,
            positional([constant_value(true).boxed(), any_with(unbound_ok()).boxed()]),
        ),
        with_node(|_: &Graph, _: &Match| Ok(Replacement::new(nodes::constant_bool(true)).output("or", "output"))),
    )
}

pub fn replace_constant_not() -> RewriteRule {
    RewriteRule::new(
        "replace_constant_not",
        "replace not of a literal",
        by_id_and_inputs(NOT, named([port("input", constant_node())])),
        with_node(|graph: &Graph, m: &Match| {
            let value = evaluate(NOT, &[literal(graph, m, "input")?])?;
            Ok(Replacement::new(nodes::constant(value)).output("output", "output"))
        }),
    )
}

pub fn replace_double_negation() -> RewriteRule {
    RewriteRule::new(
        "replace_double_negation",
        "remove double negation",
        direct(by_id_and_inputs(NOT, named([port("input", by_id(NOT))])), &["input"]),
        bridge_over(|graph: &Graph, m: &Match| {
            let inner = m.require("input")?.node;
            let sources = graph.predecessors(inner, "input");
            Ok(sources
                .into_iter()
                .take(1)
                .map(|source| Bridge {
                    source,
                    target: Port::new(m.node, "output"),
                })
                .collect())
        }),
    )
}

/// `!a && !b` becomes `!(a || b)`.
pub fn replace_de_morgan_and() -> RewriteRule {
    de_morgan("replace_de_morgan_and", "apply de morgan to and", AND, "and")
}

/// `!a || !b` becomes `!(a && b)`.
pub fn replace_de_morgan_or() -> RewriteRule {
    de_morgan("replace_de_morgan_or", "apply de morgan to or", OR, "or")
}

fn de_morgan(id: &str, name: &str, kind: &'static str, output: &'static str) -> RewriteRule {
    RewriteRule::new(
        id,
        name,
        direct(
            by_id_and_inputs(kind, named([port("i1", by_id(NOT)), port("i2", by_id(NOT))])),
            &["i1", "i2"],
        ),
        from_fn(move |graph, m| {
            let parent = graph.parent(m.node);
            let dual = if kind == AND { nodes::logic_or() } else { nodes::logic_and() };
            let op = graph.add_node_in(dual, parent)?;
            let not = graph.add_node_in(nodes::logic_not(), parent)?;
            create_edge(graph, op, (not, "input"))?;
            create_edge_to_each_successor(graph, (not, "output"), (m.node, output))?;
            for key in ["i1", "i2"] {
                let negation = m.require(key)?.node;
                create_edge_from_each_predecessor(graph, (negation, "input"), (op, key))?;
            }
            remove_matched(graph, m.node)
        }),
    )
}

/// A mux choosing between equal values is that value.
pub fn replace_mux_with_same_inputs() -> RewriteRule {
    RewriteRule::new(
        "replace_mux_with_same_inputs",
        "replace mux with equal inputs",
        by_id_and_same_inputs(MUX, &["input1", "input2"], any_with(unbound_ok())),
        remove_node(|_: &Graph, _: &Match| Ok(vec![PortBridge::new("input1", "output")])),
    )
}
