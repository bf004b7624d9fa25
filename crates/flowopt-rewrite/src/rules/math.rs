use flowopt_core::Graph;

use super::{bound_port, first_output, literal};
use crate::error::RewriteError;
use crate::eval::evaluate;
use crate::matcher::{
    any_with, by_id_and_inputs, constant_node, constant_value, named, one_of, port, positional, AnyOptions, Match,
    MatcherExt,
};
use crate::nodes;
use crate::rewriter::{remove_node, with_node, PortBridge, Replacement};
use crate::rule::RewriteRule;

fn unbound_ok() -> AnyOptions {
    AnyOptions { require_node: false }
}

/// Folds additions and multiplications of two literals.
pub fn replace_constant_calculations() -> RewriteRule {
    RewriteRule::new(
        "replace_constant_calculations",
        "replace constant calculations",
        one_of([
            by_id_and_inputs(
                "math/add",
                named([
                    port("s1", constant_node()).alias("a"),
                    port("s2", constant_node()).alias("b"),
                ]),
            )
            .boxed(),
            by_id_and_inputs(
                "math/multiply",
                named([
                    port("m1", constant_node()).alias("a"),
                    port("m2", constant_node()).alias("b"),
                ]),
            )
            .boxed(),
        ]),
        with_node(|graph: &Graph, m: &Match| {
            let kind = &graph.require(m.node)?.kind;
            let value = evaluate(kind, &[literal(graph, m, "a")?, literal(graph, m, "b")?])?;
            Ok(Replacement::new(nodes::constant(value)).output(first_output(graph, m.node)?, "output"))
        }),
    )
}

pub fn replace_multiplication_with_zero() -> RewriteRule {
    RewriteRule::new(
        "replace_multiplication_with_zero",
        "replace multiplication with zero",
        by_id_and_inputs(
            "math/multiply",
            positional([constant_value(0).boxed(), any_with(unbound_ok()).boxed()]),
        ),
        with_node(|graph: &Graph, m: &Match| {
            Ok(Replacement::new(nodes::constant_number(0.0)).output(first_output(graph, m.node)?, "output"))
        }),
    )
}

/// `x + 0` and `0 + x` become `x`.
pub fn replace_addition_with_zero() -> RewriteRule {
    RewriteRule::new(
        "replace_addition_with_zero",
        "remove addition of zero",
        by_id_and_inputs(
            "math/add",
            positional([constant_value(0).boxed(), any_with(unbound_ok()).boxed()]),
        ),
        remove_node(bridge_other_operand),
    )
}

/// `x * 1` and `1 * x` become `x`.
pub fn replace_multiplication_with_one() -> RewriteRule {
    RewriteRule::new(
        "replace_multiplication_with_one",
        "remove multiplication with one",
        by_id_and_inputs(
            "math/multiply",
            positional([constant_value(1).boxed(), any_with(unbound_ok()).boxed()]),
        ),
        remove_node(bridge_other_operand),
    )
}

fn bridge_other_operand(graph: &Graph, m: &Match) -> Result<Vec<PortBridge>, RewriteError> {
    Ok(vec![PortBridge::new(bound_port(m, 1)?, first_output(graph, m.node)?)])
}

pub fn replace_constant_number_to_string() -> RewriteRule {
    RewriteRule::new(
        "replace_constant_number_to_string",
        "replace number_to_string of a literal",
        by_id_and_inputs("translator/number_to_string", named([port("input", constant_node())])),
        with_node(|graph: &Graph, m: &Match| {
            let value = evaluate("translator/number_to_string", &[literal(graph, m, "input")?])?;
            Ok(Replacement::new(nodes::constant(value)).output("output", "output"))
        }),
    )
}
