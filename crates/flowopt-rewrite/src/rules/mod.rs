//! The rule catalogs.
//!
//! Three catalogs are applied by [`crate::optimize`], in this order:
//! the abstract pre-pass ([`abstract_rules`]), the default rules
//! ([`default_rules`]) and the cleanup rules ([`cleanup_rules`]).

mod compounds;
mod dead_code;
mod functional;
mod lists;
mod logic;
mod math;

pub use compounds::{
    linear_recursion_to_tail_recursion, move_constants_out_of_recursive_compounds,
    move_inputs_into_recursive_compounds, remove_unnecessary_compounds, tail_recursion_to_loop,
};
pub use dead_code::{remove_unused_branches, replace_constant_mux};
pub use functional::{replace_non_recursive_call, replace_non_recursive_partial};
pub use lists::replace_head_after_map;
pub use logic::{
    replace_constant_and, replace_constant_not, replace_constant_or, replace_de_morgan_and, replace_de_morgan_or,
    replace_double_negation, replace_false_and, replace_mux_with_same_inputs, replace_true_or,
};
pub use math::{
    replace_addition_with_zero, replace_constant_calculations, replace_constant_number_to_string,
    replace_multiplication_with_one, replace_multiplication_with_zero,
};

use serde_json::Value;

use flowopt_core::{Graph, NodeId};

use crate::error::RewriteError;
use crate::matcher::{from_fn, InputKey, Match, MatchContext, Matcher};
use crate::rule::RuleCatalog;

/// Rules that delete code whose result is never observed.
pub const DEAD_CODE_RULES: [&str; 2] = ["replace_constant_mux", "remove_unused_branches"];

pub fn default_rules() -> RuleCatalog {
    RuleCatalog::new()
        .with(replace_constant_calculations())
        .with(replace_multiplication_with_zero())
        .with(replace_addition_with_zero())
        .with(replace_multiplication_with_one())
        .with(replace_constant_number_to_string())
        .with(replace_constant_and())
        .with(replace_false_and())
        .with(replace_constant_or())
        .with(replace_true_or())
        .with(replace_constant_not())
        .with(replace_double_negation())
        .with(replace_de_morgan_and())
        .with(replace_de_morgan_or())
        .with(replace_mux_with_same_inputs())
        .with(replace_non_recursive_call())
        .with(replace_non_recursive_partial())
        .with(move_inputs_into_recursive_compounds())
        .with(linear_recursion_to_tail_recursion())
        .with(tail_recursion_to_loop())
        .with(replace_constant_mux())
        .with(remove_unused_branches())
}

pub fn cleanup_rules() -> RuleCatalog {
    RuleCatalog::new()
        .with(move_constants_out_of_recursive_compounds())
        .with(replace_constant_mux())
        .with(remove_unused_branches())
}

pub fn abstract_rules() -> RuleCatalog {
    RuleCatalog::new().with(replace_head_after_map())
}

// ---------------------------------------------------------------------------
// Helpers shared by the rule modules
// ---------------------------------------------------------------------------

/// The literal produced by the node bound to `key`.
fn literal(graph: &Graph, m: &Match, key: impl Into<InputKey>) -> Result<Value, RewriteError> {
    let input = m.require(key)?;
    graph
        .require(input.node)?
        .value()
        .cloned()
        .ok_or_else(|| RewriteError::malformed(format!("'{}' has no literal value", graph.label(input.node))))
}

/// The first output port of `node`.
fn first_output(graph: &Graph, node: NodeId) -> Result<String, RewriteError> {
    graph
        .output_ports(node)
        .into_iter()
        .next()
        .ok_or_else(|| RewriteError::malformed(format!("'{}' has no output port", graph.label(node))))
}

/// The input port a bound match was reached through.
fn bound_port(m: &Match, key: impl Into<InputKey>) -> Result<String, RewriteError> {
    Ok(m.require(key)?.consumer_port()?.to_string())
}

/// Restricts `matcher` to matches whose inputs under `keys` are bound by a
/// direct edge from a sibling, so the rewrite can reuse that edge's source.
fn direct<M: Matcher + 'static>(matcher: M, keys: &'static [&'static str]) -> impl Matcher {
    from_fn(move |ctx: &mut MatchContext, graph: &Graph, node: NodeId, port: Option<&str>| {
        let m = matcher.matches(ctx, graph, node, port)?;
        keys.iter()
            .all(|&key| m.input(key).is_some_and(|input| is_direct(graph, node, input)))
            .then_some(m)
    })
}

fn is_direct(graph: &Graph, consumer: NodeId, input: &Match) -> bool {
    let (Ok(in_port), Some(producer)) = (input.consumer_port(), input.producer()) else {
        return false;
    };
    !input.dangling && graph.predecessors(consumer, in_port).as_slice() == [producer]
}
