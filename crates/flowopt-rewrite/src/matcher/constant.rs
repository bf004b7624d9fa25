use serde_json::Value;

use flowopt_core::{Graph, NodeId};

use super::{Match, MatchContext, Matcher};
use crate::nodes::CONSTANT_KINDS;

/// Returns `true` if `kind` produces a literal.
pub fn is_constant(kind: &str) -> bool {
    CONSTANT_KINDS.contains(&kind)
}

/// Literal equality. Numbers compare by value, so `1` equals `1.0`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

pub struct ConstantNode {
    value: Option<Value>,
}

impl Matcher for ConstantNode {
    fn matches(&self, _: &mut MatchContext, graph: &Graph, node: NodeId, _: Option<&str>) -> Option<Match> {
        let value = graph.node(node)?;
        if !is_constant(&value.kind) {
            return None;
        }
        if let Some(expected) = &self.value {
            if !value.value().is_some_and(|v| values_equal(v, expected)) {
                return None;
            }
        }
        Some(Match::new(node))
    }
}

/// Matches any literal producer.
pub fn constant_node() -> ConstantNode {
    ConstantNode { value: None }
}

/// Matches a literal producer of `value`.
pub fn constant_value(value: impl Into<Value>) -> ConstantNode {
    ConstantNode {
        value: Some(value.into()),
    }
}
