//! Node values synthesized by rules.
//!
//! Each creator returns a detached [`Node`] with the port layout the rest
//! of the toolchain expects for that kind; callers place it in the graph.

use serde_json::Value;

use flowopt_core::Node;

/// Kinds treated as literal producers.
pub const CONSTANT_KINDS: [&str; 3] = ["math/const", "std/const", "string/const"];

pub const LAMBDA: &str = crate::edit::LAMBDA;
pub const CALL: &str = "functional/call";
pub const PARTIAL: &str = "functional/partial";
pub const MUX: &str = "logic/mux";
pub const NOT: &str = "logic/not";
pub const TAILREC: &str = "tailrec";

const VERSION: &str = "0.2.0";

fn versioned(node: Node) -> Node {
    let mut node = node;
    node.extra.insert("version".into(), Value::from(VERSION));
    node
}

/// Port type of a literal.
pub fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "[generic]",
        _ => "generic",
    }
}

/// A `std/const` node producing `value` on its `output` port.
pub fn constant(value: impl Into<Value>) -> Node {
    let value = value.into();
    versioned(
        Node::atomic("std/const")
            .with_output("output", type_of(&value))
            .with_param("value", value)
            .with_argument_ordering(["output"]),
    )
}

pub fn constant_number(value: f64) -> Node {
    constant(number(value))
}

pub fn constant_bool(value: bool) -> Node {
    constant(value)
}

pub fn constant_string(value: impl Into<String>) -> Node {
    constant(value.into())
}

/// Converts a float to a JSON number, as an integer when it is integral.
pub fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

/// An empty `functional/lambda` node. Its implementation is added as the
/// first child.
pub fn lambda() -> Node {
    versioned(
        Node::atomic(LAMBDA)
            .with_output("fn", "function")
            .with_argument_ordering(["fn"]),
    )
}

pub fn call() -> Node {
    versioned(
        Node::atomic(CALL)
            .with_input("fn", "function")
            .with_output("result", "function:return")
            .with_argument_ordering(["fn", "result"]),
    )
}

/// Binds `value` to the parameter at `parameter_index` of `fn`.
pub fn partial(parameter_index: usize) -> Node {
    versioned(
        Node::atomic(PARTIAL)
            .with_input("fn", "function")
            .with_input("value", "function:arg")
            .with_output("result", "function:partial")
            .with_argument_ordering(["fn", "value", "result"])
            .with_param("partial", parameter_index),
    )
}

pub fn array_first() -> Node {
    versioned(
        Node::atomic("array/first")
            .with_input("array", "[generic]")
            .with_output("value", "generic")
            .with_argument_ordering(["array", "value"]),
    )
}

pub fn logic_not() -> Node {
    versioned(
        Node::atomic(NOT)
            .with_input("input", "bool")
            .with_output("output", "bool")
            .with_argument_ordering(["input", "output"]),
    )
}

pub fn logic_and() -> Node {
    versioned(
        Node::atomic("logic/and")
            .with_input("i1", "bool")
            .with_input("i2", "bool")
            .with_output("and", "bool"),
    )
}

pub fn logic_or() -> Node {
    versioned(
        Node::atomic("logic/or")
            .with_input("i1", "bool")
            .with_input("i2", "bool")
            .with_output("or", "bool"),
    )
}

pub fn mux(ty: &str) -> Node {
    versioned(
        Node::atomic(MUX)
            .with_input("control", "bool")
            .with_input("input1", ty)
            .with_input("input2", ty)
            .with_output("output", ty)
            .with_argument_ordering(["control", "input1", "input2", "output"]),
    )
}
