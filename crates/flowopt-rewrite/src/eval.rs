//! Static evaluation of node kinds over literal arguments.
//!
//! Constant-folding rules call [`evaluate`] with the literals bound to the
//! node's inputs, in argument order. Kinds without an entry in the
//! registry are a contract violation ([`RewriteError::NoEvaluator`]).

use serde_json::Value;

use crate::error::RewriteError;
use crate::nodes::number;

type Evaluator = fn(&str, &[Value]) -> Result<Value, RewriteError>;

const EVALUATORS: &[(&str, Evaluator)] = &[
    ("math/add", add),
    ("math/multiply", multiply),
    ("logic/and", and),
    ("logic/or", or),
    ("logic/not", not),
    ("translator/number_to_string", number_to_string),
];

fn add(kind: &str, args: &[Value]) -> Result<Value, RewriteError> {
    fold_numbers(kind, args, 0.0, |a, b| a + b)
}

fn multiply(kind: &str, args: &[Value]) -> Result<Value, RewriteError> {
    fold_numbers(kind, args, 1.0, |a, b| a * b)
}

fn and(_: &str, args: &[Value]) -> Result<Value, RewriteError> {
    Ok(Value::Bool(args.iter().all(truthy)))
}

fn or(_: &str, args: &[Value]) -> Result<Value, RewriteError> {
    Ok(Value::Bool(args.iter().any(truthy)))
}

fn not(kind: &str, args: &[Value]) -> Result<Value, RewriteError> {
    match args {
        [value] => Ok(Value::Bool(!truthy(value))),
        _ => Err(arity(kind, 1, args.len())),
    }
}

fn number_to_string(kind: &str, args: &[Value]) -> Result<Value, RewriteError> {
    match args {
        [Value::String(s)] => Ok(Value::String(s.clone())),
        [value] => Ok(Value::String(to_display(value))),
        _ => Err(arity(kind, 1, args.len())),
    }
}

/// Returns `true` if `kind` can be evaluated statically.
pub fn has_evaluator(kind: &str) -> bool {
    EVALUATORS.iter().any(|(k, _)| *k == kind)
}

/// Evaluates `kind` applied to `args`.
pub fn evaluate(kind: &str, args: &[Value]) -> Result<Value, RewriteError> {
    let (_, evaluator) = EVALUATORS
        .iter()
        .find(|(k, _)| *k == kind)
        .ok_or_else(|| RewriteError::NoEvaluator {
            kind: kind.to_string(),
        })?;
    evaluator(kind, args)
}

/// Truthiness of a literal, as used by `logic/mux` controls.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn fold_numbers(kind: &str, args: &[Value], init: f64, op: fn(f64, f64) -> f64) -> Result<Value, RewriteError> {
    let mut acc = init;
    for arg in args {
        let n = arg.as_f64().ok_or_else(|| RewriteError::Evaluation {
            kind: kind.to_string(),
            reason: format!("expected a number, got {}", arg),
        })?;
        acc = op(acc, n);
    }
    Ok(number(acc))
}

fn to_display(value: &Value) -> String {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn arity(kind: &str, expected: usize, got: usize) -> RewriteError {
    RewriteError::Evaluation {
        kind: kind.to_string(),
        reason: format!("expected {} argument(s), got {}", expected, got),
    }
}
