//! Rewrite error types.
//!
//! Non-matches are never errors: matchers return `None`. Everything here is
//! a contract violation raised while editing the graph or evaluating a
//! node, and it propagates unchanged to the caller of the driver.

use flowopt_core::{CoreError, PortDirection};

/// Errors raised by edit primitives, rewriters and rules.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    /// The underlying graph rejected an operation.
    #[error(transparent)]
    Graph(#[from] CoreError),

    /// A bare node was given where a port is needed, but the node has more
    /// than one port of that direction.
    #[error("node '{node}' has {count} {direction} ports, cannot select one automatically")]
    AmbiguousPort {
        node: String,
        direction: PortDirection,
        count: usize,
    },

    /// A bare node was given where a port is needed, but the node has no
    /// port of that direction.
    #[error("node '{node}' has no {direction} port")]
    MissingPort {
        node: String,
        direction: PortDirection,
    },

    /// Static evaluation was requested for a kind without evaluator.
    #[error("no evaluator for node kind '{kind}'")]
    NoEvaluator { kind: String },

    /// Static evaluation received arguments of the wrong shape.
    #[error("cannot evaluate '{kind}': {reason}")]
    Evaluation { kind: String, reason: String },

    /// A rewriter received a match that does not have the expected shape.
    #[error("malformed match: {reason}")]
    MalformedMatch { reason: String },
}

impl RewriteError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        RewriteError::MalformedMatch {
            reason: reason.into(),
        }
    }
}
