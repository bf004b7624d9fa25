//! Core error types for flowopt-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of the graph model. Every variant is a contract violation:
//! the caller asked for a node, port or edge that does not exist, or for a
//! change that would break a structural invariant.

use crate::id::{EdgeId, NodeId};
use thiserror::Error;

/// Core errors produced by the flowopt-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A node id was not found in the graph.
    #[error("node not found: NodeId({id})", id = id.0)]
    NodeNotFound { id: NodeId },

    /// A node label was not found in the graph.
    #[error("node not found: '{label}'")]
    LabelNotFound { label: String },

    /// An edge id was not found in the graph.
    #[error("edge not found: EdgeId({id})", id = id.0)]
    EdgeNotFound { id: EdgeId },

    /// A port is not declared on its node.
    #[error("port '{port}' not found on node '{node}'")]
    PortNotFound { node: String, port: String },

    /// A port name is already declared on the node (in either direction).
    #[error("port '{port}' already exists on node '{node}'")]
    DuplicatePort { node: String, port: String },

    /// Re-parenting would make a node its own ancestor.
    #[error("cannot move '{child}' into '{parent}': would create a hierarchy cycle")]
    HierarchyCycle { child: String, parent: String },

    /// A node with nested children cannot be removed on its own.
    #[error("node '{node}' still has {count} child node(s)")]
    HasChildren { node: String, count: usize },

    /// An edge failed validation.
    #[error("invalid edge: {reason}")]
    InvalidEdge { reason: String },

    /// A serialized graph document is malformed.
    #[error("invalid graph document: {reason}")]
    InvalidDocument { reason: String },

    /// A structural invariant was violated.
    #[error("graph inconsistency: {reason}")]
    GraphInconsistency { reason: String },
}
