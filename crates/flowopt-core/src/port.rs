//! Port references.
//!
//! A port is not a standalone entity: it is a `(node, name)` pair whose type
//! lives in the owning node's port map. Input and output port names of one
//! node are disjoint, so the name alone determines the direction.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::id::NodeId;

/// A named attachment point on a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Port {
    pub node: NodeId,
    pub port: String,
}

impl Port {
    pub fn new(node: NodeId, port: impl Into<String>) -> Self {
        Port {
            node,
            port: port.into(),
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.node, self.port)
    }
}

/// Producer/consumer lists. Most ports have a single peer.
pub type PortList = SmallVec<[Port; 2]>;

/// Which side of a node a port sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => write!(f, "input"),
            PortDirection::Output => write!(f, "output"),
        }
    }
}
