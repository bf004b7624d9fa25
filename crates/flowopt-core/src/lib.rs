pub mod id;
pub mod error;
pub mod port;
pub mod edge;
pub mod node;
pub mod graph;
pub mod document;

// Re-export commonly used types
pub use id::{NodeId, EdgeId};
pub use error::CoreError;
pub use port::{Port, PortDirection, PortList};
pub use edge::Edge;
pub use node::{Node, Settings};
pub use graph::Graph;
pub use document::{GraphDocument, NodeEntry, EdgeEntry};
