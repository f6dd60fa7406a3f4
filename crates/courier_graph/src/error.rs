use thiserror::Error;

use crate::node::{NodeIdx, NodeKey};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Node {0} already exists")]
    DuplicateNode(NodeKey),

    #[error("Node {0} not found")]
    NodeNotFound(NodeKey),

    #[error("Node index {0} is out of bounds")]
    UnknownNodeIndex(NodeIdx),

    #[error("Edge {from} -> {to} has invalid weight {weight}")]
    InvalidWeight { from: NodeKey, to: NodeKey, weight: f64 },

    #[error("Edge {from} -> {to} has invalid capacity {capacity}")]
    InvalidCapacity {
        from: NodeKey,
        to: NodeKey,
        capacity: f64,
    },

    #[error("Node {0} has an invalid coordinate")]
    InvalidCoordinate(NodeKey),

    #[error("Destination {to} is unreachable from {from}")]
    UnreachableDestination { from: NodeKey, to: NodeKey },

    #[error("Source and sink are both {0}")]
    InvalidFlowQuery(NodeKey),
}
