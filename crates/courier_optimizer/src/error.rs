use courier_graph::{GraphError, NodeKey};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Edge {from} -> {to} has no weight and its endpoints have no coordinates")]
    MissingEdgeWeight { from: NodeKey, to: NodeKey },

    #[error("Destination {0} has coordinates but the network has none to snap to")]
    MissingCoordinates(usize),

    #[error("Failed to create worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
