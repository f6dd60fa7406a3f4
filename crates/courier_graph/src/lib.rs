pub mod error;
pub mod flow;
pub mod graph;
pub mod location_index;
pub mod node;
pub mod routing;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_graph_utils;

pub use error::GraphError;
pub use flow::{
    ActiveNodeSelection, FlowNetwork, MaxFlowResult, MinCutTree, MinCutTreeEdge, MinCutTreeParams,
    build_min_cut_tree, max_flow,
};
pub use graph::{Edge, EdgeIdx, GraphModel, GraphModelBuilder, Neighbor};
pub use node::{Coordinate, DistanceMethod, Node, NodeIdx, NodeKey};
