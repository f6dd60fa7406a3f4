pub mod flow_network;
pub mod min_cut_tree;
pub mod push_relabel;

pub use flow_network::{FLOW_EPSILON, FlowNetwork};
pub use min_cut_tree::{MinCutTree, MinCutTreeEdge, MinCutTreeParams, build_min_cut_tree};
pub use push_relabel::{ActiveNodeSelection, FlowState, MaxFlowResult, max_flow};
