pub mod dijkstra;
pub mod routing_path;
pub mod weighting;

pub use dijkstra::{ShortestPathEntry, ShortestPathTree, shortest_path, shortest_paths};
pub use routing_path::{RoutingPath, RoutingPathLeg};
pub use weighting::{DistanceWeighting, TravelTimeWeighting, Weighting};
