use rstar::{RTree, primitives::GeomWithData};

use crate::node::{Coordinate, DistanceMethod, Node, NodeIdx};

type LocationIndexObject = GeomWithData<[f64; 2], NodeIdx>;

/// Nearest-node lookup over the nodes that carry a coordinate.
///
/// Geographic coordinates are projected onto an equirectangular plane centred on the
/// mean latitude, which preserves nearest-neighbor order at city scale.
#[derive(Debug)]
pub struct LocationIndex {
    tree: RTree<LocationIndexObject>,
    longitude_scale: f64,
}

impl LocationIndex {
    pub fn build(nodes: &[Node], distance_method: DistanceMethod) -> Option<LocationIndex> {
        let located: Vec<(NodeIdx, &Coordinate)> = NodeIdx::range(nodes.len())
            .filter_map(|id| nodes[id].coordinate().map(|c| (id, c)))
            .collect();

        if located.is_empty() {
            return None;
        }

        let longitude_scale = match distance_method {
            DistanceMethod::Haversine => {
                let mean_latitude =
                    located.iter().map(|(_, c)| c.y()).sum::<f64>() / located.len() as f64;
                mean_latitude.to_radians().cos()
            }
            DistanceMethod::Euclidean => 1.0,
        };

        let tree = RTree::bulk_load(
            located
                .into_iter()
                .map(|(id, c)| LocationIndexObject::new([c.x() * longitude_scale, c.y()], id))
                .collect(),
        );

        Some(LocationIndex {
            tree,
            longitude_scale,
        })
    }

    pub fn nearest(&self, coordinate: &Coordinate) -> Option<NodeIdx> {
        self.tree
            .nearest_neighbor(&[coordinate.x() * self.longitude_scale, coordinate.y()])
            .map(|object| object.data)
    }
}
