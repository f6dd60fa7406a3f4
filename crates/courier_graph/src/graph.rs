use std::collections::VecDeque;

use fixedbitset::FixedBitSet;
use fxhash::FxHashMap;
use tracing::debug;

use crate::{
    define_index_newtype,
    error::GraphError,
    location_index::LocationIndex,
    node::{Coordinate, DistanceMethod, Node, NodeIdx, NodeKey},
};

define_index_newtype!(EdgeIdx, Edge);

#[derive(Debug, Clone)]
pub struct Edge {
    from: NodeIdx,
    to: NodeIdx,
    weight: f64,
    capacity: f64,
    directed: bool,
    /// Travel time in seconds, when known.
    travel_time: Option<f64>,
}

impl Edge {
    pub fn from(&self) -> NodeIdx {
        self.from
    }

    pub fn to(&self) -> NodeIdx {
        self.to
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn travel_time(&self) -> Option<f64> {
        self.travel_time
    }

    /// The endpoint opposite to `node`.
    pub fn adj_node(&self, node: NodeIdx) -> NodeIdx {
        if self.from == node {
            self.to
        } else {
            self.from
        }
    }
}

/// One outgoing step from a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub node: NodeIdx,
    pub weight: f64,
    pub capacity: f64,
    pub edge: EdgeIdx,
}

/// Immutable weighted and capacitated graph.
///
/// Built once per job through [`GraphModelBuilder`] and shared read-only between every
/// solver invocation of that job.
#[derive(Debug)]
pub struct GraphModel {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    adjacency_list: Vec<Vec<EdgeIdx>>,
    keys: FxHashMap<NodeKey, NodeIdx>,
    distance_method: DistanceMethod,
    location_index: Option<LocationIndex>,
}

impl GraphModel {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, node: NodeIdx) -> &Node {
        &self.nodes[node]
    }

    pub fn node_key(&self, node: NodeIdx) -> &NodeKey {
        self.nodes[node].key()
    }

    pub fn edge(&self, edge: EdgeIdx) -> &Edge {
        &self.edges[edge]
    }

    pub fn distance_method(&self) -> DistanceMethod {
        self.distance_method
    }

    pub fn node_index(&self, key: &NodeKey) -> Result<NodeIdx, GraphError> {
        self.keys
            .get(key)
            .copied()
            .ok_or_else(|| GraphError::NodeNotFound(key.clone()))
    }

    pub fn check_node(&self, node: NodeIdx) -> Result<NodeIdx, GraphError> {
        if node.get() < self.nodes.len() {
            Ok(node)
        } else {
            Err(GraphError::UnknownNodeIndex(node))
        }
    }

    /// Outgoing edges of `node`. Undirected edges are visible from both endpoints.
    pub fn neighbors(&self, node: NodeIdx) -> NeighborIter<'_> {
        NeighborIter {
            graph: self,
            node,
            edges: self.adjacency_list[node.get()].iter(),
        }
    }

    /// Nodes reachable from `source` following edge direction.
    pub fn reachable_from(&self, source: NodeIdx) -> FixedBitSet {
        let mut visited = FixedBitSet::with_capacity(self.node_count());
        let mut queue = VecDeque::from([source]);
        visited.insert(source.get());

        while let Some(node) = queue.pop_front() {
            for neighbor in self.neighbors(node) {
                if !visited.put(neighbor.node.get()) {
                    queue.push_back(neighbor.node);
                }
            }
        }

        visited
    }

    /// Breadth-first hop counts from `source`, `None` for unreachable nodes.
    pub fn hop_distances(&self, source: NodeIdx) -> Vec<Option<usize>> {
        let mut hops = vec![None; self.node_count()];
        let mut queue = VecDeque::from([source]);
        hops[source.get()] = Some(0);

        while let Some(node) = queue.pop_front() {
            let next = hops[node.get()].map_or(0, |h| h + 1);
            for neighbor in self.neighbors(node) {
                if hops[neighbor.node.get()].is_none() {
                    hops[neighbor.node.get()] = Some(next);
                    queue.push_back(neighbor.node);
                }
            }
        }

        hops
    }

    /// The closest node carrying a coordinate, if any node has one.
    pub fn nearest_node(&self, coordinate: &Coordinate) -> Option<NodeIdx> {
        self.location_index
            .as_ref()
            .and_then(|index| index.nearest(coordinate))
    }

    pub fn has_coordinates(&self) -> bool {
        self.location_index.is_some()
    }

    pub fn coordinate_distance(&self, from: NodeIdx, to: NodeIdx) -> Option<f64> {
        let from = self.nodes[from].coordinate()?;
        let to = self.nodes[to].coordinate()?;
        Some(from.distance(to, self.distance_method))
    }
}

#[derive(Clone)]
pub struct NeighborIter<'a> {
    graph: &'a GraphModel,
    node: NodeIdx,
    edges: std::slice::Iter<'a, EdgeIdx>,
}

impl Iterator for NeighborIter<'_> {
    type Item = Neighbor;

    fn next(&mut self) -> Option<Self::Item> {
        let edge_id = *self.edges.next()?;
        let edge = &self.graph.edges[edge_id];
        Some(Neighbor {
            node: edge.adj_node(self.node),
            weight: edge.weight,
            capacity: edge.capacity,
            edge: edge_id,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.edges.size_hint()
    }
}

/// Mutable construction phase of a [`GraphModel`].
#[derive(Default)]
pub struct GraphModelBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    keys: FxHashMap<NodeKey, NodeIdx>,
    distance_method: DistanceMethod,
}

impl GraphModelBuilder {
    pub fn new(distance_method: DistanceMethod) -> Self {
        GraphModelBuilder {
            distance_method,
            ..Default::default()
        }
    }

    pub fn add_node(
        &mut self,
        key: impl Into<NodeKey>,
        coordinate: Option<Coordinate>,
    ) -> Result<NodeIdx, GraphError> {
        let key = key.into();
        if self.keys.contains_key(&key) {
            return Err(GraphError::DuplicateNode(key));
        }

        if coordinate.is_some_and(|c| !c.is_finite()) {
            return Err(GraphError::InvalidCoordinate(key));
        }

        let node_id = NodeIdx::new(self.nodes.len());
        self.keys.insert(key.clone(), node_id);
        self.nodes.push(Node::new(key, coordinate));
        Ok(node_id)
    }

    pub fn add_edge(
        &mut self,
        from: impl Into<NodeKey>,
        to: impl Into<NodeKey>,
        weight: f64,
        capacity: f64,
        directed: bool,
    ) -> Result<EdgeIdx, GraphError> {
        let from = from.into();
        let to = to.into();
        let from_id = self.node_index(&from)?;
        let to_id = self.node_index(&to)?;

        if !weight.is_finite() || weight < 0.0 {
            return Err(GraphError::InvalidWeight { from, to, weight });
        }

        if !capacity.is_finite() || capacity < 0.0 {
            return Err(GraphError::InvalidCapacity { from, to, capacity });
        }

        let edge_id = EdgeIdx::new(self.edges.len());
        self.edges.push(Edge {
            from: from_id,
            to: to_id,
            weight,
            capacity,
            directed,
            travel_time: None,
        });

        Ok(edge_id)
    }

    /// Attaches a travel time in seconds to an already added edge.
    pub fn set_travel_time(&mut self, edge: EdgeIdx, seconds: f64) -> Result<(), GraphError> {
        let edge = &mut self.edges[edge.get()];
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(GraphError::InvalidWeight {
                from: self.nodes[edge.from].key().clone(),
                to: self.nodes[edge.to].key().clone(),
                weight: seconds,
            });
        }

        edge.travel_time = Some(seconds);
        Ok(())
    }

    pub fn node_index(&self, key: &NodeKey) -> Result<NodeIdx, GraphError> {
        self.keys
            .get(key)
            .copied()
            .ok_or_else(|| GraphError::NodeNotFound(key.clone()))
    }

    /// Distance between the coordinates of two nodes, used for edges without an
    /// explicit weight. `None` when either node has no coordinate.
    pub fn coordinate_distance(
        &self,
        from: &NodeKey,
        to: &NodeKey,
    ) -> Result<Option<f64>, GraphError> {
        let from = self.nodes[self.node_index(from)?].coordinate();
        let to = self.nodes[self.node_index(to)?].coordinate();

        Ok(from
            .zip(to)
            .map(|(from, to)| from.distance(to, self.distance_method)))
    }

    pub fn build(self) -> GraphModel {
        let mut adjacency_list = vec![Vec::new(); self.nodes.len()];
        for (index, edge) in self.edges.iter().enumerate() {
            let edge_id = EdgeIdx::new(index);
            adjacency_list[edge.from.get()].push(edge_id);
            if !edge.directed && edge.from != edge.to {
                adjacency_list[edge.to.get()].push(edge_id);
            }
        }

        let location_index = LocationIndex::build(&self.nodes, self.distance_method);

        debug!(
            nodes = self.nodes.len(),
            edges = self.edges.len(),
            "Built graph model"
        );

        GraphModel {
            nodes: self.nodes,
            edges: self.edges,
            adjacency_list,
            keys: self.keys,
            distance_method: self.distance_method,
            location_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_graph_utils::test_graph::{create_graph, create_shortest_path_graph};

    #[test]
    fn test_add_duplicate_node() {
        let mut builder = GraphModelBuilder::default();
        builder.add_node("A", None).unwrap();

        let result = builder.add_node("A", None);
        assert_eq!(result, Err(GraphError::DuplicateNode(NodeKey::from("A"))));
    }

    #[test]
    fn test_add_edge_missing_endpoint() {
        let mut builder = GraphModelBuilder::default();
        builder.add_node("A", None).unwrap();

        let result = builder.add_edge("A", "B", 1.0, 1.0, false);
        assert_eq!(result, Err(GraphError::NodeNotFound(NodeKey::from("B"))));
    }

    #[test]
    fn test_add_edge_negative_values() {
        let mut builder = GraphModelBuilder::default();
        builder.add_node(1, None).unwrap();
        builder.add_node(2, None).unwrap();

        assert!(matches!(
            builder.add_edge(1, 2, -1.0, 1.0, true),
            Err(GraphError::InvalidWeight { .. })
        ));
        assert!(matches!(
            builder.add_edge(1, 2, 1.0, -3.0, true),
            Err(GraphError::InvalidCapacity { .. })
        ));
        assert!(matches!(
            builder.add_edge(1, 2, f64::NAN, 1.0, true),
            Err(GraphError::InvalidWeight { .. })
        ));
    }

    #[test]
    fn test_neighbors_directed_and_undirected() {
        let graph = create_graph(
            &[("A", "B", 1.0), ("B", "C", 2.0)],
            &[("C", "A", 5.0)],
        );

        let a = graph.node_index(&"A".into()).unwrap();
        let c = graph.node_index(&"C".into()).unwrap();

        let from_a: Vec<_> = graph.neighbors(a).map(|n| n.node).collect();
        assert_eq!(from_a, vec![graph.node_index(&"B".into()).unwrap()]);

        let from_c: Vec<_> = graph.neighbors(c).map(|n| (n.node, n.weight)).collect();
        assert_eq!(
            from_c,
            vec![(graph.node_index(&"B".into()).unwrap(), 2.0), (a, 5.0)]
        );

        // restartable
        let iter = graph.neighbors(c);
        assert_eq!(iter.clone().count(), 2);
        assert_eq!(iter.count(), 2);
    }

    #[test]
    fn test_reachability_and_hops() {
        let graph = create_graph(&[], &[("A", "B", 1.0), ("B", "C", 1.0), ("D", "A", 1.0)]);
        let a = graph.node_index(&"A".into()).unwrap();

        let reachable = graph.reachable_from(a);
        assert_eq!(reachable.ones().collect::<Vec<_>>(), vec![0, 1, 2]);

        let hops = graph.hop_distances(a);
        assert_eq!(hops, vec![Some(0), Some(1), Some(2), None]);
    }

    #[test]
    fn test_nearest_node() {
        let mut builder = GraphModelBuilder::new(DistanceMethod::Euclidean);
        builder.add_node(0, Some(Coordinate::new(0.0, 0.0))).unwrap();
        builder.add_node(1, Some(Coordinate::new(10.0, 0.0))).unwrap();
        builder.add_node(2, None).unwrap();
        let graph = builder.build();

        assert_eq!(
            graph.nearest_node(&Coordinate::new(7.0, 1.0)),
            Some(NodeIdx::new(1))
        );
        assert_eq!(graph.coordinate_distance(NodeIdx::new(0), NodeIdx::new(1)), Some(10.0));
        assert_eq!(graph.coordinate_distance(NodeIdx::new(0), NodeIdx::new(2)), None);
    }

    #[test]
    fn test_builder_coordinate_distance() {
        let mut builder = GraphModelBuilder::new(DistanceMethod::Euclidean);
        builder.add_node("a", Some(Coordinate::new(0.0, 0.0))).unwrap();
        builder.add_node("b", Some(Coordinate::new(3.0, 4.0))).unwrap();
        builder.add_node("c", None).unwrap();

        assert_eq!(builder.coordinate_distance(&"a".into(), &"b".into()), Ok(Some(5.0)));
        assert_eq!(builder.coordinate_distance(&"a".into(), &"c".into()), Ok(None));
        assert_eq!(
            builder.coordinate_distance(&"a".into(), &"ghost".into()),
            Err(GraphError::NodeNotFound("ghost".into()))
        );
    }

    #[test]
    fn test_graph_without_coordinates_has_no_index() {
        let graph = create_shortest_path_graph();
        assert!(!graph.has_coordinates());
        assert_eq!(graph.nearest_node(&Coordinate::new(0.0, 0.0)), None);
    }
}
