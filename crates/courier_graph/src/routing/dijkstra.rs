use std::{cmp::Ordering, collections::BinaryHeap};

use fixedbitset::FixedBitSet;
use tracing::{debug, instrument};

use crate::{
    error::GraphError,
    graph::{EdgeIdx, GraphModel},
    node::NodeIdx,
};

use super::{
    routing_path::{RoutingPath, RoutingPathLeg},
    weighting::{Weighting, validate_weighting},
};

const UNDISCOVERED: usize = usize::MAX;

#[derive(Copy, Clone, Debug)]
struct HeapItem {
    node: NodeIdx,
    distance: f64,
    discovery: usize,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &HeapItem) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &HeapItem) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Flipped to make a min-heap, earlier discovered nodes win ties
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.discovery.cmp(&self.discovery))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShortestPathEntry {
    pub distance: f64,
    pub predecessor: Option<NodeIdx>,
    /// Edge taken from the predecessor.
    pub edge: Option<EdgeIdx>,
}

/// Finalized distances and predecessors from a single source.
#[derive(Debug, Clone)]
pub struct ShortestPathTree {
    source: NodeIdx,
    entries: Vec<Option<ShortestPathEntry>>,
    settle_order: Vec<NodeIdx>,
}

impl ShortestPathTree {
    pub fn source(&self) -> NodeIdx {
        self.source
    }

    pub fn entry(&self, node: NodeIdx) -> Option<&ShortestPathEntry> {
        self.entries.get(node.get()).and_then(Option::as_ref)
    }

    pub fn distance(&self, node: NodeIdx) -> Option<f64> {
        self.entry(node).map(|entry| entry.distance)
    }

    pub fn predecessor(&self, node: NodeIdx) -> Option<NodeIdx> {
        self.entry(node).and_then(|entry| entry.predecessor)
    }

    pub fn is_reachable(&self, node: NodeIdx) -> bool {
        self.entry(node).is_some()
    }

    /// Nodes in the order they were finalized.
    pub fn settle_order(&self) -> &[NodeIdx] {
        &self.settle_order
    }

    /// Rebuilds the path to `target` by following the predecessor chain.
    pub fn path_to(&self, graph: &GraphModel, target: NodeIdx) -> Option<RoutingPath> {
        let distance = self.distance(target)?;
        let mut legs = Vec::new();
        let mut node = target;

        while let Some(entry) = self.entry(node) {
            let (Some(parent), Some(edge)) = (entry.predecessor, entry.edge) else {
                break;
            };

            let parent_distance = self.distance(parent).unwrap_or(0.0);
            legs.push(RoutingPathLeg::new(
                edge,
                parent,
                node,
                entry.distance - parent_distance,
            ));
            debug_assert!(graph.edge(edge).adj_node(parent) == node);
            node = parent;
        }

        legs.reverse();
        Some(RoutingPath::new(self.source, legs, distance))
    }
}

struct Dijkstra<'a, W: Weighting> {
    graph: &'a GraphModel,
    weighting: &'a W,
    heap: BinaryHeap<HeapItem>,
    best: Vec<f64>,
    discovery: Vec<usize>,
    predecessor: Vec<Option<(NodeIdx, EdgeIdx)>>,
    settled: FixedBitSet,
    settle_order: Vec<NodeIdx>,
    discovered: usize,
}

impl<'a, W: Weighting> Dijkstra<'a, W> {
    fn new(graph: &'a GraphModel, weighting: &'a W) -> Self {
        let node_count = graph.node_count();
        Dijkstra {
            graph,
            weighting,
            heap: BinaryHeap::with_capacity(node_count.min(1024)),
            best: vec![f64::INFINITY; node_count],
            discovery: vec![UNDISCOVERED; node_count],
            predecessor: vec![None; node_count],
            settled: FixedBitSet::with_capacity(node_count),
            settle_order: Vec::with_capacity(node_count),
            discovered: 0,
        }
    }

    fn discover(&mut self, node: NodeIdx) -> usize {
        if self.discovery[node.get()] == UNDISCOVERED {
            self.discovery[node.get()] = self.discovered;
            self.discovered += 1;
        }
        self.discovery[node.get()]
    }

    fn run(&mut self, source: NodeIdx, target: Option<NodeIdx>) {
        self.best[source.get()] = 0.0;
        let discovery = self.discover(source);
        self.heap.push(HeapItem {
            node: source,
            distance: 0.0,
            discovery,
        });

        let mut stale = 0;

        while let Some(HeapItem { node, distance, .. }) = self.heap.pop() {
            // Already finalized or superseded by a shorter tentative distance
            if self.settled.contains(node.get()) || distance > self.best[node.get()] {
                stale += 1;
                continue;
            }

            self.settled.insert(node.get());
            self.settle_order.push(node);

            if Some(node) == target {
                break;
            }

            for neighbor in self.graph.neighbors(node) {
                if self.settled.contains(neighbor.node.get()) {
                    continue;
                }

                let edge_weight = self.weighting.edge_weight(self.graph.edge(neighbor.edge));
                let next_distance = distance + edge_weight;

                if next_distance < self.best[neighbor.node.get()] {
                    self.best[neighbor.node.get()] = next_distance;
                    self.predecessor[neighbor.node.get()] = Some((node, neighbor.edge));
                    let discovery = self.discover(neighbor.node);
                    self.heap.push(HeapItem {
                        node: neighbor.node,
                        distance: next_distance,
                        discovery,
                    });
                }
            }
        }

        debug!(
            settled = self.settle_order.len(),
            stale, "Dijkstra finished"
        );
    }

    fn into_tree(self, source: NodeIdx) -> ShortestPathTree {
        let mut entries = vec![None; self.graph.node_count()];
        for &node in &self.settle_order {
            let predecessor = self.predecessor[node.get()];
            entries[node.get()] = Some(ShortestPathEntry {
                distance: self.best[node.get()],
                predecessor: predecessor.map(|(parent, _)| parent),
                edge: predecessor.map(|(_, edge)| edge),
            });
        }

        ShortestPathTree {
            source,
            entries,
            settle_order: self.settle_order,
        }
    }
}

/// Single-source shortest distances to every reachable node.
#[instrument(skip_all, level = "debug", fields(source = %source))]
pub fn shortest_paths(
    graph: &GraphModel,
    weighting: &impl Weighting,
    source: NodeIdx,
) -> Result<ShortestPathTree, GraphError> {
    graph.check_node(source)?;
    validate_weighting(graph, weighting)?;

    let mut dijkstra = Dijkstra::new(graph, weighting);
    dijkstra.run(source, None);
    Ok(dijkstra.into_tree(source))
}

/// Shortest path between two nodes, the search stops as soon as `target` is final.
#[instrument(skip_all, level = "debug", fields(source = %source, target = %target))]
pub fn shortest_path(
    graph: &GraphModel,
    weighting: &impl Weighting,
    source: NodeIdx,
    target: NodeIdx,
) -> Result<RoutingPath, GraphError> {
    graph.check_node(source)?;
    graph.check_node(target)?;
    validate_weighting(graph, weighting)?;

    let mut dijkstra = Dijkstra::new(graph, weighting);
    dijkstra.run(source, Some(target));

    dijkstra
        .into_tree(source)
        .path_to(graph, target)
        .ok_or_else(|| GraphError::UnreachableDestination {
            from: graph.node_key(source).clone(),
            to: graph.node_key(target).clone(),
        })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{
        graph::Edge,
        node::NodeKey,
        routing::weighting::{DistanceWeighting, TravelTimeWeighting},
        test_graph_utils::test_graph::{create_graph, create_shortest_path_graph, key_path},
    };

    fn idx(graph: &GraphModel, key: &str) -> NodeIdx {
        graph.node_index(&NodeKey::from(key)).unwrap()
    }

    #[test]
    fn test_shortest_path_a_to_e() {
        let graph = create_shortest_path_graph();

        let path = shortest_path(&graph, &DistanceWeighting, idx(&graph, "A"), idx(&graph, "E"))
            .unwrap();

        assert_eq!(path.distance(), 10.0);
        assert_eq!(key_path(&graph, &path.nodes()), vec!["A", "C", "D", "E"]);
        assert_eq!(
            path.legs().iter().map(|leg| leg.weight()).collect::<Vec<_>>(),
            vec![5.0, 3.0, 2.0]
        );
    }

    #[test]
    fn test_shortest_paths_all_distances() {
        let graph = create_shortest_path_graph();
        let tree = shortest_paths(&graph, &DistanceWeighting, idx(&graph, "A")).unwrap();

        assert_eq!(tree.distance(idx(&graph, "A")), Some(0.0));
        assert_eq!(tree.distance(idx(&graph, "C")), Some(5.0));
        assert_eq!(tree.distance(idx(&graph, "D")), Some(8.0));
        assert_eq!(tree.distance(idx(&graph, "B")), Some(9.0));
        assert_eq!(tree.distance(idx(&graph, "E")), Some(10.0));
        assert_eq!(tree.predecessor(idx(&graph, "B")), Some(idx(&graph, "D")));
        assert_eq!(tree.predecessor(idx(&graph, "A")), None);
    }

    #[test]
    fn test_unreachable_destination() {
        let graph = create_graph(&[("A", "B", 1.0)], &[("C", "A", 1.0)]);

        let result = shortest_path(&graph, &DistanceWeighting, idx(&graph, "A"), idx(&graph, "C"));
        assert_eq!(
            result,
            Err(GraphError::UnreachableDestination {
                from: "A".into(),
                to: "C".into()
            })
        );

        let tree = shortest_paths(&graph, &DistanceWeighting, idx(&graph, "A")).unwrap();
        assert!(!tree.is_reachable(idx(&graph, "C")));
    }

    #[test]
    fn test_negative_weighting_is_rejected_upfront() {
        let graph = create_shortest_path_graph();
        let penalised = |edge: &Edge| edge.weight() - 4.0;

        let result = shortest_paths(&graph, &penalised, idx(&graph, "A"));
        assert!(matches!(result, Err(GraphError::InvalidWeight { .. })));
    }

    #[test]
    fn test_equal_distances_settle_in_discovery_order() {
        // B and C are both at distance 1, B is discovered first
        let graph = create_graph(
            &[("A", "B", 1.0), ("A", "C", 1.0), ("B", "D", 1.0), ("C", "D", 1.0)],
            &[],
        );
        let tree = shortest_paths(&graph, &DistanceWeighting, idx(&graph, "A")).unwrap();

        assert_eq!(
            key_path(&graph, tree.settle_order()),
            vec!["A", "B", "C", "D"]
        );
        assert_eq!(tree.predecessor(idx(&graph, "D")), Some(idx(&graph, "B")));
    }

    #[test]
    fn test_travel_time_weighting() {
        let mut builder = crate::graph::GraphModelBuilder::default();
        builder.add_node(1, None).unwrap();
        builder.add_node(2, None).unwrap();
        builder.add_node(3, None).unwrap();
        // 1km at 36km/h is 100s
        builder.add_edge(1, 2, 1000.0, 1.0, false).unwrap();
        let slow = builder.add_edge(2, 3, 100.0, 1.0, false).unwrap();
        builder.set_travel_time(slow, 400.0).unwrap();
        let graph = builder.build();

        let weighting = TravelTimeWeighting::new(36.0);
        let tree = shortest_paths(&graph, &weighting, NodeIdx::new(0)).unwrap();
        assert!((tree.distance(NodeIdx::new(1)).unwrap() - 100.0).abs() < 1e-9);
        assert!((tree.distance(NodeIdx::new(2)).unwrap() - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_source_index() {
        let graph = create_shortest_path_graph();
        let result = shortest_paths(&graph, &DistanceWeighting, NodeIdx::new(99));
        assert_eq!(result.unwrap_err(), GraphError::UnknownNodeIndex(NodeIdx::new(99)));
    }

    proptest! {
        #[test]
        fn settle_order_is_monotonic(
            edges in prop::collection::vec((0usize..12, 0usize..12, 0.0f64..100.0), 1..60),
            directed in any::<bool>(),
        ) {
            let mut builder = crate::graph::GraphModelBuilder::default();
            for node in 0..12 {
                builder.add_node(node as i64, None).unwrap();
            }
            for (from, to, weight) in edges {
                builder.add_edge(from as i64, to as i64, weight, 1.0, directed).unwrap();
            }
            let graph = builder.build();

            let tree = shortest_paths(&graph, &DistanceWeighting, NodeIdx::new(0)).unwrap();
            let distances: Vec<f64> = tree
                .settle_order()
                .iter()
                .map(|&node| tree.distance(node).unwrap())
                .collect();

            prop_assert!(distances.windows(2).all(|w| w[0] <= w[1]));

            for &node in tree.settle_order() {
                if let Some(parent) = tree.predecessor(node) {
                    prop_assert!(tree.distance(parent).unwrap() <= tree.distance(node).unwrap());
                }
            }
        }
    }
}
