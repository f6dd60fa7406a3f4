use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::{error::GraphError, graph::GraphModel, node::NodeIdx};

use super::{
    flow_network::FlowNetwork,
    push_relabel::{ActiveNodeSelection, MaxFlowResult, max_flow},
};

#[derive(Debug, Clone, Copy)]
pub struct MinCutTreeParams {
    pub selection: ActiveNodeSelection,
    /// Number of tree nodes whose max-flow runs are started concurrently.
    pub batch_size: usize,
}

impl Default for MinCutTreeParams {
    fn default() -> Self {
        MinCutTreeParams {
            selection: ActiveNodeSelection::default(),
            batch_size: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MinCutTreeEdge {
    pub node: NodeIdx,
    pub parent: NodeIdx,
    pub weight: f64,
}

/// Flow-equivalent cut tree over the nodes of a graph, edges taken as undirected.
///
/// The minimum cut between any two nodes equals the smallest edge weight on their
/// tree path. Every parent has a lower index than its child.
#[derive(Debug, Clone)]
pub struct MinCutTree {
    parent: Vec<NodeIdx>,
    weight: Vec<f64>,
}

impl MinCutTree {
    pub fn node_count(&self) -> usize {
        self.parent.len()
    }

    /// Tree edges ordered by child node.
    pub fn edges(&self) -> impl Iterator<Item = MinCutTreeEdge> + '_ {
        (1..self.parent.len()).map(|node| MinCutTreeEdge {
            node: NodeIdx::new(node),
            parent: self.parent[node],
            weight: self.weight[node],
        })
    }

    /// Minimum cut value between `u` and `v`, infinite when they are the same node.
    pub fn query(&self, u: NodeIdx, v: NodeIdx) -> Result<f64, GraphError> {
        for node in [u, v] {
            if node.get() >= self.parent.len() {
                return Err(GraphError::UnknownNodeIndex(node));
            }
        }

        let (mut u, mut v) = (u, v);
        let mut min = f64::INFINITY;

        // the larger index is never an ancestor of the smaller one
        while u != v {
            if u > v {
                min = min.min(self.weight[u.get()]);
                u = self.parent[u.get()];
            } else {
                min = min.min(self.weight[v.get()]);
                v = self.parent[v.get()];
            }
        }

        Ok(min)
    }
}

struct TreeBuilder {
    parent: Vec<NodeIdx>,
    weight: Vec<f64>,
}

impl TreeBuilder {
    /// Records the cut between `node` and its parent and moves the later siblings that
    /// fell on the sink side of the cut below `node`.
    fn apply(&mut self, node: usize, cut: &MaxFlowResult) {
        let parent = self.parent[node];
        self.weight[node] = cut.value;

        for sibling in node + 1..self.parent.len() {
            if self.parent[sibling] == parent && !cut.source_side.contains(sibling) {
                self.parent[sibling] = NodeIdx::new(node);
            }
        }
    }
}

/// Builds the tree with n - 1 max-flow computations.
///
/// Runs of consecutive nodes are solved in parallel against the parents known at the
/// start of the run; a node whose parent moved meanwhile is solved again serially, so
/// the result does not depend on the batch size.
#[instrument(skip_all, level = "debug")]
pub fn build_min_cut_tree(
    graph: &GraphModel,
    params: &MinCutTreeParams,
) -> Result<MinCutTree, GraphError> {
    let node_count = graph.node_count();
    let network = FlowNetwork::undirected(graph);
    let batch_size = params.batch_size.max(1);

    let mut builder = TreeBuilder {
        parent: vec![NodeIdx::new(0); node_count],
        weight: vec![0.0; node_count],
    };

    let solve = |node: usize, parent: NodeIdx| {
        max_flow(graph, &network, parent, NodeIdx::new(node), params.selection)
    };

    let mut recomputed = 0;
    let mut start = 1;
    while start < node_count {
        let end = (start + batch_size).min(node_count);
        let snapshot: Vec<NodeIdx> = builder.parent[start..end].to_vec();

        let cuts = (start..end)
            .into_par_iter()
            .map(|node| solve(node, snapshot[node - start]))
            .collect::<Result<Vec<_>, _>>()?;

        for (offset, cut) in cuts.into_iter().enumerate() {
            let node = start + offset;
            if builder.parent[node] == snapshot[offset] {
                builder.apply(node, &cut);
            } else {
                recomputed += 1;
                let cut = solve(node, builder.parent[node])?;
                builder.apply(node, &cut);
            }
        }

        debug!(start, end, "Min cut tree batch done");
        start = end;
    }

    info!(nodes = node_count, recomputed, "Built min cut tree");

    Ok(MinCutTree {
        parent: builder.parent,
        weight: builder.weight,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{
        node::NodeKey,
        test_graph_utils::test_graph::{create_graph, create_min_cut_graph},
    };

    fn idx(graph: &GraphModel, key: &str) -> NodeIdx {
        graph.node_index(&NodeKey::from(key)).unwrap()
    }

    #[test]
    fn test_query_example_network() {
        let graph = create_min_cut_graph();
        let tree = build_min_cut_tree(&graph, &MinCutTreeParams::default()).unwrap();

        // cut {C, F}: B-C and E-F
        let value = tree.query(idx(&graph, "A"), idx(&graph, "F")).unwrap();
        assert_eq!(value, 17.0);
        assert_eq!(tree.edges().count(), graph.node_count() - 1);
    }

    #[test]
    fn test_queries_match_max_flow() {
        let graph = create_min_cut_graph();
        let tree = build_min_cut_tree(&graph, &MinCutTreeParams::default()).unwrap();
        let network = FlowNetwork::undirected(&graph);

        for u in NodeIdx::range(graph.node_count()) {
            for v in NodeIdx::range(graph.node_count()) {
                if u == v {
                    continue;
                }

                let flow = max_flow(&graph, &network, u, v, ActiveNodeSelection::Fifo).unwrap();
                let cut = tree.query(u, v).unwrap();
                assert!((flow.value - cut).abs() < 1e-9, "{u} {v}: {} != {cut}", flow.value);
            }
        }
    }

    #[test]
    fn test_batch_size_does_not_change_tree() {
        let graph = create_min_cut_graph();

        let trees: Vec<Vec<MinCutTreeEdge>> = [1, 2, 3, 100]
            .into_iter()
            .map(|batch_size| {
                let params = MinCutTreeParams {
                    batch_size,
                    ..Default::default()
                };
                build_min_cut_tree(&graph, &params).unwrap().edges().collect()
            })
            .collect();

        for tree in &trees[1..] {
            assert_eq!(tree, &trees[0]);
        }
    }

    #[test]
    fn test_parent_precedes_child() {
        let graph = create_min_cut_graph();
        let tree = build_min_cut_tree(&graph, &MinCutTreeParams::default()).unwrap();

        assert!(tree.edges().all(|edge| edge.parent < edge.node));
    }

    #[test]
    fn test_same_node_and_disconnected_nodes() {
        let graph = create_graph(&[("A", "B", 4.0), ("C", "D", 2.0)], &[]);
        let tree = build_min_cut_tree(&graph, &MinCutTreeParams::default()).unwrap();

        let a = idx(&graph, "A");
        assert_eq!(tree.query(a, a).unwrap(), f64::INFINITY);
        assert_eq!(tree.query(a, idx(&graph, "B")).unwrap(), 4.0);
        assert_eq!(tree.query(a, idx(&graph, "D")).unwrap(), 0.0);
        assert_eq!(
            tree.query(a, NodeIdx::new(9)),
            Err(GraphError::UnknownNodeIndex(NodeIdx::new(9)))
        );
    }

    #[test]
    fn test_directed_edges_are_cut_both_ways() {
        let graph = create_graph(&[], &[("A", "B", 3.0)]);
        let tree = build_min_cut_tree(&graph, &MinCutTreeParams::default()).unwrap();

        assert_eq!(tree.query(idx(&graph, "B"), idx(&graph, "A")).unwrap(), 3.0);
    }

    proptest! {
        #[test]
        fn tree_queries_equal_max_flow(
            edges in prop::collection::vec((0usize..8, 0usize..8, 0u8..10, any::<bool>()), 0..24),
            batch_size in 1usize..5,
        ) {
            let mut builder = crate::graph::GraphModelBuilder::default();
            for node in 0..8 {
                builder.add_node(node as i64, None).unwrap();
            }
            for (from, to, capacity, directed) in edges {
                builder
                    .add_edge(from as i64, to as i64, 1.0, f64::from(capacity), directed)
                    .unwrap();
            }
            let graph = builder.build();

            let params = MinCutTreeParams {
                batch_size,
                ..Default::default()
            };
            let tree = build_min_cut_tree(&graph, &params).unwrap();
            let network = FlowNetwork::undirected(&graph);

            for u in NodeIdx::range(graph.node_count()) {
                for v in NodeIdx::range(graph.node_count()) {
                    if u == v {
                        continue;
                    }

                    let flow = max_flow(&graph, &network, u, v, ActiveNodeSelection::HighestLabel)
                        .unwrap();
                    let cut = tree.query(u, v).unwrap();
                    prop_assert!(
                        (flow.value - cut).abs() < 1e-9,
                        "{u} {v}: {} != {cut}",
                        flow.value
                    );
                }
            }
        }
    }
}
