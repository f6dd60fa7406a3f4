use crate::{
    graph::{EdgeIdx, GraphModel},
    node::NodeIdx,
};

/// Residual capacities smaller than this are treated as saturated.
pub const FLOW_EPSILON: f64 = 1e-9;

/// Arc structure derived from a [`GraphModel`], shared read-only by every max-flow
/// computation of a job.
///
/// Every graph edge `e` owns the arc pair `2e` (from -> to) and `2e + 1` (to -> from);
/// the reverse of arc `a` is `a ^ 1`. Self-loops keep their arc pair but are never
/// attached to a node.
#[derive(Debug, Clone)]
pub struct FlowNetwork {
    node_count: usize,
    arc_head: Vec<NodeIdx>,
    arc_capacity: Vec<f64>,
    node_arcs: Vec<Vec<usize>>,
}

impl FlowNetwork {
    /// Directed edges only carry flow forward, undirected edges both ways.
    pub fn directed(graph: &GraphModel) -> Self {
        Self::build(graph, |directed| directed)
    }

    /// Every edge carries flow in both directions, as required by min-cut analysis.
    pub fn undirected(graph: &GraphModel) -> Self {
        Self::build(graph, |_| false)
    }

    fn build(graph: &GraphModel, one_way: impl Fn(bool) -> bool) -> Self {
        let node_count = graph.node_count();
        let mut arc_head = Vec::with_capacity(graph.edge_count() * 2);
        let mut arc_capacity = Vec::with_capacity(graph.edge_count() * 2);
        let mut node_arcs = vec![Vec::new(); node_count];

        for edge in graph.edges() {
            let forward = arc_head.len();
            let backward_capacity = if one_way(edge.is_directed()) {
                0.0
            } else {
                edge.capacity()
            };

            arc_head.push(edge.to());
            arc_capacity.push(edge.capacity());
            arc_head.push(edge.from());
            arc_capacity.push(backward_capacity);

            if edge.from() != edge.to() {
                node_arcs[edge.from().get()].push(forward);
                node_arcs[edge.to().get()].push(forward + 1);
            }
        }

        FlowNetwork {
            node_count,
            arc_head,
            arc_capacity,
            node_arcs,
        }
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn arc_count(&self) -> usize {
        self.arc_head.len()
    }

    #[inline(always)]
    pub fn head(&self, arc: usize) -> NodeIdx {
        self.arc_head[arc]
    }

    #[inline(always)]
    pub fn capacity(&self, arc: usize) -> f64 {
        self.arc_capacity[arc]
    }

    pub(crate) fn capacities(&self) -> &[f64] {
        &self.arc_capacity
    }

    #[inline(always)]
    pub fn arcs(&self, node: NodeIdx) -> &[usize] {
        &self.node_arcs[node.get()]
    }

    #[inline(always)]
    pub fn edge_of(arc: usize) -> EdgeIdx {
        EdgeIdx::new(arc / 2)
    }

    #[inline(always)]
    pub fn is_forward(arc: usize) -> bool {
        arc % 2 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_graph_utils::test_graph::create_graph;

    #[test]
    fn test_arc_pairs() {
        let graph = create_graph(&[("A", "B", 4.0)], &[("B", "C", 2.0)]);

        let directed = FlowNetwork::directed(&graph);
        assert_eq!(directed.arc_count(), 4);
        assert_eq!(directed.capacities(), &[4.0, 4.0, 2.0, 0.0]);
        assert_eq!(directed.arcs(NodeIdx::new(1)), &[1, 2]);
        assert_eq!(directed.head(3), NodeIdx::new(1));
        assert_eq!(FlowNetwork::edge_of(3), EdgeIdx::new(1));

        let undirected = FlowNetwork::undirected(&graph);
        assert_eq!(undirected.capacities(), &[4.0, 4.0, 2.0, 2.0]);
    }
}
