use std::collections::VecDeque;

use fixedbitset::FixedBitSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::{
    error::GraphError,
    graph::{EdgeIdx, GraphModel},
    node::NodeIdx,
};

use super::flow_network::{FLOW_EPSILON, FlowNetwork};

/// Order in which active nodes are discharged. Both policies compute the same flow
/// value; highest-label usually needs fewer pushes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveNodeSelection {
    Fifo,
    #[default]
    HighestLabel,
}

#[derive(Debug, Clone)]
pub struct MaxFlowResult {
    pub source: NodeIdx,
    pub sink: NodeIdx,
    pub value: f64,
    /// Net flow per graph edge, positive along the edge orientation.
    pub edge_flows: Vec<f64>,
    /// Nodes reachable from the source in the final residual network.
    pub source_side: FixedBitSet,
    /// Edges crossing the minimum cut, ascending.
    pub cut_edges: Vec<EdgeIdx>,
}

impl MaxFlowResult {
    pub fn is_on_source_side(&self, node: NodeIdx) -> bool {
        self.source_side.contains(node.get())
    }

    pub fn is_on_sink_side(&self, node: NodeIdx) -> bool {
        !self.is_on_source_side(node)
    }
}

enum ActiveNodes {
    Fifo(VecDeque<usize>),
    HighestLabel {
        buckets: Vec<Vec<usize>>,
        highest: usize,
    },
}

impl ActiveNodes {
    fn new(selection: ActiveNodeSelection, node_count: usize) -> Self {
        match selection {
            ActiveNodeSelection::Fifo => ActiveNodes::Fifo(VecDeque::with_capacity(node_count)),
            ActiveNodeSelection::HighestLabel => ActiveNodes::HighestLabel {
                buckets: vec![Vec::new(); 2 * node_count + 1],
                highest: 0,
            },
        }
    }

    fn push(&mut self, node: usize, height: usize) {
        match self {
            ActiveNodes::Fifo(queue) => queue.push_back(node),
            ActiveNodes::HighestLabel { buckets, highest } => {
                if height >= buckets.len() {
                    buckets.resize(height + 1, Vec::new());
                }
                buckets[height].push(node);
                *highest = (*highest).max(height);
            }
        }
    }

    fn pop(&mut self) -> Option<usize> {
        match self {
            ActiveNodes::Fifo(queue) => queue.pop_front(),
            ActiveNodes::HighestLabel { buckets, highest } => loop {
                if let Some(node) = buckets[*highest].pop() {
                    return Some(node);
                }
                if *highest == 0 {
                    return None;
                }
                *highest -= 1;
            },
        }
    }
}

/// Mutable preflow of a single max-flow computation, cloned from a [`FlowNetwork`].
pub struct FlowState<'a> {
    network: &'a FlowNetwork,
    source: usize,
    sink: usize,
    height: Vec<usize>,
    excess: Vec<f64>,
    residual: Vec<f64>,
    current_arc: Vec<usize>,
    active: ActiveNodes,
    pushes: usize,
    relabels: usize,
}

impl<'a> FlowState<'a> {
    pub fn new(
        network: &'a FlowNetwork,
        source: NodeIdx,
        sink: NodeIdx,
        selection: ActiveNodeSelection,
    ) -> Self {
        let node_count = network.node_count();
        FlowState {
            network,
            source: source.get(),
            sink: sink.get(),
            height: vec![0; node_count],
            excess: vec![0.0; node_count],
            residual: network.capacities().to_vec(),
            current_arc: vec![0; node_count],
            active: ActiveNodes::new(selection, node_count),
            pushes: 0,
            relabels: 0,
        }
    }

    pub fn height(&self, node: NodeIdx) -> usize {
        self.height[node.get()]
    }

    pub fn excess(&self, node: NodeIdx) -> f64 {
        self.excess[node.get()]
    }

    pub fn residual(&self, arc: usize) -> f64 {
        self.residual[arc]
    }

    fn is_active(&self, node: usize) -> bool {
        node != self.source && node != self.sink && self.excess[node] > FLOW_EPSILON
    }

    fn push(&mut self, from: usize, arc: usize, amount: f64) {
        let to = self.network.head(arc).get();
        let was_active = self.is_active(to);

        self.residual[arc] -= amount;
        self.residual[arc ^ 1] += amount;
        self.excess[from] -= amount;
        self.excess[to] += amount;
        self.pushes += 1;

        if !was_active && self.is_active(to) {
            self.active.push(to, self.height[to]);
        }
    }

    /// Raises `node` just above its lowest residual neighbor. Returns false when the
    /// node has no residual arc at all.
    fn relabel(&mut self, node: usize) -> bool {
        let lowest = self
            .network
            .arcs(NodeIdx::new(node))
            .iter()
            .filter(|&&arc| self.residual[arc] > FLOW_EPSILON)
            .map(|&arc| self.height[self.network.head(arc).get()])
            .min();

        match lowest {
            Some(height) => {
                self.height[node] = height + 1;
                self.relabels += 1;
                true
            }
            None => false,
        }
    }

    fn discharge(&mut self, node: usize) {
        let arcs = self.network.arcs(NodeIdx::new(node));

        while self.excess[node] > FLOW_EPSILON {
            if self.current_arc[node] == arcs.len() {
                if !self.relabel(node) {
                    warn!(node, excess = self.excess[node], "Stranded excess");
                    self.excess[node] = 0.0;
                    return;
                }
                self.current_arc[node] = 0;
                continue;
            }

            let arc = arcs[self.current_arc[node]];
            let head = self.network.head(arc).get();

            if self.residual[arc] > FLOW_EPSILON && self.height[node] == self.height[head] + 1 {
                let amount = self.excess[node].min(self.residual[arc]);
                self.push(node, arc, amount);
            } else {
                self.current_arc[node] += 1;
            }
        }
    }

    /// Runs push/relabel until no active node remains and returns the flow value.
    pub fn run(&mut self) -> f64 {
        let node_count = self.network.node_count();
        self.height[self.source] = node_count;

        let source_arcs = self.network.arcs(NodeIdx::new(self.source));
        for &arc in source_arcs {
            let capacity = self.residual[arc];
            if capacity > FLOW_EPSILON {
                self.push(self.source, arc, capacity);
            }
        }

        while let Some(node) = self.active.pop() {
            if self.is_active(node) {
                self.discharge(node);
            }
        }

        debug!(
            pushes = self.pushes,
            relabels = self.relabels,
            "Push relabel finished"
        );

        self.excess[self.sink]
    }

    /// Nodes reachable from the source through arcs with residual capacity left.
    pub fn source_side(&self) -> FixedBitSet {
        let mut visited = FixedBitSet::with_capacity(self.network.node_count());
        let mut queue = VecDeque::from([self.source]);
        visited.insert(self.source);

        while let Some(node) = queue.pop_front() {
            for &arc in self.network.arcs(NodeIdx::new(node)) {
                let head = self.network.head(arc).get();
                if self.residual[arc] > FLOW_EPSILON && !visited.put(head) {
                    queue.push_back(head);
                }
            }
        }

        visited
    }

    fn into_result(self, value: f64) -> MaxFlowResult {
        let edge_count = self.network.arc_count() / 2;
        let edge_flows = (0..edge_count)
            .map(|edge| {
                let arc = 2 * edge;
                let flow = self.network.capacity(arc) - self.residual[arc];
                if flow.abs() < FLOW_EPSILON { 0.0 } else { flow }
            })
            .collect();

        let source_side = self.source_side();
        let mut cut_edges: Vec<EdgeIdx> = source_side
            .ones()
            .flat_map(|node| self.network.arcs(NodeIdx::new(node)).iter().copied())
            .filter(|&arc| {
                self.network.capacity(arc) > FLOW_EPSILON
                    && !source_side.contains(self.network.head(arc).get())
            })
            .map(FlowNetwork::edge_of)
            .collect();
        cut_edges.sort();
        cut_edges.dedup();

        MaxFlowResult {
            source: NodeIdx::new(self.source),
            sink: NodeIdx::new(self.sink),
            value,
            edge_flows,
            source_side,
            cut_edges,
        }
    }
}

/// Maximum flow from `source` to `sink`. An unreachable sink yields a zero flow.
#[instrument(skip_all, level = "debug", fields(source = %source, sink = %sink))]
pub fn max_flow(
    graph: &GraphModel,
    network: &FlowNetwork,
    source: NodeIdx,
    sink: NodeIdx,
    selection: ActiveNodeSelection,
) -> Result<MaxFlowResult, GraphError> {
    graph.check_node(source)?;
    graph.check_node(sink)?;

    if source == sink {
        return Err(GraphError::InvalidFlowQuery(graph.node_key(source).clone()));
    }

    let mut state = FlowState::new(network, source, sink, selection);
    if !state.source_side().contains(sink.get()) {
        debug!("Sink unreachable from source");
        return Ok(state.into_result(0.0));
    }

    let value = state.run();
    Ok(state.into_result(value))
}
