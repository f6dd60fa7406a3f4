use crate::{graph::EdgeIdx, node::NodeIdx};

#[derive(Debug, Clone, PartialEq)]
pub struct RoutingPathLeg {
    edge: EdgeIdx,
    from: NodeIdx,
    to: NodeIdx,
    weight: f64,
}

impl RoutingPathLeg {
    pub fn new(edge: EdgeIdx, from: NodeIdx, to: NodeIdx, weight: f64) -> RoutingPathLeg {
        RoutingPathLeg {
            edge,
            from,
            to,
            weight,
        }
    }

    pub fn edge(&self) -> EdgeIdx {
        self.edge
    }

    pub fn from(&self) -> NodeIdx {
        self.from
    }

    pub fn to(&self) -> NodeIdx {
        self.to
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }
}

/// A source to target walk through the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingPath {
    start: NodeIdx,
    legs: Vec<RoutingPathLeg>,
    distance: f64,
}

impl RoutingPath {
    pub fn new(start: NodeIdx, legs: Vec<RoutingPathLeg>, distance: f64) -> RoutingPath {
        RoutingPath {
            start,
            legs,
            distance,
        }
    }

    pub fn legs(&self) -> &[RoutingPathLeg] {
        &self.legs
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn start(&self) -> NodeIdx {
        self.start
    }

    pub fn end(&self) -> NodeIdx {
        self.legs.last().map_or(self.start, |leg| leg.to)
    }

    pub fn nodes(&self) -> Vec<NodeIdx> {
        std::iter::once(self.start)
            .chain(self.legs.iter().map(|leg| leg.to))
            .collect()
    }
}
