use crate::{error::GraphError, graph::Edge, graph::GraphModel};

/// Turns an edge into the cost minimised by shortest-path and tour searches.
pub trait Weighting: Sync {
    fn edge_weight(&self, edge: &Edge) -> f64;
}

/// Uses the edge weight as is.
#[derive(Debug, Default, Clone, Copy)]
pub struct DistanceWeighting;

impl Weighting for DistanceWeighting {
    #[inline(always)]
    fn edge_weight(&self, edge: &Edge) -> f64 {
        edge.weight()
    }
}

/// Travel time in seconds. Edges without a recorded travel time are driven at
/// `default_speed_kmh`, their weight being read as meters.
#[derive(Debug, Clone, Copy)]
pub struct TravelTimeWeighting {
    default_speed_kmh: f64,
}

impl TravelTimeWeighting {
    pub fn new(default_speed_kmh: f64) -> Self {
        TravelTimeWeighting { default_speed_kmh }
    }
}

impl Default for TravelTimeWeighting {
    fn default() -> Self {
        TravelTimeWeighting::new(50.0)
    }
}

impl Weighting for TravelTimeWeighting {
    fn edge_weight(&self, edge: &Edge) -> f64 {
        match edge.travel_time() {
            Some(seconds) => seconds,
            None => {
                let speed_meters_per_second = self.default_speed_kmh / 3.6;
                edge.weight() / speed_meters_per_second
            }
        }
    }
}

impl<F> Weighting for F
where
    F: Fn(&Edge) -> f64 + Sync,
{
    fn edge_weight(&self, edge: &Edge) -> f64 {
        self(edge)
    }
}

/// Rejects weightings producing negative or non-finite values on any edge.
pub fn validate_weighting(
    graph: &GraphModel,
    weighting: &impl Weighting,
) -> Result<(), GraphError> {
    for edge in graph.edges() {
        let weight = weighting.edge_weight(edge);
        if !weight.is_finite() || weight < 0.0 {
            return Err(GraphError::InvalidWeight {
                from: graph.node_key(edge.from()).clone(),
                to: graph.node_key(edge.to()).clone(),
                weight,
            });
        }
    }

    Ok(())
}
