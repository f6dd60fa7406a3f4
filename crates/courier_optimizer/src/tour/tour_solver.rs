use courier_graph::{
    EdgeIdx, GraphError, GraphModel, NodeIdx,
    routing::Weighting,
};
use serde::Serialize;
use tracing::{debug, instrument};

use super::{
    held_karp::solve_exact,
    nearest_neighbor::nearest_neighbor_tour,
    tour_state::TourState,
    travel_matrix::{TravelMatrix, compute_stop_distances},
    two_opt::two_opt,
};

#[derive(Debug, Clone, Copy)]
pub struct TourParams {
    pub exact_tour_cutoff: usize,
    pub two_opt_max_iterations: usize,
}

impl Default for TourParams {
    fn default() -> Self {
        TourParams {
            exact_tour_cutoff: 15,
            two_opt_max_iterations: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TourMethod {
    Exact,
    Heuristic,
}

/// Closed tour over matrix indices, `stops[0]` is the start.
#[derive(Debug, Clone, PartialEq)]
pub struct Tour {
    pub stops: Vec<usize>,
    pub cost: f64,
    pub method: TourMethod,
}

impl Tour {
    /// Stops with the return to the start appended.
    pub fn closed_stops(&self) -> Vec<usize> {
        let mut stops = self.stops.clone();
        stops.extend(self.stops.first().copied().filter(|_| self.stops.len() > 1));
        stops
    }
}

/// Tour over graph nodes, expanded into the underlying shortest paths.
#[derive(Debug, Clone)]
pub struct GraphTour {
    /// Visiting order, closed back onto the start.
    pub stops: Vec<NodeIdx>,
    /// Every node driven through, closed back onto the start.
    pub path: Vec<NodeIdx>,
    pub edges: Vec<EdgeIdx>,
    pub cost: f64,
    pub method: TourMethod,
}

pub fn solve_tour_matrix(matrix: &TravelMatrix, params: &TourParams) -> Tour {
    if matrix.size() <= params.exact_tour_cutoff {
        let state = solve_exact(matrix);
        return Tour {
            cost: state.cost(),
            stops: state.into_order(),
            method: TourMethod::Exact,
        };
    }

    let mut state = TourState::new(nearest_neighbor_tour(matrix), matrix);
    let initial_cost = state.cost();
    let moves = two_opt(&mut state, matrix, params.two_opt_max_iterations);

    debug!(
        stops = matrix.size(),
        initial_cost,
        cost = state.cost(),
        moves,
        "Heuristic tour"
    );

    Tour {
        cost: state.cost(),
        stops: state.into_order(),
        method: TourMethod::Heuristic,
    }
}

/// Closed tour starting and ending at `nodes[0]` that visits every node of `nodes`.
#[instrument(skip_all, level = "debug", fields(stops = nodes.len()))]
pub fn solve_tour(
    graph: &GraphModel,
    weighting: &impl Weighting,
    nodes: &[NodeIdx],
    params: &TourParams,
) -> Result<GraphTour, GraphError> {
    for &node in nodes {
        graph.check_node(node)?;
    }

    let distances = compute_stop_distances(graph, weighting, nodes)?;
    let tour = solve_tour_matrix(&distances.matrix, params);

    let stops: Vec<NodeIdx> = tour.closed_stops().iter().map(|&stop| nodes[stop]).collect();
    let mut path = stops.first().copied().into_iter().collect::<Vec<_>>();
    let mut edges = Vec::new();

    for (&from, &to) in tour.closed_stops().iter().zip(tour.closed_stops().iter().skip(1)) {
        let leg = distances.trees[from]
            .path_to(graph, nodes[to])
            .ok_or_else(|| GraphError::UnreachableDestination {
                from: graph.node_key(nodes[from]).clone(),
                to: graph.node_key(nodes[to]).clone(),
            })?;

        for step in leg.legs() {
            path.push(step.to());
            edges.push(step.edge());
        }
    }

    Ok(GraphTour {
        stops,
        path,
        edges,
        cost: tour.cost,
        method: tour.method,
    })
}
