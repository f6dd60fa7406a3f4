use courier_graph::{ActiveNodeSelection, MinCutTreeParams};
use jiff::SignedDuration;

use crate::tour::TourParams;

/// Largest tour that may be solved exactly, the table holds `2^(n-1) * (n-1)` entries.
pub const MAX_EXACT_TOUR_NODES: usize = 20;

#[derive(Clone, Debug)]
pub struct EngineParams {
    pub threads: Threads,

    /// Tours with at most this many stops, start included, are solved exactly.
    pub exact_tour_cutoff: usize,
    pub two_opt_max_iterations: usize,

    pub flow_selection: ActiveNodeSelection,
    pub min_cut_batch_size: usize,

    /// Speed used for edges without a travel time.
    pub default_speed_kmh: f64,
    /// Capacity of network edges that do not declare one.
    pub default_edge_capacity: f64,
    /// Upper bound for jobs without `max_computation_time`.
    pub default_computation_time: SignedDuration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Threads {
    Single,
    Auto,
    Multi(usize),
}

impl Threads {
    pub fn number_of_threads(&self) -> usize {
        match self {
            Threads::Single => 1,
            Threads::Multi(num) => (*num).max(1),
            Threads::Auto => std::thread::available_parallelism().map_or(1, |n| n.get()),
        }
    }
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            threads: Threads::Auto,
            exact_tour_cutoff: 15,
            two_opt_max_iterations: 1000,
            flow_selection: ActiveNodeSelection::HighestLabel,
            min_cut_batch_size: 8,
            default_speed_kmh: 50.0,
            default_edge_capacity: 1.0,
            default_computation_time: SignedDuration::from_mins(5),
        }
    }
}

impl EngineParams {
    pub fn tour_params(&self) -> TourParams {
        TourParams {
            exact_tour_cutoff: self.exact_tour_cutoff.min(MAX_EXACT_TOUR_NODES),
            two_opt_max_iterations: self.two_opt_max_iterations,
        }
    }

    pub fn min_cut_params(&self) -> MinCutTreeParams {
        MinCutTreeParams {
            selection: self.flow_selection,
            batch_size: self.min_cut_batch_size,
        }
    }
}
