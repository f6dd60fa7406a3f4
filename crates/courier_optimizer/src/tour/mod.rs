mod held_karp;
mod nearest_neighbor;
mod tour_solver;
mod tour_state;
pub mod travel_matrix;
mod two_opt;

pub use tour_solver::{GraphTour, Tour, TourMethod, TourParams, solve_tour, solve_tour_matrix};
pub use tour_state::TourState;
pub use travel_matrix::TravelMatrix;
