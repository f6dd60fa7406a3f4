use super::{tour_state::TourState, travel_matrix::TravelMatrix};

const MIN_IMPROVEMENT: f64 = 1e-9;

/// Cost change of reversing `order[from..=to]` in the closed tour.
///
/// ```text
/// BEFORE:  (prev) -> [from] -> ... -> [to] -> (next)
/// AFTER:   (prev) -> [to] -> ... -> [from] -> (next)
/// ```
fn reversal_delta(matrix: &TravelMatrix, order: &[usize], from: usize, to: usize) -> f64 {
    let prev = order[from - 1];
    let next = order[(to + 1) % order.len()];
    let (first, last) = (order[from], order[to]);

    let mut delta = matrix.cost(prev, last) + matrix.cost(first, next)
        - matrix.cost(prev, first)
        - matrix.cost(last, next);

    if !matrix.is_symmetric() {
        // inner arcs are travelled backwards
        for window in order[from..=to].windows(2) {
            delta += matrix.cost(window[1], window[0]) - matrix.cost(window[0], window[1]);
        }
    }

    delta
}

/// Best-improvement 2-opt. Each pass applies the single most improving reversal; the
/// search stops at a local optimum or after `max_iterations` passes. Returns the
/// number of applied moves.
pub(crate) fn two_opt(
    state: &mut TourState,
    matrix: &TravelMatrix,
    max_iterations: usize,
) -> usize {
    let size = state.len();
    let mut moves = 0;

    // the start stays in place
    if size < 3 {
        return moves;
    }

    while moves < max_iterations {
        let mut best: Option<(usize, usize, f64)> = None;

        for from in 1..size - 1 {
            for to in from + 1..size {
                let delta = reversal_delta(matrix, state.order(), from, to);
                let improves = best.is_none_or(|(_, _, best_delta)| delta < best_delta);
                if delta < -MIN_IMPROVEMENT && improves {
                    best = Some((from, to, delta));
                }
            }
        }

        let Some((from, to, _)) = best else {
            break;
        };

        state.reverse(from, to, matrix);
        moves += 1;
    }

    moves
}
