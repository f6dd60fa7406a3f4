use fixedbitset::FixedBitSet;

use super::travel_matrix::TravelMatrix;

/// Greedy tour from stop 0, always moving to the cheapest unvisited stop. Ties go to
/// the lowest stop index.
pub(crate) fn nearest_neighbor_tour(matrix: &TravelMatrix) -> Vec<usize> {
    let size = matrix.size();
    if size == 0 {
        return Vec::new();
    }

    let mut visited = FixedBitSet::with_capacity(size);
    let mut order = Vec::with_capacity(size);
    let mut current = 0;
    visited.insert(current);
    order.push(current);

    while order.len() < size {
        let mut best: Option<(usize, f64)> = None;
        for candidate in visited.zeroes() {
            let cost = matrix.cost(current, candidate);
            if best.is_none_or(|(_, best_cost)| cost < best_cost) {
                best = Some((candidate, cost));
            }
        }

        let Some((next, _)) = best else {
            break;
        };

        visited.insert(next);
        order.push(next);
        current = next;
    }

    order
}
