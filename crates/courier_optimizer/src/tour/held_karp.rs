use super::{tour_state::TourState, travel_matrix::TravelMatrix};

const NO_PREDECESSOR: usize = usize::MAX;

#[derive(Clone, Copy)]
struct TableEntry {
    cost: f64,
    predecessor: usize,
}

/// Exact closed tour starting at stop 0.
///
/// The table is keyed by the set of visited stops (stop 0 excluded, bit `k` standing for
/// stop `k + 1`) and the last visited stop. Table ties keep the first path found; ties
/// between final stops keep the lexicographically smallest reconstructed order.
pub(crate) fn solve_exact(matrix: &TravelMatrix) -> TourState {
    let size = matrix.size();
    if size <= 2 {
        return TourState::new((0..size).collect(), matrix);
    }

    let others = size - 1;
    let full = (1usize << others) - 1;
    let empty = TableEntry {
        cost: f64::INFINITY,
        predecessor: NO_PREDECESSOR,
    };
    let mut table = vec![empty; (full + 1) * others];
    let slot = |subset: usize, last: usize| subset * others + last;

    for last in 0..others {
        table[slot(1 << last, last)] = TableEntry {
            cost: matrix.cost(0, last + 1),
            predecessor: NO_PREDECESSOR,
        };
    }

    // subsets only grow, so ascending order visits every subset after its parts
    for subset in 1..=full {
        for last in 0..others {
            if subset & (1 << last) == 0 {
                continue;
            }

            let current = table[slot(subset, last)].cost;
            if !current.is_finite() {
                continue;
            }

            for next in 0..others {
                if subset & (1 << next) != 0 {
                    continue;
                }

                let extended = subset | (1 << next);
                let cost = current + matrix.cost(last + 1, next + 1);
                let entry = &mut table[slot(extended, next)];
                if cost < entry.cost {
                    *entry = TableEntry {
                        cost,
                        predecessor: last,
                    };
                }
            }
        }
    }

    let best_cost = (0..others)
        .map(|last| table[slot(full, last)].cost + matrix.cost(last + 1, 0))
        .fold(f64::INFINITY, f64::min);

    // a symmetric matrix always ties with the reversed tour
    let order = (0..others)
        .filter(|&last| table[slot(full, last)].cost + matrix.cost(last + 1, 0) == best_cost)
        .map(|last| {
            let mut order = Vec::with_capacity(size);
            let mut subset = full;
            let mut node = last;
            while node != NO_PREDECESSOR {
                order.push(node + 1);
                let predecessor = table[slot(subset, node)].predecessor;
                subset &= !(1 << node);
                node = predecessor;
            }
            order.push(0);
            order.reverse();
            order
        })
        .min()
        .unwrap_or_else(|| (0..size).collect());

    TourState::new(order, matrix)
}
