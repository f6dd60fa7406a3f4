use courier_graph::{
    GraphError, GraphModel, NodeIdx,
    routing::{ShortestPathTree, Weighting, shortest_paths},
};
use rayon::prelude::*;

/// Dense cost matrix between tour stops.
///
/// Costs are stored row by row, the cost from `i` to `j` lives at `i * size + j`.
#[derive(Debug, Clone)]
pub struct TravelMatrix {
    costs: Vec<f64>,
    size: usize,
    is_symmetric: bool,
}

impl TravelMatrix {
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        let size = rows.len();
        debug_assert!(rows.iter().all(|row| row.len() == size));

        Self::from_flat(rows.into_iter().flatten().collect(), size)
    }

    pub fn from_flat(costs: Vec<f64>, size: usize) -> Self {
        let is_symmetric =
            (0..size).all(|i| (0..i).all(|j| costs[i * size + j] == costs[j * size + i]));

        TravelMatrix {
            costs,
            size,
            is_symmetric,
        }
    }

    #[inline(always)]
    pub fn cost(&self, from: usize, to: usize) -> f64 {
        self.costs[from * self.size + to]
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_symmetric(&self) -> bool {
        self.is_symmetric
    }

    /// Cost of the closed tour visiting `order` and returning to its first stop.
    pub fn tour_cost(&self, order: &[usize]) -> f64 {
        if order.len() < 2 {
            return 0.0;
        }

        order
            .iter()
            .zip(order.iter().cycle().skip(1))
            .map(|(&from, &to)| self.cost(from, to))
            .sum()
    }
}

/// One shortest-path tree per stop and the matrix of their pairwise distances.
pub(crate) struct StopDistances {
    pub matrix: TravelMatrix,
    pub trees: Vec<ShortestPathTree>,
}

pub(crate) fn compute_stop_distances(
    graph: &GraphModel,
    weighting: &impl Weighting,
    stops: &[NodeIdx],
) -> Result<StopDistances, GraphError> {
    let trees = stops
        .par_iter()
        .map(|&stop| shortest_paths(graph, weighting, stop))
        .collect::<Result<Vec<_>, _>>()?;

    let size = stops.len();
    let mut costs = Vec::with_capacity(size * size);
    for (from, tree) in stops.iter().zip(&trees) {
        for to in stops {
            let distance = tree
                .distance(*to)
                .ok_or_else(|| GraphError::UnreachableDestination {
                    from: graph.node_key(*from).clone(),
                    to: graph.node_key(*to).clone(),
                })?;
            costs.push(distance);
        }
    }

    Ok(StopDistances {
        matrix: TravelMatrix::from_flat(costs, size),
        trees,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetry_detection() {
        let symmetric = TravelMatrix::from_rows(vec![vec![0.0, 2.0], vec![2.0, 0.0]]);
        assert!(symmetric.is_symmetric());

        let asymmetric = TravelMatrix::from_rows(vec![vec![0.0, 2.0], vec![3.0, 0.0]]);
        assert!(!asymmetric.is_symmetric());
        assert_eq!(asymmetric.tour_cost(&[0, 1]), 5.0);
        assert_eq!(asymmetric.tour_cost(&[1]), 0.0);
    }
}
