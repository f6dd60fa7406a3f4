use super::travel_matrix::TravelMatrix;

/// Mutable tour of a local search. `order[0]` is the fixed start and the tour closes
/// back onto it.
#[derive(Debug, Clone, PartialEq)]
pub struct TourState {
    order: Vec<usize>,
    cost: f64,
}

impl TourState {
    pub fn new(order: Vec<usize>, matrix: &TravelMatrix) -> Self {
        let cost = matrix.tour_cost(&order);
        TourState { order, cost }
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Reverses `order[from..=to]` and recomputes the cost.
    pub(crate) fn reverse(&mut self, from: usize, to: usize, matrix: &TravelMatrix) {
        self.order[from..=to].reverse();
        self.cost = matrix.tour_cost(&self.order);
    }

    pub fn into_order(self) -> Vec<usize> {
        self.order
    }
}
