use courier_graph::{GraphModel, NodeIdx};
use tracing::debug;

/// A destination resolved to a network node.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResolvedDestination {
    pub index: usize,
    pub node: NodeIdx,
    pub demand: f64,
}

#[derive(Debug, Default)]
pub(crate) struct Assignment {
    /// Destination indices per vehicle, in sweep order.
    pub routes: Vec<Vec<usize>>,
    pub unassigned: Vec<usize>,
}

/// Angle of `node` around `center`. Nodes without coordinates sort after located ones
/// by node index.
fn sweep_key(graph: &GraphModel, center: NodeIdx, node: NodeIdx) -> (f64, usize) {
    let center = graph.node(center).coordinate();
    let position = graph.node(node).coordinate();

    match (center, position) {
        (Some(center), Some(position)) => {
            let angle = (position.y() - center.y()).atan2(position.x() - center.x());
            (angle, node.get())
        }
        _ => (f64::INFINITY, node.get()),
    }
}

/// Sweeps the destinations around `depot` and cuts the sweep into one contiguous run
/// per vehicle.
///
/// When any vehicle declares a capacity, runs are filled until the next destination
/// no longer fits and destinations left after the last vehicle stay unassigned;
/// vehicles without a capacity take everything offered. Otherwise each vehicle gets
/// roughly the same total demand.
pub(crate) fn assign_destinations(
    graph: &GraphModel,
    depot: NodeIdx,
    destinations: &[ResolvedDestination],
    capacities: &[Option<f64>],
) -> Assignment {
    let mut sweep: Vec<&ResolvedDestination> = destinations.iter().collect();
    sweep.sort_by(|a, b| {
        let (angle_a, node_a) = sweep_key(graph, depot, a.node);
        let (angle_b, node_b) = sweep_key(graph, depot, b.node);
        angle_a
            .total_cmp(&angle_b)
            .then(node_a.cmp(&node_b))
            .then(a.index.cmp(&b.index))
    });

    let mut assignment = Assignment {
        routes: vec![Vec::new(); capacities.len()],
        unassigned: Vec::new(),
    };

    if capacities.is_empty() {
        assignment.unassigned = sweep.iter().map(|d| d.index).collect();
        return assignment;
    }

    if capacities.iter().any(Option::is_some) {
        let mut vehicle = 0;
        let mut load = 0.0;

        for destination in sweep {
            while vehicle < capacities.len()
                && capacities[vehicle].is_some_and(|capacity| load + destination.demand > capacity)
            {
                vehicle += 1;
                load = 0.0;
            }

            if vehicle == capacities.len() {
                assignment.unassigned.push(destination.index);
                continue;
            }

            assignment.routes[vehicle].push(destination.index);
            load += destination.demand;
        }
    } else {
        let total: f64 = sweep.iter().map(|d| d.demand).sum();
        let vehicles = capacities.len();
        let mut cumulative = 0.0;

        for destination in sweep {
            let midpoint = cumulative + destination.demand / 2.0;
            let vehicle = ((midpoint / total * vehicles as f64) as usize).min(vehicles - 1);
            assignment.routes[vehicle].push(destination.index);
            cumulative += destination.demand;
        }
    }

    debug!(
        vehicles = capacities.len(),
        unassigned = assignment.unassigned.len(),
        "Destinations assigned"
    );

    assignment
}

#[cfg(test)]
mod tests {
    use courier_graph::{Coordinate, DistanceMethod, GraphModelBuilder};

    use super::*;

    /// Depot at the origin and eight nodes on a circle, counter-clockwise from angle 0.
    fn star_graph() -> GraphModel {
        let mut builder = GraphModelBuilder::new(DistanceMethod::Euclidean);
        builder.add_node("depot", Some(Coordinate::new(0.0, 0.0))).unwrap();
        for i in 0..8 {
            let angle = i as f64 * std::f64::consts::FRAC_PI_4 - std::f64::consts::PI + 0.1;
            builder
                .add_node(i, Some(Coordinate::new(angle.cos(), angle.sin())))
                .unwrap();
        }
        builder.build()
    }

    fn destinations(demands: &[f64]) -> Vec<ResolvedDestination> {
        demands
            .iter()
            .enumerate()
            .map(|(index, &demand)| ResolvedDestination {
                index,
                node: NodeIdx::new(index + 1),
                demand,
            })
            .collect()
    }

    #[test]
    fn test_balanced_by_demand() {
        let graph = star_graph();
        let assignment = assign_destinations(
            &graph,
            NodeIdx::new(0),
            &destinations(&[1.0; 8]),
            &[None, None],
        );

        assert_eq!(assignment.routes, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);
        assert!(assignment.unassigned.is_empty());
    }

    #[test]
    fn test_capacity_bounded_sweep() {
        let graph = star_graph();
        let assignment = assign_destinations(
            &graph,
            NodeIdx::new(0),
            &destinations(&[3.0, 3.0, 3.0, 3.0, 3.0, 3.0, 3.0, 3.0]),
            &[Some(7.0), Some(9.0)],
        );

        assert_eq!(assignment.routes, vec![vec![0, 1], vec![2, 3, 4]]);
        assert_eq!(assignment.unassigned, vec![5, 6, 7]);
    }

    #[test]
    fn test_uncapacitated_vehicle_takes_the_rest() {
        let graph = star_graph();
        let assignment = assign_destinations(
            &graph,
            NodeIdx::new(0),
            &destinations(&[2.0; 4]),
            &[Some(3.0), None],
        );

        assert_eq!(assignment.routes, vec![vec![0], vec![1, 2, 3]]);
    }
}
