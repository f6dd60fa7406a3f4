use std::path::{Path, PathBuf};

use clap::Subcommand;
use courier_graph::{DistanceMethod, NodeKey};
use courier_optimizer::{
    job::{JobDescriptor, JobDestination, JobVehicle, NetworkQuery, OptimizationType, VehicleSpec},
    network::{NetworkEdge, NetworkInput, NetworkNode},
};
use fxhash::FxHashSet;
use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::Serialize;
use tracing::info;

use crate::parsers;

/// San Francisco, `[lon, lat]`.
const AREA_MIN: [f64; 2] = [-122.51, 37.71];
const AREA_MAX: [f64; 2] = [-122.38, 37.81];

#[derive(Subcommand)]
pub enum GenerateSubcommands {
    JsonSchema {
        /// Output folder for job.schema.json and network.schema.json
        #[arg(long, short = 'o')]
        out: PathBuf,
    },
    /// Random road network with a matching job
    Network {
        /// Output folder for network.json and job.json
        #[arg(long, short = 'o')]
        out: PathBuf,

        #[arg(long, short = 'n', default_value_t = 200)]
        nodes: usize,

        /// Extra edges per node on top of the spanning tree
        #[arg(long, default_value_t = 2)]
        neighbors: usize,

        #[arg(long, default_value_t = 3)]
        vehicles: usize,

        #[arg(long, short = 'd', default_value_t = 30)]
        destinations: usize,

        #[arg(
            long,
            value_parser = parsers::parse_optimization_type,
            default_value = "minimize_distance"
        )]
        optimization_type: OptimizationType,

        #[arg(long, short = 's', default_value_t = 42)]
        seed: u64,
    },
}

fn write_json(path: &Path, value: &impl Serialize) -> anyhow::Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn planar_distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

/// Indices of the `count` points closest to `points[from]` among `candidates`.
fn closest(
    points: &[[f64; 2]],
    from: usize,
    candidates: impl Iterator<Item = usize>,
    count: usize,
) -> Vec<usize> {
    let mut candidates: Vec<usize> = candidates.filter(|&i| i != from).collect();
    candidates.sort_by(|&a, &b| {
        planar_distance(points[from], points[a])
            .total_cmp(&planar_distance(points[from], points[b]))
            .then(a.cmp(&b))
    });
    candidates.truncate(count);
    candidates
}

fn generate_network(rng: &mut SmallRng, nodes: usize, neighbors: usize) -> NetworkInput {
    let points: Vec<[f64; 2]> = (0..nodes)
        .map(|_| {
            [
                rng.random_range(AREA_MIN[0]..AREA_MAX[0]),
                rng.random_range(AREA_MIN[1]..AREA_MAX[1]),
            ]
        })
        .collect();

    let mut pairs = FxHashSet::default();
    let mut links = Vec::new();
    let mut link = |a: usize, b: usize| {
        if pairs.insert((a.min(b), a.max(b))) {
            links.push((a, b));
        }
    };

    for node in 1..nodes {
        for other in closest(&points, node, 0..node, 1) {
            link(other, node);
        }
    }
    for node in 0..nodes {
        for other in closest(&points, node, 0..nodes, neighbors) {
            link(node, other);
        }
    }

    let edges = links
        .into_iter()
        .map(|(from, to)| NetworkEdge {
            from: NodeKey::Id(from as i64),
            to: NodeKey::Id(to as i64),
            weight: None,
            capacity: Some(rng.random_range(1..=20) as f64),
            directed: false,
            travel_time: None,
        })
        .collect();

    NetworkInput {
        distance_method: DistanceMethod::Haversine,
        nodes: points
            .into_iter()
            .enumerate()
            .map(|(id, coordinates)| NetworkNode {
                id: NodeKey::Id(id as i64),
                coordinates: Some(coordinates),
            })
            .collect(),
        edges,
        complete: false,
    }
}

fn generate_job(
    rng: &mut SmallRng,
    nodes: usize,
    vehicles: usize,
    destinations: usize,
    optimization_type: OptimizationType,
    seed: u64,
) -> JobDescriptor {
    let random_node = |rng: &mut SmallRng| NodeKey::Id(rng.random_range(1..nodes.max(2)) as i64);

    let vehicles = (0..vehicles)
        .map(|i| {
            JobVehicle::Vehicle(VehicleSpec {
                id: format!("V{:03}", i + 1),
                start: None,
                capacity: None,
            })
        })
        .collect();

    let (destinations, queries) = if optimization_type.is_routing() {
        let destinations = (0..destinations)
            .map(|i| JobDestination {
                id: Some(format!("L{:03}", i + 1)),
                coordinates: None,
                node: Some(random_node(rng)),
                demand: rng.random_range(1..=50) as f64,
            })
            .collect();
        (destinations, Vec::new())
    } else {
        let queries = (0..destinations.max(1))
            .map(|_| NetworkQuery {
                source: NodeKey::Id(0),
                sink: random_node(rng),
            })
            .collect();
        (Vec::new(), queries)
    };

    JobDescriptor {
        job_id: format!("sample-{seed}"),
        vehicles,
        destinations,
        optimization_type,
        deadline: None,
        max_computation_time: Some(jiff::SignedDuration::from_secs(60)),
        depot: Some(NodeKey::Id(0)),
        queries,
    }
}

pub fn run(subcommand: GenerateSubcommands) -> Result<(), anyhow::Error> {
    match subcommand {
        GenerateSubcommands::JsonSchema { out } => {
            std::fs::create_dir_all(&out)?;
            std::fs::write(
                out.join("job.schema.json"),
                courier_optimizer::json::schema::generate_job_schema()?,
            )?;
            std::fs::write(
                out.join("network.schema.json"),
                courier_optimizer::json::schema::generate_network_schema()?,
            )?;
        }
        GenerateSubcommands::Network {
            out,
            nodes,
            neighbors,
            vehicles,
            destinations,
            optimization_type,
            seed,
        } => {
            anyhow::ensure!(nodes >= 2, "a network needs at least two nodes");

            let mut rng = SmallRng::seed_from_u64(seed);
            let network = generate_network(&mut rng, nodes, neighbors);
            let job = generate_job(
                &mut rng,
                nodes,
                vehicles.max(1),
                destinations,
                optimization_type,
                seed,
            );

            std::fs::create_dir_all(&out)?;
            write_json(&out.join("network.json"), &network)?;
            write_json(&out.join("job.json"), &job)?;

            info!(
                nodes = network.nodes.len(),
                edges = network.edges.len(),
                "Sample written to {}",
                out.display()
            );
        }
    }

    Ok(())
}
