use courier_graph::{Coordinate, DistanceMethod, GraphModel, GraphModelBuilder, NodeKey};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{engine_params::EngineParams, error::JobError};

/// Road network a job runs on.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename = "Network")]
pub struct NetworkInput {
    #[serde(default)]
    pub distance_method: DistanceMethod,
    pub nodes: Vec<NetworkNode>,
    #[serde(default)]
    pub edges: Vec<NetworkEdge>,
    /// Connects every pair of located nodes with an undirected edge weighted by their
    /// coordinate distance. Implied for networks without edges whose nodes all carry
    /// coordinates.
    #[serde(default)]
    pub complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename = "Node")]
pub struct NetworkNode {
    pub id: NodeKey,
    /// `[x, y]`, i.e. `[lon, lat]` for geographic networks.
    pub coordinates: Option<[f64; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename = "Edge")]
pub struct NetworkEdge {
    pub from: NodeKey,
    pub to: NodeKey,
    /// Defaults to the distance between the endpoint coordinates.
    pub weight: Option<f64>,
    pub capacity: Option<f64>,
    #[serde(default)]
    pub directed: bool,
    /// Seconds.
    pub travel_time: Option<f64>,
}

impl NetworkInput {
    #[instrument(skip_all, level = "debug")]
    pub fn build_graph(&self, params: &EngineParams) -> Result<GraphModel, JobError> {
        let mut builder = GraphModelBuilder::new(self.distance_method);

        for node in &self.nodes {
            builder.add_node(&node.id, node.coordinates.map(Coordinate::from))?;
        }

        if self.is_complete() {
            let located: Vec<&NodeKey> = self
                .nodes
                .iter()
                .filter(|node| node.coordinates.is_some())
                .map(|node| &node.id)
                .collect();

            for (i, from) in located.iter().enumerate() {
                for to in &located[i + 1..] {
                    if let Some(weight) = builder.coordinate_distance(from, to)? {
                        builder.add_edge(*from, *to, weight, params.default_edge_capacity, false)?;
                    }
                }
            }
        }

        for edge in &self.edges {
            let weight = match edge.weight {
                Some(weight) => weight,
                None => builder.coordinate_distance(&edge.from, &edge.to)?.ok_or_else(|| {
                    JobError::MissingEdgeWeight {
                        from: edge.from.clone(),
                        to: edge.to.clone(),
                    }
                })?,
            };

            let capacity = edge.capacity.unwrap_or(params.default_edge_capacity);
            let edge_id = builder.add_edge(&edge.from, &edge.to, weight, capacity, edge.directed)?;

            if let Some(seconds) = edge.travel_time {
                builder.set_travel_time(edge_id, seconds)?;
            }
        }

        let graph = builder.build();
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Network loaded"
        );

        Ok(graph)
    }

    pub fn is_complete(&self) -> bool {
        self.complete
            || (self.edges.is_empty()
                && !self.nodes.is_empty()
                && self.nodes.iter().all(|node| node.coordinates.is_some()))
    }
}
