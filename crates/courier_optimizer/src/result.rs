use courier_graph::NodeKey;
use serde::Serialize;

use crate::{error::JobError, tour::TourMethod};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Completed,
    Partial,
    Failed,
}

impl JobStatus {
    /// Partial when work was skipped or only some subproblems failed, failed when every
    /// dispatched subproblem failed.
    pub fn from_counts(dispatched: usize, failed: usize, skipped: usize) -> Self {
        if skipped > 0 {
            JobStatus::Partial
        } else if dispatched > 0 && failed == dispatched {
            JobStatus::Failed
        } else if failed > 0 {
            JobStatus::Partial
        } else {
            JobStatus::Completed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubproblemStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteResult {
    pub vehicle_id: String,
    pub status: SubproblemStatus,
    /// Visited stops, closed back onto the start.
    pub waypoints: Vec<NodeKey>,
    /// Every node driven through.
    pub path: Vec<NodeKey>,
    /// Destination ids served by this vehicle, in visiting order.
    pub destinations: Vec<String>,
    pub distance: f64,
    /// Estimated driving time in seconds.
    pub duration: f64,
    pub demand: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<TourMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeFlow {
    pub from: NodeKey,
    pub to: NodeKey,
    /// Negative when flowing against an undirected edge's orientation.
    pub flow: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CutEdge {
    pub from: NodeKey,
    pub to: NodeKey,
    pub capacity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowResult {
    pub query: usize,
    pub source: NodeKey,
    pub sink: NodeKey,
    pub status: SubproblemStatus,
    pub value: f64,
    pub edge_flows: Vec<EdgeFlow>,
    pub cut_edges: Vec<CutEdge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MinCutTreeEdgeResult {
    pub node: NodeKey,
    pub parent: NodeKey,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnassignedDestination {
    pub destination: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JobMetrics {
    pub graph_nodes: usize,
    pub graph_edges: usize,
    pub subproblems: usize,
    pub dispatched: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_duration: f64,
    pub total_flow: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub job_id: String,
    pub status: JobStatus,
    pub routes: Vec<RouteResult>,
    pub flows: Vec<FlowResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mincut_tree: Option<Vec<MinCutTreeEdgeResult>>,
    pub unassigned: Vec<UnassignedDestination>,
    /// Sum of the completed route distances.
    pub total_distance: f64,
    pub metrics: JobMetrics,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl JobResult {
    pub fn failed(job_id: impl Into<String>, error: &JobError, execution_time_ms: u64) -> Self {
        JobResult {
            job_id: job_id.into(),
            status: JobStatus::Failed,
            routes: Vec::new(),
            flows: Vec::new(),
            mincut_tree: None,
            unassigned: Vec::new(),
            total_distance: 0.0,
            metrics: JobMetrics::default(),
            execution_time_ms,
            error_message: Some(error.to_string()),
        }
    }

    /// JSON without the measured execution time, identical across runs of the same input.
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Some(object) = value.as_object_mut() {
            object.remove("execution_time_ms");
        }
        serde_json::to_string(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_rules() {
        assert_eq!(JobStatus::from_counts(3, 0, 0), JobStatus::Completed);
        assert_eq!(JobStatus::from_counts(3, 1, 0), JobStatus::Partial);
        assert_eq!(JobStatus::from_counts(3, 3, 0), JobStatus::Failed);
        assert_eq!(JobStatus::from_counts(0, 0, 3), JobStatus::Partial);
        assert_eq!(JobStatus::from_counts(1, 1, 2), JobStatus::Partial);
    }

    #[test]
    fn test_failed_result_serialization() {
        let result = JobResult::failed("job-9", &JobError::InvalidJob("no vehicles".to_owned()), 3);
        let json: serde_json::Value =
            serde_json::from_str(&result.canonical_json().unwrap()).unwrap();

        assert_eq!(json["status"], "failed");
        assert_eq!(json["total_distance"], 0.0);
        assert_eq!(json["error_message"], "Invalid job: no vehicles");
        assert!(json.get("execution_time_ms").is_none());
        assert!(json.get("mincut_tree").is_none());
    }
}
