use courier_graph::{Coordinate, NodeKey};
use fxhash::FxHashSet;
use jiff::{SignedDuration, Timestamp};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::JobError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationType {
    MinimizeDistance,
    MinimizeTime,
    MaximizeFlow,
    MincutAnalysis,
}

impl OptimizationType {
    pub fn is_routing(&self) -> bool {
        matches!(
            self,
            OptimizationType::MinimizeDistance | OptimizationType::MinimizeTime
        )
    }
}

/// A job as submitted by a client.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename = "Job")]
pub struct JobDescriptor {
    pub job_id: String,
    pub vehicles: Vec<JobVehicle>,
    #[serde(default)]
    pub destinations: Vec<JobDestination>,
    pub optimization_type: OptimizationType,

    /// No subproblem is started past this instant.
    pub deadline: Option<Timestamp>,
    /// Wall clock budget measured from the job start (e.g. "PT30S").
    pub max_computation_time: Option<SignedDuration>,

    /// Center of the destination sweep and default vehicle start.
    pub depot: Option<NodeKey>,
    #[serde(default)]
    pub queries: Vec<NetworkQuery>,
}

/// Either a bare vehicle id or a full vehicle description.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum JobVehicle {
    Id(String),
    Vehicle(VehicleSpec),
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename = "Vehicle")]
pub struct VehicleSpec {
    pub id: String,
    pub start: Option<NodeKey>,
    pub capacity: Option<f64>,
}

impl JobVehicle {
    pub fn id(&self) -> &str {
        match self {
            JobVehicle::Id(id) => id,
            JobVehicle::Vehicle(vehicle) => &vehicle.id,
        }
    }

    pub fn start(&self) -> Option<&NodeKey> {
        match self {
            JobVehicle::Id(_) => None,
            JobVehicle::Vehicle(vehicle) => vehicle.start.as_ref(),
        }
    }

    pub fn capacity(&self) -> Option<f64> {
        match self {
            JobVehicle::Id(_) => None,
            JobVehicle::Vehicle(vehicle) => vehicle.capacity,
        }
    }
}

/// A stop to deliver to, located either by coordinates or by a network node.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename = "Destination")]
pub struct JobDestination {
    pub id: Option<String>,
    pub coordinates: Option<[f64; 2]>,
    pub node: Option<NodeKey>,
    #[serde(default = "default_demand")]
    pub demand: f64,
}

fn default_demand() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename = "Query")]
pub struct NetworkQuery {
    pub source: NodeKey,
    pub sink: NodeKey,
}

/// Where a destination is, once validated.
#[derive(Debug, Clone, PartialEq)]
pub enum DestinationLocation {
    Node(NodeKey),
    Coordinate(Coordinate),
}

impl JobDestination {
    pub fn location(&self) -> Option<DestinationLocation> {
        match (&self.node, self.coordinates) {
            (Some(node), None) => Some(DestinationLocation::Node(node.clone())),
            (None, Some(coordinates)) => {
                Some(DestinationLocation::Coordinate(Coordinate::from(coordinates)))
            }
            _ => None,
        }
    }

    /// The client id, or the position in the destination list.
    pub fn label(&self, index: usize) -> String {
        self.id.clone().unwrap_or_else(|| index.to_string())
    }
}

impl JobDescriptor {
    pub fn validate(&self) -> Result<(), JobError> {
        let invalid = |message: String| Err(JobError::InvalidJob(message));

        if self.job_id.trim().is_empty() {
            return invalid("job_id is empty".to_owned());
        }

        if self.vehicles.is_empty() {
            return invalid("no vehicles".to_owned());
        }

        let mut ids = FxHashSet::default();
        for vehicle in &self.vehicles {
            if vehicle.id().is_empty() {
                return invalid("vehicle with an empty id".to_owned());
            }

            if !ids.insert(vehicle.id()) {
                return invalid(format!("duplicate vehicle id {}", vehicle.id()));
            }

            if vehicle.capacity().is_some_and(|c| !c.is_finite() || c < 0.0) {
                return invalid(format!("vehicle {} has an invalid capacity", vehicle.id()));
            }
        }

        if self.optimization_type.is_routing() && self.destinations.is_empty() {
            return invalid("routing jobs need at least one destination".to_owned());
        }

        for (index, destination) in self.destinations.iter().enumerate() {
            let label = destination.label(index);

            match destination.location() {
                None => {
                    return invalid(format!(
                        "destination {label} needs exactly one of coordinates or node"
                    ));
                }
                Some(DestinationLocation::Coordinate(c)) if !c.is_finite() => {
                    return invalid(format!("destination {label} has invalid coordinates"));
                }
                _ => {}
            }

            if !destination.demand.is_finite() || destination.demand <= 0.0 {
                return invalid(format!("destination {label} has a non positive demand"));
            }
        }

        if !self.optimization_type.is_routing() && self.queries.is_empty() {
            return invalid("network analysis jobs need at least one query".to_owned());
        }

        if self
            .max_computation_time
            .is_some_and(|duration| !duration.is_positive())
        {
            return invalid("max_computation_time must be positive".to_owned());
        }

        Ok(())
    }

    /// The earlier of the explicit deadline and the computation time budget.
    pub fn effective_deadline(
        &self,
        started_at: Timestamp,
        default_computation_time: SignedDuration,
    ) -> Option<Timestamp> {
        let budget = self
            .max_computation_time
            .unwrap_or(default_computation_time);
        let budget_end = started_at.checked_add(budget).ok();

        match (self.deadline, budget_end) {
            (Some(deadline), Some(end)) => Some(deadline.min(end)),
            (deadline, end) => deadline.or(end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> JobDescriptor {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_mixed_vehicles() {
        let job = parse(
            r#"{
                "job_id": "job-1",
                "vehicles": ["V001", {"id": "V002", "start": 4, "capacity": 800.0}],
                "destinations": [
                    {"id": "L001", "coordinates": [-122.41, 37.77], "demand": 120.0},
                    {"node": "hub"}
                ],
                "optimization_type": "minimize_distance",
                "deadline": "2026-01-01T12:00:00Z",
                "max_computation_time": "PT30S"
            }"#,
        );

        assert_eq!(job.vehicles[0].id(), "V001");
        assert_eq!(job.vehicles[1].start(), Some(&NodeKey::Id(4)));
        assert_eq!(job.vehicles[1].capacity(), Some(800.0));
        assert_eq!(job.destinations[1].demand, 1.0);
        assert_eq!(
            job.destinations[1].location(),
            Some(DestinationLocation::Node("hub".into()))
        );
        assert_eq!(job.max_computation_time, Some(SignedDuration::from_secs(30)));
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result = serde_json::from_str::<JobDescriptor>(
            r#"{"job_id": "j", "vehicles": ["a"], "optimization_type": "maximize_flow",
                "priority": 1}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_failures() {
        let base = parse(
            r#"{
                "job_id": "job-2",
                "vehicles": ["A", "B"],
                "destinations": [{"node": 1, "demand": 2.0}],
                "optimization_type": "minimize_time"
            }"#,
        );
        assert!(base.validate().is_ok());

        let mut duplicate = base.clone();
        duplicate.vehicles.push(JobVehicle::Id("A".to_owned()));
        assert!(matches!(duplicate.validate(), Err(JobError::InvalidJob(_))));

        let mut no_vehicles = base.clone();
        no_vehicles.vehicles.clear();
        assert!(matches!(no_vehicles.validate(), Err(JobError::InvalidJob(_))));

        let mut no_destinations = base.clone();
        no_destinations.destinations.clear();
        assert!(matches!(no_destinations.validate(), Err(JobError::InvalidJob(_))));

        let mut both_locations = base.clone();
        both_locations.destinations[0].coordinates = Some([0.0, 0.0]);
        assert!(matches!(both_locations.validate(), Err(JobError::InvalidJob(_))));

        let mut zero_demand = base.clone();
        zero_demand.destinations[0].demand = 0.0;
        assert!(matches!(zero_demand.validate(), Err(JobError::InvalidJob(_))));

        let mut flow_without_queries = base.clone();
        flow_without_queries.optimization_type = OptimizationType::MaximizeFlow;
        assert!(matches!(flow_without_queries.validate(), Err(JobError::InvalidJob(_))));
    }

    #[test]
    fn test_effective_deadline() {
        let start: Timestamp = "2026-01-01T12:00:00Z".parse().unwrap();
        let mut job = parse(
            r#"{"job_id": "j", "vehicles": ["a"], "optimization_type": "mincut_analysis",
                "queries": [{"source": 1, "sink": 2}]}"#,
        );

        assert_eq!(
            job.effective_deadline(start, SignedDuration::from_mins(5)),
            Some("2026-01-01T12:05:00Z".parse().unwrap())
        );

        job.deadline = Some("2026-01-01T12:01:00Z".parse().unwrap());
        assert_eq!(
            job.effective_deadline(start, SignedDuration::from_mins(5)),
            job.deadline
        );
    }
}
