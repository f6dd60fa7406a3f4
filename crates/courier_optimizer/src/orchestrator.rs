use std::time::Instant;

use courier_graph::{
    FlowNetwork, GraphError, GraphModel, MaxFlowResult, NodeIdx, NodeKey, build_min_cut_tree,
    max_flow,
    routing::{DistanceWeighting, TravelTimeWeighting, Weighting},
};
use jiff::Timestamp;
use tracing::{info, instrument, warn};

use crate::{
    assignment::{ResolvedDestination, assign_destinations},
    engine_params::EngineParams,
    error::JobError,
    job::{DestinationLocation, JobDescriptor, JobVehicle, OptimizationType},
    network::NetworkInput,
    result::{
        CutEdge, EdgeFlow, FlowResult, JobMetrics, JobResult, JobStatus, MinCutTreeEdgeResult,
        RouteResult, SubproblemStatus, UnassignedDestination,
    },
    scheduler::{ParallelScheduler, ScheduleReport},
    tour::{TourParams, solve_tour},
};

/// Subproblem bookkeeping of one job.
#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    subproblems: usize,
    dispatched: usize,
    failed: usize,
    skipped: usize,
}

impl Counts {
    fn from_report<T>(report: &ScheduleReport<T>, failed: usize) -> Self {
        Counts {
            subproblems: report.dispatched + report.skipped,
            dispatched: report.dispatched,
            failed,
            skipped: report.skipped,
        }
    }
}

struct VehicleRoute<'a> {
    vehicle_id: &'a str,
    start: NodeIdx,
    destinations: Vec<usize>,
}

struct FlowQuery {
    index: usize,
    source: NodeIdx,
    sink: NodeIdx,
}

/// Entry point of the engine: validates a job, builds its graph, fans the work out to
/// the scheduler and assembles the result.
#[derive(Debug, Default)]
pub struct Orchestrator {
    params: EngineParams,
}

impl Orchestrator {
    pub fn new(params: EngineParams) -> Self {
        Orchestrator { params }
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    /// Runs a job to completion. Job level errors are reported as a failed result.
    #[instrument(skip_all, fields(job_id = %job.job_id))]
    pub fn run(&self, job: &JobDescriptor, network: &NetworkInput) -> JobResult {
        let clock = Instant::now();
        match self.try_run(job, network) {
            Ok(result) => result,
            Err(error) => {
                warn!(%error, "Job failed");
                JobResult::failed(&job.job_id, &error, elapsed_ms(clock))
            }
        }
    }

    pub fn try_run(
        &self,
        job: &JobDescriptor,
        network: &NetworkInput,
    ) -> Result<JobResult, JobError> {
        let clock = Instant::now();
        let started_at = Timestamp::now();

        job.validate()?;
        let graph = network.build_graph(&self.params)?;
        if graph.node_count() == 0 {
            return Err(JobError::InvalidJob("the network has no nodes".to_owned()));
        }

        let scheduler = ParallelScheduler::new(&self.params.threads)?;
        let deadline = job.effective_deadline(started_at, self.params.default_computation_time);

        info!(
            optimization_type = ?job.optimization_type,
            vehicles = job.vehicles.len(),
            destinations = job.destinations.len(),
            queries = job.queries.len(),
            "Job started"
        );

        let mut result = JobResult {
            job_id: job.job_id.clone(),
            status: JobStatus::Completed,
            routes: Vec::new(),
            flows: Vec::new(),
            mincut_tree: None,
            unassigned: Vec::new(),
            total_distance: 0.0,
            metrics: JobMetrics {
                graph_nodes: graph.node_count(),
                graph_edges: graph.edge_count(),
                ..Default::default()
            },
            execution_time_ms: 0,
            error_message: None,
        };

        let counts = match job.optimization_type {
            OptimizationType::MinimizeDistance => {
                let weighting = DistanceWeighting;
                self.solve_routes(job, &graph, &scheduler, deadline, &weighting, &mut result)?
            }
            OptimizationType::MinimizeTime => {
                let weighting = TravelTimeWeighting::new(self.params.default_speed_kmh);
                self.solve_routes(job, &graph, &scheduler, deadline, &weighting, &mut result)?
            }
            OptimizationType::MaximizeFlow => {
                self.solve_flows(job, &graph, &scheduler, deadline, &mut result)?
            }
            OptimizationType::MincutAnalysis => {
                self.solve_min_cut(job, &graph, &scheduler, deadline, &mut result)?
            }
        };

        result.status = JobStatus::from_counts(counts.dispatched, counts.failed, counts.skipped);
        if result.status == JobStatus::Completed && !result.unassigned.is_empty() {
            result.status = JobStatus::Partial;
        }
        result.metrics.subproblems = counts.subproblems;
        result.metrics.dispatched = counts.dispatched;
        result.metrics.failed = counts.failed;
        result.metrics.completed = counts.dispatched - counts.failed;
        result.metrics.skipped = counts.skipped;
        if result.status != JobStatus::Completed {
            result.error_message = status_message(&counts, result.unassigned.len());
        }
        result.execution_time_ms = elapsed_ms(clock);

        info!(
            status = ?result.status,
            completed = result.metrics.completed,
            failed = counts.failed,
            skipped = counts.skipped,
            execution_time_ms = result.execution_time_ms,
            "Job finished"
        );

        Ok(result)
    }

    fn solve_routes(
        &self,
        job: &JobDescriptor,
        graph: &GraphModel,
        scheduler: &ParallelScheduler,
        deadline: Option<Timestamp>,
        weighting: &impl Weighting,
        result: &mut JobResult,
    ) -> Result<Counts, JobError> {
        let depot = match &job.depot {
            Some(key) => resolve_node(graph, key, "depot")?,
            None => NodeIdx::new(0),
        };

        let destinations = job
            .destinations
            .iter()
            .enumerate()
            .map(|(index, destination)| {
                let node = match destination.location() {
                    Some(DestinationLocation::Node(key)) => {
                        let owner = format!("destination {}", destination.label(index));
                        resolve_node(graph, &key, &owner)?
                    }
                    Some(DestinationLocation::Coordinate(coordinate)) => graph
                        .nearest_node(&coordinate)
                        .ok_or(JobError::MissingCoordinates(index))?,
                    None => {
                        return Err(JobError::InvalidJob(format!(
                            "destination {} has no location",
                            destination.label(index)
                        )));
                    }
                };

                Ok(ResolvedDestination {
                    index,
                    node,
                    demand: destination.demand,
                })
            })
            .collect::<Result<Vec<_>, JobError>>()?;

        let mut vehicles: Vec<&JobVehicle> = job.vehicles.iter().collect();
        vehicles.sort_by(|a, b| a.id().cmp(b.id()));

        let capacities: Vec<Option<f64>> =
            vehicles.iter().map(|vehicle| vehicle.capacity()).collect();
        let assignment = assign_destinations(graph, depot, &destinations, &capacities);

        let mut subproblems = Vec::with_capacity(vehicles.len());
        for (vehicle, assigned) in vehicles.iter().zip(assignment.routes) {
            let start = match vehicle.start() {
                Some(key) => resolve_node(graph, key, &format!("vehicle {}", vehicle.id()))?,
                None => depot,
            };

            subproblems.push(VehicleRoute {
                vehicle_id: vehicle.id(),
                start,
                destinations: assigned,
            });
        }

        let tour_params = self.params.tour_params();
        let time_weighting = TravelTimeWeighting::new(self.params.default_speed_kmh);

        let report = scheduler.run(&subproblems, deadline, |route| {
            solve_vehicle_route(
                graph,
                weighting,
                &time_weighting,
                job,
                &destinations,
                route,
                &tour_params,
            )
        });

        let failed = count_failed(report.results.iter().map(|(_, route)| route.status));
        let counts = Counts::from_report(&report, failed);

        for (_, route) in report.results {
            if route.status == SubproblemStatus::Completed {
                result.total_distance += route.distance;
                result.metrics.total_duration += route.duration;
            }
            result.routes.push(route);
        }

        result.unassigned = assignment
            .unassigned
            .iter()
            .map(|&index| UnassignedDestination {
                destination: job.destinations[index].label(index),
                reason: "exceeds the remaining vehicle capacity".to_owned(),
            })
            .collect();

        Ok(counts)
    }

    fn solve_flows(
        &self,
        job: &JobDescriptor,
        graph: &GraphModel,
        scheduler: &ParallelScheduler,
        deadline: Option<Timestamp>,
        result: &mut JobResult,
    ) -> Result<Counts, JobError> {
        let queries = resolve_queries(job, graph)?;
        let network = FlowNetwork::directed(graph);
        let selection = self.params.flow_selection;

        let report = scheduler.run(&queries, deadline, |query| {
            let flow = max_flow(graph, &network, query.source, query.sink, selection);
            flow_result(graph, query, flow)
        });

        Ok(self.collect_flows(report, result))
    }

    fn solve_min_cut(
        &self,
        job: &JobDescriptor,
        graph: &GraphModel,
        scheduler: &ParallelScheduler,
        deadline: Option<Timestamp>,
        result: &mut JobResult,
    ) -> Result<Counts, JobError> {
        let queries = resolve_queries(job, graph)?;

        if deadline.is_some_and(|deadline| Timestamp::now() >= deadline) {
            warn!("Deadline exceeded before the min cut tree was built");
            return Ok(Counts {
                subproblems: queries.len(),
                skipped: queries.len(),
                ..Default::default()
            });
        }

        let params = self.params.min_cut_params();
        let tree = scheduler.install(|| build_min_cut_tree(graph, &params))?;

        result.mincut_tree = Some(
            tree.edges()
                .map(|edge| MinCutTreeEdgeResult {
                    node: graph.node_key(edge.node).clone(),
                    parent: graph.node_key(edge.parent).clone(),
                    weight: edge.weight,
                })
                .collect(),
        );

        let report = scheduler.run(&queries, deadline, |query| {
            let mut flow = FlowResult {
                query: query.index,
                source: graph.node_key(query.source).clone(),
                sink: graph.node_key(query.sink).clone(),
                status: SubproblemStatus::Completed,
                value: 0.0,
                edge_flows: Vec::new(),
                cut_edges: Vec::new(),
                error: None,
            };

            let value = if query.source == query.sink {
                Err(GraphError::InvalidFlowQuery(flow.source.clone()))
            } else {
                tree.query(query.source, query.sink)
            };

            match value {
                Ok(value) => flow.value = value,
                Err(error) => {
                    flow.status = SubproblemStatus::Failed;
                    flow.error = Some(error.to_string());
                }
            }

            flow
        });

        Ok(self.collect_flows(report, result))
    }

    fn collect_flows(&self, report: ScheduleReport<FlowResult>, result: &mut JobResult) -> Counts {
        let failed = count_failed(report.results.iter().map(|(_, flow)| flow.status));
        let counts = Counts::from_report(&report, failed);

        for (_, flow) in report.results {
            if flow.status == SubproblemStatus::Completed {
                result.metrics.total_flow += flow.value;
            }
            result.flows.push(flow);
        }

        counts
    }
}

fn elapsed_ms(clock: Instant) -> u64 {
    u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn status_message(counts: &Counts, unassigned: usize) -> Option<String> {
    if counts.skipped > 0 {
        Some(format!(
            "Deadline exceeded: {} of {} subproblems skipped",
            counts.skipped, counts.subproblems
        ))
    } else if counts.failed > 0 {
        Some(format!(
            "{} of {} subproblems failed",
            counts.failed, counts.dispatched
        ))
    } else if unassigned > 0 {
        Some(format!("{unassigned} destinations left unassigned"))
    } else {
        None
    }
}

fn count_failed(statuses: impl Iterator<Item = SubproblemStatus>) -> usize {
    statuses
        .filter(|status| *status == SubproblemStatus::Failed)
        .count()
}

fn resolve_node(graph: &GraphModel, key: &NodeKey, owner: &str) -> Result<NodeIdx, JobError> {
    graph
        .node_index(key)
        .map_err(|_| JobError::InvalidJob(format!("{owner} references unknown node {key}")))
}

fn resolve_queries(job: &JobDescriptor, graph: &GraphModel) -> Result<Vec<FlowQuery>, JobError> {
    job.queries
        .iter()
        .enumerate()
        .map(|(index, query)| {
            let owner = format!("query {index}");
            Ok(FlowQuery {
                index,
                source: resolve_node(graph, &query.source, &owner)?,
                sink: resolve_node(graph, &query.sink, &owner)?,
            })
        })
        .collect()
}

fn keys(graph: &GraphModel, nodes: &[NodeIdx]) -> Vec<NodeKey> {
    nodes.iter().map(|&node| graph.node_key(node).clone()).collect()
}

fn solve_vehicle_route(
    graph: &GraphModel,
    weighting: &impl Weighting,
    time_weighting: &TravelTimeWeighting,
    job: &JobDescriptor,
    destinations: &[ResolvedDestination],
    route: &VehicleRoute,
    params: &TourParams,
) -> RouteResult {
    let demand = route
        .destinations
        .iter()
        .map(|&index| destinations[index].demand)
        .sum();

    let mut result = RouteResult {
        vehicle_id: route.vehicle_id.to_owned(),
        status: SubproblemStatus::Completed,
        waypoints: Vec::new(),
        path: Vec::new(),
        destinations: Vec::new(),
        distance: 0.0,
        duration: 0.0,
        demand,
        method: None,
        error: None,
    };

    if route.destinations.is_empty() {
        return result;
    }

    let mut stops = vec![route.start];
    for &index in &route.destinations {
        let node = destinations[index].node;
        if !stops.contains(&node) {
            stops.push(node);
        }
    }

    match solve_tour(graph, weighting, &stops, params) {
        Ok(tour) => {
            let visiting_order = &tour.stops[..tour.stops.len().saturating_sub(1).max(1)];
            for node in visiting_order {
                for &index in &route.destinations {
                    if destinations[index].node == *node {
                        result.destinations.push(job.destinations[index].label(index));
                    }
                }
            }

            result.waypoints = keys(graph, &tour.stops);
            result.path = keys(graph, &tour.path);
            result.distance = tour.edges.iter().map(|&edge| graph.edge(edge).weight()).sum();
            result.duration = tour
                .edges
                .iter()
                .map(|&edge| time_weighting.edge_weight(graph.edge(edge)))
                .sum();
            result.method = Some(tour.method);
        }
        Err(error) => {
            warn!(vehicle_id = route.vehicle_id, %error, "Route failed");
            result.status = SubproblemStatus::Failed;
            result.error = Some(error.to_string());
        }
    }

    result
}

fn flow_result(
    graph: &GraphModel,
    query: &FlowQuery,
    flow: Result<MaxFlowResult, GraphError>,
) -> FlowResult {
    let mut result = FlowResult {
        query: query.index,
        source: graph.node_key(query.source).clone(),
        sink: graph.node_key(query.sink).clone(),
        status: SubproblemStatus::Completed,
        value: 0.0,
        edge_flows: Vec::new(),
        cut_edges: Vec::new(),
        error: None,
    };

    match flow {
        Ok(flow) => {
            result.value = flow.value;
            result.edge_flows = graph
                .edges()
                .iter()
                .zip(&flow.edge_flows)
                .filter(|(_, amount)| **amount != 0.0)
                .map(|(edge, &amount)| EdgeFlow {
                    from: graph.node_key(edge.from()).clone(),
                    to: graph.node_key(edge.to()).clone(),
                    flow: amount,
                })
                .collect();
            result.cut_edges = flow
                .cut_edges
                .iter()
                .map(|&edge| {
                    let edge = graph.edge(edge);
                    CutEdge {
                        from: graph.node_key(edge.from()).clone(),
                        to: graph.node_key(edge.to()).clone(),
                        capacity: edge.capacity(),
                    }
                })
                .collect();
        }
        Err(error) => {
            result.status = SubproblemStatus::Failed;
            result.error = Some(error.to_string());
        }
    }

    result
}
