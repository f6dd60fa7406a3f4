use std::{fs::File, io::BufReader, path::PathBuf};

use clap::Args;
use courier_graph::ActiveNodeSelection;
use courier_optimizer::{
    EngineParams, JobDescriptor, JobStatus, NetworkInput, Orchestrator, Threads,
};
use tracing::{info, warn};

use crate::parsers;

#[derive(Args)]
pub struct OptimizeArgs {
    /// Job descriptor (JSON)
    #[arg(short, long, env = "COURIER_JOB")]
    job: PathBuf,

    /// Road network (JSON)
    #[arg(short, long, env = "COURIER_NETWORK")]
    network: PathBuf,

    /// Result file, printed to stdout when omitted
    #[arg(short, long, env = "COURIER_OUTPUT")]
    output: Option<PathBuf>,

    /// Worker threads, all available cores when omitted
    #[arg(short, long, env = "COURIER_THREADS")]
    threads: Option<usize>,

    /// Largest tour solved exactly, start included
    #[arg(long, env = "COURIER_EXACT_TOUR_CUTOFF", default_value_t = 15)]
    exact_tour_cutoff: usize,

    #[arg(long, env = "COURIER_TWO_OPT_ITERATIONS", default_value_t = 1000)]
    two_opt_iterations: usize,

    /// Active node selection of the max flow solver (fifo, highest-label)
    #[arg(
        long,
        env = "COURIER_FLOW_SELECTION",
        value_parser = parsers::parse_selection,
        default_value = "highest-label"
    )]
    flow_selection: ActiveNodeSelection,

    #[arg(long, env = "COURIER_MIN_CUT_BATCH_SIZE", default_value_t = 8)]
    min_cut_batch_size: usize,

    /// Speed for edges without a travel time
    #[arg(long, env = "COURIER_DEFAULT_SPEED_KMH", default_value_t = 50.0)]
    default_speed_kmh: f64,

    #[arg(long, env = "COURIER_DEFAULT_CAPACITY", default_value_t = 1.0)]
    default_capacity: f64,

    /// Budget for jobs without max_computation_time (e.g., "30s", "5m", "PT1H")
    #[arg(
        long,
        env = "COURIER_COMPUTATION_TIME",
        value_parser = parsers::parse_duration,
        default_value = "5m"
    )]
    computation_time: jiff::SignedDuration,

    /// Pretty print the result
    #[arg(long)]
    pretty: bool,
}

impl OptimizeArgs {
    fn engine_params(&self) -> EngineParams {
        EngineParams {
            threads: self.threads.map_or(Threads::Auto, Threads::Multi),
            exact_tour_cutoff: self.exact_tour_cutoff,
            two_opt_max_iterations: self.two_opt_iterations,
            flow_selection: self.flow_selection,
            min_cut_batch_size: self.min_cut_batch_size,
            default_speed_kmh: self.default_speed_kmh,
            default_edge_capacity: self.default_capacity,
            default_computation_time: self.computation_time,
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> anyhow::Result<T> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

pub fn run(args: OptimizeArgs) -> anyhow::Result<()> {
    let job: JobDescriptor = read_json(&args.job)?;
    let network: NetworkInput = read_json(&args.network)?;

    let orchestrator = Orchestrator::new(args.engine_params());
    let result = orchestrator.run(&job, &network);

    match result.status {
        JobStatus::Completed => info!(
            "Finished: job = {}, routes = {}, flows = {}, time = {}ms",
            result.job_id,
            result.routes.len(),
            result.flows.len(),
            result.execution_time_ms
        ),
        status => warn!(
            "Finished with status {:?}: job = {}, {}",
            status,
            result.job_id,
            result.error_message.as_deref().unwrap_or("no message")
        ),
    }

    let json = if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };

    match args.output {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, json)?;
        }
        None => println!("{json}"),
    }

    Ok(())
}
