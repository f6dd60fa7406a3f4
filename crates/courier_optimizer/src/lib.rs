mod assignment;
pub mod engine_params;
pub mod error;
pub mod job;
pub mod json;
pub mod network;
pub mod orchestrator;
pub mod result;
pub mod scheduler;
pub mod tour;

pub use engine_params::{EngineParams, Threads};
pub use error::JobError;
pub use job::{JobDescriptor, OptimizationType};
pub use network::NetworkInput;
pub use orchestrator::Orchestrator;
pub use result::{JobResult, JobStatus};
