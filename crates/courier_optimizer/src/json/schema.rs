use schemars::schema_for;

use crate::{job::JobDescriptor, network::NetworkInput};

pub fn generate_job_schema() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&schema_for!(JobDescriptor))
}

pub fn generate_network_schema() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&schema_for!(NetworkInput))
}
