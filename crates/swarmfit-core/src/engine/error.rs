use thiserror::Error;

use super::backend::BackendError;
use super::config::ConfigError;
use super::topology::TopologyError;
use crate::core::io::run_log::RunLogError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid worker topology: {0}")]
    Topology(#[from] TopologyError),

    #[error("Simulation backend failed: {0}")]
    Backend(#[from] BackendError),

    #[error("Run log failure: {0}")]
    RunLog(#[from] RunLogError),

    #[error("Worker {rank} is no longer reachable")]
    WorkerDisconnected { rank: usize },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
