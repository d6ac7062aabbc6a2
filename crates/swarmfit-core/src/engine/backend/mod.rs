//! The seam between the optimizer and the molecular simulation engine.
//!
//! The engine never touches simulation inputs or outputs directly. Everything it
//! needs from the outside world (materializing inputs, running a simulation for one
//! state point, reading back its trajectory) goes through [`SimulationBackend`].

pub mod filesystem;
#[cfg(test)]
pub(crate) mod testing;

use crate::core::io::template::TemplateError;
use crate::core::io::trajectory::TrajectoryError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub use filesystem::{BuildStep, FileSystemBackend, FileSystemLayout};

/// Identifies the working area shared by one group in one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkingArea {
    pub iteration: usize,
    pub group_id: usize,
}

impl WorkingArea {
    pub fn new(iteration: usize, group_id: usize) -> Self {
        Self {
            iteration,
            group_id,
        }
    }
}

impl fmt::Display for WorkingArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "it{}/run{}", self.iteration, self.group_id)
    }
}

/// Outcome of one external simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    /// The process exited unsuccessfully; `code` is `None` when it was killed by a signal.
    Failed { code: Option<i32> },
}

impl From<std::process::ExitStatus> for RunStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        if status.success() {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed {
                code: status.code(),
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("File I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Template substitution failed: {0}")]
    Template(#[from] TemplateError),
    #[error("Failed to read trajectory '{path}': {source}", path = path.display())]
    Trajectory {
        path: PathBuf,
        source: TrajectoryError,
    },
    #[error("Failed to launch '{program}' in '{dir}': {source}", dir = dir.display())]
    Launch {
        program: String,
        dir: PathBuf,
        source: std::io::Error,
    },
    #[error("Temperature index {index} is out of range ({count} temperatures defined)")]
    UnknownTemperature { index: usize, count: usize },
    #[error("{0}")]
    Other(String),
}

/// Everything the optimizer needs from a simulation engine.
///
/// One backend is shared by every worker thread, so implementations must be `Sync`.
/// Calls for distinct working areas or temperatures may run concurrently; calls
/// for the same working area are ordered by the group barriers.
pub trait SimulationBackend: Sync {
    /// Generates the equilibration inputs for every temperature. Called once, by
    /// the coordinator, before any worker runs.
    fn prepare_equilibration(&self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Runs the equilibration simulation for one temperature.
    fn equilibrate(&self, _temperature_index: usize) -> Result<RunStatus, BackendError> {
        Ok(RunStatus::Succeeded)
    }

    /// Materializes a fresh working area holding `parameters` for every temperature.
    ///
    /// Any previous contents of the area are discarded, so calling this twice for
    /// the same area leaves the same result.
    fn prepare_working_area(
        &self,
        area: &WorkingArea,
        parameters: &[f64],
    ) -> Result<(), BackendError>;

    /// Runs the production simulation for one temperature of a prepared area.
    fn run_simulation(
        &self,
        area: &WorkingArea,
        temperature_index: usize,
    ) -> Result<RunStatus, BackendError>;

    /// Reads the density observable, one sample per trajectory record.
    fn read_trajectory(
        &self,
        area: &WorkingArea,
        temperature_index: usize,
    ) -> Result<Vec<f64>, BackendError>;
}
