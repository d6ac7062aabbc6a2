use crate::core::models::parameter::ParameterSpec;
use crate::core::models::temperature::TemperatureSpec;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("At least one entry is required in '{0}'")]
    Empty(&'static str),
    #[error("Parameter '{name}' must have finite bounds with start <= end")]
    InvalidBounds { name: String },
    #[error("Parameter '{name}' has an empty substitution pattern")]
    EmptyPattern { name: String },
    #[error("Target density at {temperature} K must be a positive number")]
    InvalidTargetDensity { temperature: String },
    #[error("Temperature {0} K is listed more than once")]
    DuplicateTemperature(String),
    #[error("Population must contain at least one particle")]
    EmptyPopulation,
}

/// Weights of the particle-swarm velocity update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PsoCoefficients {
    /// Inertia `w` applied to the previous velocity.
    pub inertia: f64,
    /// Cognitive weight `c1` pulling towards the personal best.
    pub cognitive: f64,
    /// Social weight `c2` pulling towards the global best.
    pub social: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationConfig {
    pub parameters: Vec<ParameterSpec>,
    pub temperatures: Vec<TemperatureSpec>,
    pub coefficients: PsoCoefficients,
    /// Number of update iterations after the initial evaluation.
    pub max_iterations: usize,
    /// Number of particles evaluated per iteration (one per group).
    pub population: usize,
    /// Size of the worker pool; every group has one worker per temperature.
    pub workers: usize,
    pub seed: Option<u64>,
    pub equilibrate: bool,
    pub run_log_path: Option<PathBuf>,
}

impl OptimizationConfig {
    /// Number of workers cooperating on one particle.
    pub fn group_size(&self) -> usize {
        self.temperatures.len()
    }

    pub fn dimension(&self) -> usize {
        self.parameters.len()
    }

    pub fn target_densities(&self) -> Vec<f64> {
        self.temperatures.iter().map(|t| t.target_density).collect()
    }

    pub fn temperature_values(&self) -> Vec<f64> {
        self.temperatures.iter().map(|t| t.temperature).collect()
    }
}

#[derive(Default)]
pub struct OptimizationConfigBuilder {
    parameters: Option<Vec<ParameterSpec>>,
    temperatures: Option<Vec<TemperatureSpec>>,
    coefficients: Option<PsoCoefficients>,
    max_iterations: Option<usize>,
    population: Option<usize>,
    workers: Option<usize>,
    seed: Option<u64>,
    equilibrate: bool,
    run_log_path: Option<PathBuf>,
}

impl OptimizationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parameters(mut self, parameters: Vec<ParameterSpec>) -> Self {
        self.parameters = Some(parameters);
        self
    }
    pub fn temperatures(mut self, temperatures: Vec<TemperatureSpec>) -> Self {
        self.temperatures = Some(temperatures);
        self
    }
    pub fn coefficients(mut self, coefficients: PsoCoefficients) -> Self {
        self.coefficients = Some(coefficients);
        self
    }
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
    pub fn population(mut self, population: usize) -> Self {
        self.population = Some(population);
        self
    }
    pub fn workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
    pub fn equilibrate(mut self, enabled: bool) -> Self {
        self.equilibrate = enabled;
        self
    }
    pub fn run_log_path(mut self, path: Option<PathBuf>) -> Self {
        self.run_log_path = path;
        self
    }

    /// Assembles the configuration, validating the problem description.
    ///
    /// The worker count defaults to `population × temperatures`. Whether an explicit
    /// worker count fits the population is checked when the worker topology is built.
    pub fn build(self) -> Result<OptimizationConfig, ConfigError> {
        let parameters = self
            .parameters
            .ok_or(ConfigError::MissingParameter("parameters"))?;
        let temperatures = self
            .temperatures
            .ok_or(ConfigError::MissingParameter("temperatures"))?;
        let coefficients = self
            .coefficients
            .ok_or(ConfigError::MissingParameter("coefficients"))?;
        let max_iterations = self
            .max_iterations
            .ok_or(ConfigError::MissingParameter("max_iterations"))?;
        let population = self
            .population
            .ok_or(ConfigError::MissingParameter("population"))?;

        validate_parameters(&parameters)?;
        validate_temperatures(&temperatures)?;
        if population == 0 {
            return Err(ConfigError::EmptyPopulation);
        }

        let workers = self
            .workers
            .unwrap_or(population * temperatures.len());

        Ok(OptimizationConfig {
            parameters,
            temperatures,
            coefficients,
            max_iterations,
            population,
            workers,
            seed: self.seed,
            equilibrate: self.equilibrate,
            run_log_path: self.run_log_path,
        })
    }
}

fn validate_parameters(parameters: &[ParameterSpec]) -> Result<(), ConfigError> {
    if parameters.is_empty() {
        return Err(ConfigError::Empty("parameters"));
    }
    for spec in parameters {
        if !spec.has_valid_bounds() {
            return Err(ConfigError::InvalidBounds {
                name: spec.name.clone(),
            });
        }
        if spec.pattern.is_empty() {
            return Err(ConfigError::EmptyPattern {
                name: spec.name.clone(),
            });
        }
    }
    Ok(())
}

fn validate_temperatures(temperatures: &[TemperatureSpec]) -> Result<(), ConfigError> {
    if temperatures.is_empty() {
        return Err(ConfigError::Empty("temperatures"));
    }
    for (i, spec) in temperatures.iter().enumerate() {
        if !(spec.target_density.is_finite() && spec.target_density > 0.0) {
            return Err(ConfigError::InvalidTargetDensity {
                temperature: spec.label(),
            });
        }
        if temperatures[..i]
            .iter()
            .any(|other| other.temperature == spec.temperature)
        {
            return Err(ConfigError::DuplicateTemperature(spec.label()));
        }
    }
    Ok(())
}
