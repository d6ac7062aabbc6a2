mod defaults;

use crate::cli::ConfigOverrides;
use crate::error::{CliError, Result};
use defaults::DefaultsConfig;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use swarmfit::core::models::parameter::{ParameterKind, ParameterSpec};
use swarmfit::core::models::system::SystemSpec;
use swarmfit::core::models::temperature::{Substitution, TemperatureSpec};
use swarmfit::engine::backend::{BuildStep, FileSystemLayout};
use swarmfit::engine::config::{OptimizationConfig, OptimizationConfigBuilder, PsoCoefficients};
use swarmfit::engine::error::EngineError;
use tracing::debug;

/// Fully merged configuration handed to the commands.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub core: OptimizationConfig,
    pub layout: FileSystemLayout,
    pub system: SystemSpec,
}

/// A scalar written into templated inputs. Strings are kept verbatim; numbers are
/// re-rendered by their `Display` form, so `44.0` becomes `44` and `1e3` becomes `1000`.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum TextValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl fmt::Display for TextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextValue::Text(s) => write!(f, "{}", s),
            TextValue::Integer(i) => write!(f, "{}", i),
            TextValue::Float(x) => write!(f, "{}", x),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct PartialSubstitution {
    value: TextValue,
    pattern: String,
}

impl From<PartialSubstitution> for Substitution {
    fn from(p: PartialSubstitution) -> Self {
        Substitution::new(p.value.to_string(), p.pattern)
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialOptimizationConfig {
    #[serde(rename = "max-iterations")]
    max_iterations: Option<usize>,
    population: Option<usize>,
    workers: Option<usize>,
    seed: Option<u64>,
    equilibrate: Option<bool>,
    #[serde(rename = "run-log")]
    run_log: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialPsoConfig {
    w: Option<f64>,
    c1: Option<f64>,
    c2: Option<f64>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct PartialSystemConfig {
    molecule: PartialSubstitution,
    residue: PartialSubstitution,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct PartialBuildStep {
    program: String,
    #[serde(default)]
    args: Vec<String>,
    stdin: Option<String>,
}

impl From<PartialBuildStep> for BuildStep {
    fn from(p: PartialBuildStep) -> Self {
        Self {
            program: p.program,
            args: p.args,
            stdin: p.stdin,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialSimulationConfig {
    root: Option<PathBuf>,
    #[serde(rename = "build-dir")]
    build_dir: Option<PathBuf>,
    #[serde(rename = "equilibration-dir")]
    equilibration_dir: Option<PathBuf>,
    #[serde(rename = "runs-dir")]
    runs_dir: Option<PathBuf>,
    executable: Option<String>,
    #[serde(rename = "equilibration-input")]
    equilibration_input: Option<String>,
    #[serde(rename = "production-input")]
    production_input: Option<String>,
    #[serde(rename = "parameter-file")]
    parameter_file: Option<String>,
    #[serde(rename = "packing-input")]
    packing_input: Option<String>,
    #[serde(rename = "build-script")]
    build_script: Option<String>,
    #[serde(rename = "trajectory-file")]
    trajectory_file: Option<String>,
    #[serde(rename = "density-column")]
    density_column: Option<usize>,
    #[serde(rename = "phase-dir")]
    phase_dir: Option<String>,
    #[serde(rename = "build-steps")]
    build_steps: Option<Vec<PartialBuildStep>>,
    launcher: Option<Vec<String>>,
}

impl PartialSimulationConfig {
    fn into_layout(self) -> FileSystemLayout {
        let d = FileSystemLayout::default();
        FileSystemLayout {
            root: self.root.unwrap_or(d.root),
            build_dir: self.build_dir.unwrap_or(d.build_dir),
            equilibration_dir: self.equilibration_dir.unwrap_or(d.equilibration_dir),
            runs_dir: self.runs_dir.unwrap_or(d.runs_dir),
            executable: self.executable.unwrap_or(d.executable),
            equilibration_input: self.equilibration_input.unwrap_or(d.equilibration_input),
            production_input: self.production_input.unwrap_or(d.production_input),
            parameter_file: self.parameter_file.unwrap_or(d.parameter_file),
            packing_input: self.packing_input.unwrap_or(d.packing_input),
            build_script: self.build_script.unwrap_or(d.build_script),
            trajectory_file: self.trajectory_file.unwrap_or(d.trajectory_file),
            density_column: self.density_column.unwrap_or(d.density_column),
            phase_dir: self.phase_dir.unwrap_or(d.phase_dir),
            build_steps: self
                .build_steps
                .map(|steps| steps.into_iter().map(Into::into).collect())
                .unwrap_or(d.build_steps),
            launcher: self.launcher.unwrap_or(d.launcher),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct PartialParameter {
    name: String,
    kind: ParameterKind,
    start: f64,
    end: f64,
    pattern: String,
    reference: TextValue,
}

impl From<PartialParameter> for ParameterSpec {
    fn from(p: PartialParameter) -> Self {
        ParameterSpec::new(
            p.name,
            p.kind,
            p.start,
            p.end,
            p.pattern,
            p.reference.to_string(),
        )
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct PartialTemperature {
    temperature: f64,
    pattern: String,
    #[serde(rename = "target-density")]
    target_density: f64,
    pressure: PartialSubstitution,
    #[serde(rename = "molecule-count")]
    molecule_count: PartialSubstitution,
    #[serde(rename = "box-size")]
    box_size: PartialSubstitution,
    #[serde(rename = "equilibration-steps")]
    equilibration_steps: PartialSubstitution,
    #[serde(rename = "production-steps")]
    production_steps: PartialSubstitution,
}

impl From<PartialTemperature> for TemperatureSpec {
    fn from(p: PartialTemperature) -> Self {
        TemperatureSpec {
            temperature: p.temperature,
            temperature_pattern: p.pattern,
            target_density: p.target_density,
            pressure: p.pressure.into(),
            molecule_count: p.molecule_count.into(),
            box_size: p.box_size.into(),
            equilibration_steps: p.equilibration_steps.into(),
            production_steps: p.production_steps.into(),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialAppConfig {
    optimization: Option<PartialOptimizationConfig>,
    pso: Option<PartialPsoConfig>,
    system: Option<PartialSystemConfig>,
    simulation: Option<PartialSimulationConfig>,
    #[serde(default)]
    parameters: Vec<PartialParameter>,
    #[serde(default)]
    temperatures: Vec<PartialTemperature>,
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

impl PartialAppConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn merge_with_cli(mut self, overrides: &ConfigOverrides) -> Result<AppConfig> {
        self.apply_set_values(&overrides.set_values)?;
        let defaults = DefaultsConfig::default();

        let opt_config = self.optimization.take().unwrap_or_default();
        let pso_config = self
            .pso
            .take()
            .ok_or_else(|| CliError::Config("`pso` section is required.".to_string()))?;
        let coefficients = PsoCoefficients {
            inertia: pso_config
                .w
                .ok_or_else(|| CliError::Config("`pso.w` is required.".to_string()))?,
            cognitive: pso_config
                .c1
                .ok_or_else(|| CliError::Config("`pso.c1` is required.".to_string()))?,
            social: pso_config
                .c2
                .ok_or_else(|| CliError::Config("`pso.c2` is required.".to_string()))?,
        };

        let system_config = self
            .system
            .take()
            .ok_or_else(|| CliError::Config("`system` section is required.".to_string()))?;
        let system = SystemSpec {
            molecule_name: system_config.molecule.into(),
            residue_name: system_config.residue.into(),
        };

        let mut layout = self.simulation.take().unwrap_or_default().into_layout();
        if let Some(root) = &overrides.root {
            layout.root = root.clone();
        }

        let equilibrate = overrides
            .equilibration
            .forced()
            .or(opt_config.equilibrate)
            .unwrap_or(defaults.equilibrate);

        let core = OptimizationConfigBuilder::new()
            .parameters(self.parameters.into_iter().map(Into::into).collect())
            .temperatures(self.temperatures.into_iter().map(Into::into).collect())
            .coefficients(coefficients)
            .max_iterations(
                overrides
                    .max_iterations
                    .or(opt_config.max_iterations)
                    .unwrap_or(defaults.max_iterations),
            )
            .population(
                overrides
                    .population
                    .or(opt_config.population)
                    .unwrap_or(defaults.population),
            )
            .workers(overrides.workers.or(opt_config.workers))
            .seed(overrides.seed.or(opt_config.seed))
            .equilibrate(equilibrate)
            .run_log_path(overrides.run_log.clone().or(opt_config.run_log))
            .build()
            .map_err(EngineError::from)?;

        Ok(AppConfig {
            core,
            layout,
            system,
        })
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            match key {
                "optimization.max-iterations" => {
                    self.optimization
                        .get_or_insert_with(Default::default)
                        .max_iterations = Some(parse_value(key, value_str, "integer")?);
                }
                "optimization.population" => {
                    self.optimization
                        .get_or_insert_with(Default::default)
                        .population = Some(parse_value(key, value_str, "integer")?);
                }
                "optimization.workers" => {
                    self.optimization
                        .get_or_insert_with(Default::default)
                        .workers = Some(parse_value(key, value_str, "integer")?);
                }
                "optimization.seed" => {
                    self.optimization
                        .get_or_insert_with(Default::default)
                        .seed = Some(parse_value(key, value_str, "integer")?);
                }
                "optimization.equilibrate" => {
                    self.optimization
                        .get_or_insert_with(Default::default)
                        .equilibrate = Some(parse_value(key, value_str, "boolean")?);
                }
                "optimization.run-log" => {
                    self.optimization
                        .get_or_insert_with(Default::default)
                        .run_log = Some(PathBuf::from(value_str));
                }
                "pso.w" => {
                    self.pso.get_or_insert_with(Default::default).w =
                        Some(parse_value(key, value_str, "float")?);
                }
                "pso.c1" => {
                    self.pso.get_or_insert_with(Default::default).c1 =
                        Some(parse_value(key, value_str, "float")?);
                }
                "pso.c2" => {
                    self.pso.get_or_insert_with(Default::default).c2 =
                        Some(parse_value(key, value_str, "float")?);
                }
                "simulation.root" => {
                    self.simulation.get_or_insert_with(Default::default).root =
                        Some(PathBuf::from(value_str));
                }
                "simulation.executable" => {
                    self.simulation
                        .get_or_insert_with(Default::default)
                        .executable = Some(value_str.to_string());
                }
                "simulation.density-column" => {
                    self.simulation
                        .get_or_insert_with(Default::default)
                        .density_column = Some(parse_value(key, value_str, "integer")?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}
