use super::{BackendError, RunStatus, SimulationBackend, WorkingArea};
use crate::core::io::template::substitute_in_file;
use crate::core::io::trajectory::{DEFAULT_DENSITY_COLUMN, read_observable_from_path};
use crate::core::models::parameter::ParameterSpec;
use crate::core::models::system::SystemSpec;
use crate::core::models::temperature::TemperatureSpec;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, instrument, warn};

const MODEL_DIR: &str = "model";
const PACK_DIR: &str = "pack";
const PDB_DIR: &str = "pdb";
const SIM_DIR: &str = "sim";

const SIMULATION_LOG: &str = "out.log";
const BUILD_LOG: &str = "build_error.log";

/// An external program run in every equilibration directory after the
/// templates are filled in, e.g. a packing tool followed by a structure builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    /// Program name looked up on `PATH`, or a path relative to the state-point directory.
    pub program: String,
    pub args: Vec<String>,
    /// File in the state-point directory fed to the program on stdin.
    pub stdin: Option<String>,
}

impl BuildStep {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_stdin(mut self, file: impl Into<String>) -> Self {
        self.stdin = Some(file.into());
        self
    }
}

/// Where the simulation inputs live and how the engine is invoked.
///
/// ```text
/// <root>/<build_dir>/{model,pack,pdb,sim}/     templates
/// <root>/<equilibration_dir>/T_<label>/<phase_dir>/
/// <root>/<runs_dir>/it<N>/run<group>/T_<label>/<phase_dir>/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemLayout {
    pub root: PathBuf,
    pub build_dir: PathBuf,
    pub equilibration_dir: PathBuf,
    pub runs_dir: PathBuf,
    /// Simulation engine executable, copied from the `sim` template directory.
    pub executable: String,
    pub equilibration_input: String,
    pub production_input: String,
    pub parameter_file: String,
    pub packing_input: String,
    pub build_script: String,
    pub trajectory_file: String,
    /// Column of the trajectory table holding the density.
    pub density_column: usize,
    pub phase_dir: String,
    pub build_steps: Vec<BuildStep>,
    /// Command prefix for the engine, e.g. `["mpirun", "-n", "1"]`. Empty runs it directly.
    pub launcher: Vec<String>,
}

impl Default for FileSystemLayout {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            build_dir: PathBuf::from("BUILD"),
            equilibration_dir: PathBuf::from("Equilibrate"),
            runs_dir: PathBuf::from("runs"),
            executable: "GOMC_CPU_NPT".to_string(),
            equilibration_input: "eq.conf".to_string(),
            production_input: "in.conf".to_string(),
            parameter_file: "Parameters.par".to_string(),
            packing_input: "pack.inp".to_string(),
            build_script: "build.tcl".to_string(),
            trajectory_file: "Blk_PRODUCTION_BOX_0.dat".to_string(),
            density_column: DEFAULT_DENSITY_COLUMN,
            phase_dir: "Liq".to_string(),
            build_steps: vec![
                BuildStep::new("./packmol").with_stdin("pack.inp"),
                BuildStep::new("vmd")
                    .with_args(["-dispdev", "text"])
                    .with_stdin("build.tcl"),
            ],
            launcher: Vec::new(),
        }
    }
}

impl FileSystemLayout {
    pub fn template_path(&self, template: &str) -> PathBuf {
        self.root.join(&self.build_dir).join(template)
    }

    pub fn equilibration_root(&self) -> PathBuf {
        self.root.join(&self.equilibration_dir)
    }

    pub fn equilibration_path(&self, temperature: &TemperatureSpec) -> PathBuf {
        self.equilibration_root()
            .join(temperature.directory_name())
            .join(&self.phase_dir)
    }

    pub fn area_path(&self, area: &WorkingArea) -> PathBuf {
        self.root
            .join(&self.runs_dir)
            .join(format!("it{}", area.iteration))
            .join(format!("run{}", area.group_id))
    }

    pub fn state_point_path(&self, area: &WorkingArea, temperature: &TemperatureSpec) -> PathBuf {
        self.area_path(area)
            .join(temperature.directory_name())
            .join(&self.phase_dir)
    }
}

/// Drives an external, file-based simulation engine through templated inputs.
#[derive(Debug, Clone)]
pub struct FileSystemBackend {
    layout: FileSystemLayout,
    system: SystemSpec,
    parameters: Vec<ParameterSpec>,
    temperatures: Vec<TemperatureSpec>,
}

fn io_at(path: &Path) -> impl FnOnce(io::Error) -> BackendError + '_ {
    move |source| BackendError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl FileSystemBackend {
    /// Creates the backend; `layout.root` is resolved to an absolute path.
    pub fn new(
        mut layout: FileSystemLayout,
        system: SystemSpec,
        parameters: Vec<ParameterSpec>,
        temperatures: Vec<TemperatureSpec>,
    ) -> Result<Self, BackendError> {
        layout.root = std::path::absolute(&layout.root).map_err(io_at(&layout.root))?;
        Ok(Self {
            layout,
            system,
            parameters,
            temperatures,
        })
    }

    pub fn layout(&self) -> &FileSystemLayout {
        &self.layout
    }

    fn temperature(&self, index: usize) -> Result<&TemperatureSpec, BackendError> {
        self.temperatures
            .get(index)
            .ok_or(BackendError::UnknownTemperature {
                index,
                count: self.temperatures.len(),
            })
    }

    fn fill_equilibration_templates(
        &self,
        dir: &Path,
        temperature: &TemperatureSpec,
    ) -> Result<(), BackendError> {
        let packing = dir.join(&self.layout.packing_input);
        if packing.is_file() {
            substitute_in_file(
                &packing,
                &[
                    (
                        &self.system.molecule_name.pattern,
                        &self.system.molecule_name.value,
                    ),
                    (
                        &temperature.molecule_count.pattern,
                        &temperature.molecule_count.value,
                    ),
                    (&temperature.box_size.pattern, &temperature.box_size.value),
                ],
            )?;
        } else {
            debug!(path = %packing.display(), "No packing input to fill in.");
        }

        let script = dir.join(&self.layout.build_script);
        if script.is_file() {
            substitute_in_file(
                &script,
                &[(
                    &self.system.residue_name.pattern,
                    &self.system.residue_name.value,
                )],
            )?;
        } else {
            debug!(path = %script.display(), "No build script to fill in.");
        }

        let references: Vec<(&str, &str)> = self
            .parameters
            .iter()
            .map(|spec| (spec.pattern.as_str(), spec.reference.as_str()))
            .collect();
        substitute_in_file(&dir.join(&self.layout.parameter_file), &references)?;
        Ok(())
    }

    fn run_build_step(&self, step: &BuildStep, dir: &Path) -> Result<(), BackendError> {
        let log_path = dir.join(BUILD_LOG);
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(io_at(&log_path))?;
        let err_log = log.try_clone().map_err(io_at(&log_path))?;

        let program = resolve_program(&step.program, dir);
        if program.starts_with(dir) && program.is_file() {
            make_executable(&program)?;
        }

        let mut command = Command::new(&program);
        command
            .args(&step.args)
            .current_dir(dir)
            .stdout(log)
            .stderr(err_log);
        match &step.stdin {
            Some(input) => {
                let input_path = dir.join(input);
                let file = File::open(&input_path).map_err(io_at(&input_path))?;
                command.stdin(file);
            }
            None => {
                command.stdin(Stdio::null());
            }
        }

        let status = command.status().map_err(|source| BackendError::Launch {
            program: step.program.clone(),
            dir: dir.to_path_buf(),
            source,
        })?;
        if !status.success() {
            warn!(
                program = %step.program,
                dir = %dir.display(),
                code = ?status.code(),
                "Build step exited unsuccessfully; see {}.",
                BUILD_LOG
            );
        }
        Ok(())
    }

    /// Copies the engine executable and one input file from the `sim` templates.
    fn stage_engine(&self, dir: &Path, input: &str) -> Result<(), BackendError> {
        let sim = self.layout.template_path(SIM_DIR);
        let executable = dir.join(&self.layout.executable);
        copy_file(&sim.join(&self.layout.executable), &executable)?;
        make_executable(&executable)?;
        copy_file(&sim.join(input), &dir.join(input))
    }

    fn launch(&self, dir: &Path, input: &str) -> Result<RunStatus, BackendError> {
        let executable = dir.join(&self.layout.executable);
        let log_path = dir.join(SIMULATION_LOG);
        let log = File::create(&log_path).map_err(io_at(&log_path))?;
        let err_log = log.try_clone().map_err(io_at(&log_path))?;

        let mut command = match self.layout.launcher.split_first() {
            Some((program, args)) => {
                let mut command = Command::new(program);
                command.args(args).arg(&executable);
                command
            }
            None => Command::new(&executable),
        };
        let status = command
            .arg(input)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(err_log)
            .status()
            .map_err(|source| BackendError::Launch {
                program: self.layout.executable.clone(),
                dir: dir.to_path_buf(),
                source,
            })?;
        Ok(status.into())
    }
}

impl SimulationBackend for FileSystemBackend {
    #[instrument(skip_all, name = "prepare_equilibration")]
    fn prepare_equilibration(&self) -> Result<(), BackendError> {
        let root = self.layout.equilibration_root();
        remove_dir_if_exists(&root)?;

        for temperature in &self.temperatures {
            let dir = self.layout.equilibration_path(temperature);
            info!(temperature = %temperature.label(), dir = %dir.display(), "Generating equilibration inputs.");
            for template in [MODEL_DIR, PACK_DIR, PDB_DIR] {
                copy_dir_contents(&self.layout.template_path(template), &dir)?;
            }
            self.fill_equilibration_templates(&dir, temperature)?;
            for step in &self.layout.build_steps {
                self.run_build_step(step, &dir)?;
            }
        }
        Ok(())
    }

    #[instrument(skip(self), name = "equilibrate")]
    fn equilibrate(&self, temperature_index: usize) -> Result<RunStatus, BackendError> {
        let temperature = self.temperature(temperature_index)?;
        let dir = self.layout.equilibration_path(temperature);
        fs::create_dir_all(&dir).map_err(io_at(&dir))?;

        let input = &self.layout.equilibration_input;
        self.stage_engine(&dir, input)?;
        let temperature_sub = temperature.temperature_substitution();
        substitute_in_file(
            &dir.join(input),
            &[
                (&temperature.pressure.pattern, &temperature.pressure.value),
                (&temperature_sub.pattern, &temperature_sub.value),
                (
                    &temperature.equilibration_steps.pattern,
                    &temperature.equilibration_steps.value,
                ),
                (&temperature.box_size.pattern, &temperature.box_size.value),
            ],
        )?;

        info!(temperature = %temperature.label(), "Running equilibration simulation.");
        self.launch(&dir, input)
    }

    fn prepare_working_area(
        &self,
        area: &WorkingArea,
        parameters: &[f64],
    ) -> Result<(), BackendError> {
        if parameters.len() != self.parameters.len() {
            return Err(BackendError::Other(format!(
                "received {} parameter values for {} parameters",
                parameters.len(),
                self.parameters.len()
            )));
        }

        let area_dir = self.layout.area_path(area);
        remove_dir_if_exists(&area_dir)?;
        copy_dir_contents(&self.layout.equilibration_root(), &area_dir)?;

        let values: Vec<(&str, String)> = self
            .parameters
            .iter()
            .zip(parameters)
            .map(|(spec, value)| (spec.pattern.as_str(), value.to_string()))
            .collect();
        let model = self.layout.template_path(MODEL_DIR);
        let input = &self.layout.production_input;

        for temperature in &self.temperatures {
            let dir = self.layout.state_point_path(area, temperature);
            fs::create_dir_all(&dir).map_err(io_at(&dir))?;
            self.stage_engine(&dir, input)?;
            copy_file(
                &model.join(&self.layout.parameter_file),
                &dir.join(&self.layout.parameter_file),
            )?;

            let temperature_sub = temperature.temperature_substitution();
            substitute_in_file(
                &dir.join(input),
                &[
                    (
                        &temperature.production_steps.pattern,
                        &temperature.production_steps.value,
                    ),
                    (&temperature_sub.pattern, &temperature_sub.value),
                    (&temperature.pressure.pattern, &temperature.pressure.value),
                    (&temperature.box_size.pattern, &temperature.box_size.value),
                ],
            )?;
            substitute_in_file(&dir.join(&self.layout.parameter_file), &values)?;
        }
        debug!(area = %area, "Working area prepared.");
        Ok(())
    }

    fn run_simulation(
        &self,
        area: &WorkingArea,
        temperature_index: usize,
    ) -> Result<RunStatus, BackendError> {
        let temperature = self.temperature(temperature_index)?;
        let dir = self.layout.state_point_path(area, temperature);
        self.launch(&dir, &self.layout.production_input)
    }

    fn read_trajectory(
        &self,
        area: &WorkingArea,
        temperature_index: usize,
    ) -> Result<Vec<f64>, BackendError> {
        let temperature = self.temperature(temperature_index)?;
        let path = self
            .layout
            .state_point_path(area, temperature)
            .join(&self.layout.trajectory_file);
        read_observable_from_path(&path, self.layout.density_column)
            .map_err(|source| BackendError::Trajectory { path, source })
    }
}

/// Programs given with a directory component are resolved against `dir`;
/// bare names are left for a `PATH` lookup.
fn resolve_program(program: &str, dir: &Path) -> PathBuf {
    let path = Path::new(program);
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<(), BackendError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_at(path)(e)),
    }
}

fn copy_file(from: &Path, to: &Path) -> Result<(), BackendError> {
    fs::copy(from, to).map_err(io_at(from))?;
    Ok(())
}

/// Recursively copies the contents of `src` into `dst`, creating `dst` as needed.
fn copy_dir_contents(src: &Path, dst: &Path) -> Result<(), BackendError> {
    fs::create_dir_all(dst).map_err(io_at(dst))?;
    for entry in fs::read_dir(src).map_err(io_at(src))? {
        let entry = entry.map_err(io_at(src))?;
        let source = entry.path();
        let target = dst.join(entry.file_name());
        if entry.file_type().map_err(io_at(&source))?.is_dir() {
            copy_dir_contents(&source, &target)?;
        } else {
            copy_file(&source, &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), BackendError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o775)).map_err(io_at(path))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), BackendError> {
    Ok(())
}
