//! In-memory backend used by the engine and workflow tests.

use super::{BackendError, RunStatus, SimulationBackend, WorkingArea};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

type DensityModel = Box<dyn Fn(&[f64], usize) -> f64 + Send + Sync>;

/// Produces a flat trajectory whose density is a function of the parameters and
/// the temperature index.
pub(crate) struct ScriptedBackend {
    model: DensityModel,
    records: usize,
    fail_prepare: bool,
    failing_temperatures: HashSet<usize>,
    prepared: Mutex<HashMap<WorkingArea, Vec<f64>>>,
    runs: Mutex<Vec<(WorkingArea, usize)>>,
    equilibration_prepared: AtomicBool,
    equilibrations: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(model: impl Fn(&[f64], usize) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            model: Box::new(model),
            records: 12,
            fail_prepare: false,
            failing_temperatures: HashSet::new(),
            prepared: Mutex::new(HashMap::new()),
            runs: Mutex::new(Vec::new()),
            equilibration_prepared: AtomicBool::new(false),
            equilibrations: AtomicUsize::new(0),
        }
    }

    /// Density falls with temperature and rises with the first parameter.
    pub fn linear() -> Self {
        Self::new(|parameters, t| parameters[0] / 125.0 - 0.06 * t as f64)
    }

    pub fn with_records(mut self, records: usize) -> Self {
        self.records = records;
        self
    }

    pub fn failing_preparation(mut self) -> Self {
        self.fail_prepare = true;
        self
    }

    pub fn failing_temperature(mut self, index: usize) -> Self {
        self.failing_temperatures.insert(index);
        self
    }

    pub fn runs(&self) -> Vec<(WorkingArea, usize)> {
        self.runs.lock().unwrap().clone()
    }

    pub fn prepared_areas(&self) -> HashMap<WorkingArea, Vec<f64>> {
        self.prepared.lock().unwrap().clone()
    }

    pub fn equilibrations(&self) -> usize {
        self.equilibrations.load(Ordering::SeqCst)
    }

    pub fn equilibration_prepared(&self) -> bool {
        self.equilibration_prepared.load(Ordering::SeqCst)
    }
}

impl SimulationBackend for ScriptedBackend {
    fn prepare_equilibration(&self) -> Result<(), BackendError> {
        self.equilibration_prepared.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn equilibrate(&self, temperature_index: usize) -> Result<RunStatus, BackendError> {
        if !self.equilibration_prepared() {
            return Err(BackendError::Other("equilibration inputs missing".into()));
        }
        self.equilibrations.fetch_add(1, Ordering::SeqCst);
        if self.failing_temperatures.contains(&temperature_index) {
            Ok(RunStatus::Failed { code: Some(1) })
        } else {
            Ok(RunStatus::Succeeded)
        }
    }

    fn prepare_working_area(
        &self,
        area: &WorkingArea,
        parameters: &[f64],
    ) -> Result<(), BackendError> {
        if self.fail_prepare {
            return Err(BackendError::Other("disk full".into()));
        }
        self.prepared
            .lock()
            .unwrap()
            .insert(*area, parameters.to_vec());
        Ok(())
    }

    fn run_simulation(
        &self,
        area: &WorkingArea,
        temperature_index: usize,
    ) -> Result<RunStatus, BackendError> {
        if !self.prepared.lock().unwrap().contains_key(area) {
            return Err(BackendError::Other(format!("{area} was not prepared")));
        }
        self.runs.lock().unwrap().push((*area, temperature_index));
        if self.failing_temperatures.contains(&temperature_index) {
            Ok(RunStatus::Failed { code: Some(1) })
        } else {
            Ok(RunStatus::Succeeded)
        }
    }

    fn read_trajectory(
        &self,
        area: &WorkingArea,
        temperature_index: usize,
    ) -> Result<Vec<f64>, BackendError> {
        let prepared = self.prepared.lock().unwrap();
        let parameters = prepared
            .get(area)
            .ok_or_else(|| BackendError::Other(format!("{area} was not prepared")))?;
        let density = (self.model)(parameters, temperature_index);
        Ok(vec![density; self.records])
    }
}
