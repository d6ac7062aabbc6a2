use super::config::PsoCoefficients;
use crate::core::io::run_log::RunLogRecord;
use crate::core::mapping::map_position;
use crate::core::models::parameter::ParameterSpec;
use nalgebra::DVector;
use rand::Rng;
use std::cmp::Ordering;

/// Per-component bound on the velocity, in normalized position units.
pub const MAX_VELOCITY: f64 = 0.1;

/// Cost of a particle that has not been evaluated by a group leader.
pub const UNEVALUATED_COST: f64 = f64::MAX;

/// Total order on costs in which NaN ranks after every number, infinity included.
pub fn compare_costs(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// A candidate parameter set together with its swarm state.
///
/// `parameters` is always the image of `position` under the parameter mapping;
/// the two are only ever changed together.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    position: DVector<f64>,
    velocity: DVector<f64>,
    parameters: DVector<f64>,
    densities: Vec<f64>,
    cost: f64,
    best_position: DVector<f64>,
    best_cost: f64,
}

fn uniform_vector(dimension: usize, rng: &mut impl Rng) -> DVector<f64> {
    DVector::from_fn(dimension, |_, _| rng.random_range(0.0..=1.0))
}

impl Particle {
    /// Places an unevaluated particle at rest at `position`, clamped into the unit cube.
    pub fn new(position: DVector<f64>, specs: &[ParameterSpec]) -> Self {
        let position = position.map(|x| x.clamp(0.0, 1.0));
        let parameters = map_position(specs, &position);
        Self {
            velocity: DVector::zeros(position.len()),
            best_position: position.clone(),
            parameters,
            position,
            densities: Vec::new(),
            cost: UNEVALUATED_COST,
            best_cost: UNEVALUATED_COST,
        }
    }

    /// Places a particle uniformly at random in the unit cube.
    pub fn random(specs: &[ParameterSpec], rng: &mut impl Rng) -> Self {
        Self::new(uniform_vector(specs.len(), rng), specs)
    }

    pub fn position(&self) -> &DVector<f64> {
        &self.position
    }

    pub fn velocity(&self) -> &DVector<f64> {
        &self.velocity
    }

    pub fn parameters(&self) -> &DVector<f64> {
        &self.parameters
    }

    /// Simulated densities from the last leader evaluation; empty before that.
    pub fn densities(&self) -> &[f64] {
        &self.densities
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn best_position(&self) -> &DVector<f64> {
        &self.best_position
    }

    pub fn best_cost(&self) -> f64 {
        self.best_cost
    }

    pub fn is_evaluated(&self) -> bool {
        self.cost != UNEVALUATED_COST || !self.densities.is_empty()
    }

    /// `v ← w·v + c1·r1∘(p_best − x) + c2·r2∘(g_best − x)`, clamped to `±MAX_VELOCITY`.
    ///
    /// `r1` and `r2` are drawn independently per dimension from `[0, 1]`.
    pub fn update_velocity(
        &mut self,
        coefficients: &PsoCoefficients,
        global_best: &DVector<f64>,
        rng: &mut impl Rng,
    ) {
        let dimension = self.position.len();
        let r1 = uniform_vector(dimension, rng);
        let r2 = uniform_vector(dimension, rng);

        let cognitive = r1.component_mul(&(&self.best_position - &self.position));
        let social = r2.component_mul(&(global_best - &self.position));
        let velocity = &self.velocity * coefficients.inertia
            + cognitive * coefficients.cognitive
            + social * coefficients.social;

        self.velocity = velocity.map(|v| v.clamp(-MAX_VELOCITY, MAX_VELOCITY));
    }

    /// `x ← clamp(x + v, 0, 1)`, then re-derives the physical parameters.
    pub fn update_position(&mut self, specs: &[ParameterSpec]) {
        self.position = (&self.position + &self.velocity).map(|x| x.clamp(0.0, 1.0));
        self.parameters = map_position(specs, &self.position);
    }

    /// Stores the outcome of a leader evaluation.
    pub fn record_evaluation(&mut self, densities: Vec<f64>, cost: f64) {
        self.densities = densities;
        self.cost = cost;
    }

    /// Adopts the current position as personal best if its cost is strictly lower.
    pub fn update_personal_best(&mut self) -> bool {
        if compare_costs(self.cost, self.best_cost).is_lt() {
            self.best_cost = self.cost;
            self.best_position = self.position.clone();
            true
        } else {
            false
        }
    }

    pub fn to_log_record(&self, iteration: usize) -> RunLogRecord {
        RunLogRecord::new(
            iteration,
            self.position.as_slice(),
            self.parameters.as_slice(),
            &self.densities,
            self.velocity.as_slice(),
            self.best_position.as_slice(),
            self.cost,
        )
    }

    #[cfg(test)]
    pub(crate) fn with_velocity(mut self, velocity: DVector<f64>) -> Self {
        self.velocity = velocity;
        self
    }
}
