use super::particle::{Particle, compare_costs};
use nalgebra::DVector;

/// Best leader evaluation observed so far in a run.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalBest {
    pub position: DVector<f64>,
    pub parameters: DVector<f64>,
    pub densities: Vec<f64>,
    pub cost: f64,
    /// Iteration in which this candidate was evaluated.
    pub iteration: usize,
}

impl GlobalBest {
    pub fn from_particle(particle: &Particle, iteration: usize) -> Self {
        Self {
            position: particle.position().clone(),
            parameters: particle.parameters().clone(),
            densities: particle.densities().to_vec(),
            cost: particle.cost(),
            iteration,
        }
    }

    /// Replaces the incumbent if `candidate` is strictly better; ties keep the incumbent.
    /// A NaN incumbent is beaten by any numeric cost.
    pub fn offer(&mut self, candidate: &Particle, iteration: usize) -> bool {
        if compare_costs(candidate.cost(), self.cost).is_lt() {
            *self = Self::from_particle(candidate, iteration);
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationSummary {
    pub iteration: usize,
    /// Lowest leader cost evaluated in this iteration alone.
    pub iteration_best_cost: f64,
    pub global_best_cost: f64,
    pub improved: bool,
}
