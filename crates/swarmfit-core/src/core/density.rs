//! Reduction of a simulated density trajectory to a single equilibrium estimate.

/// Density reported for a state point whose simulation produced no usable output.
///
/// Large enough to push the particle's cost far above any physical candidate while
/// keeping it finite, so the particle stays in the swarm but is never preferred.
pub const FAILED_DENSITY: f64 = 9999.0;

/// Trajectories shorter than this are treated as failed runs.
pub const MIN_TRAJECTORY_RECORDS: usize = 10;

/// Fraction of the trajectory, counted from the start, discarded before averaging.
pub const DISCARDED_FRACTION: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DensityEstimate {
    /// Mean of the observable over the trailing window.
    Averaged { density: f64, window: usize },
    /// The trajectory was too short to trust.
    Insufficient { records: usize },
    /// The averaging window held a NaN or infinite sample.
    NonFinite { window: usize },
}

impl DensityEstimate {
    /// Averages the trailing fifth of `samples`, or reports it as insufficient.
    pub fn from_samples(samples: &[f64]) -> Self {
        let records = samples.len();
        if records < MIN_TRAJECTORY_RECORDS {
            return Self::Insufficient { records };
        }
        let start = (records as f64 * DISCARDED_FRACTION) as usize;
        let window = &samples[start..];
        let density = window.iter().sum::<f64>() / window.len() as f64;
        if !density.is_finite() {
            return Self::NonFinite {
                window: window.len(),
            };
        }
        Self::Averaged {
            density,
            window: window.len(),
        }
    }

    /// The density fed into the cost function.
    pub fn value(&self) -> f64 {
        match *self {
            Self::Averaged { density, .. } => density,
            Self::Insufficient { .. } | Self::NonFinite { .. } => FAILED_DENSITY,
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Averaged { .. })
    }
}
