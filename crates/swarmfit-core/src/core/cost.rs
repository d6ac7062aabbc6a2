//! Density-matching fitness used to rank candidate parameter sets.

use itertools::Itertools;
use thiserror::Error;

/// Weight of the summed relative density errors.
pub const LIQUID_COEFFICIENT: f64 = 0.91;
/// Weight of the summed error-versus-temperature slopes.
pub const SLOPE_COEFFICIENT: f64 = 0.09;

#[derive(Debug, Error, PartialEq)]
pub enum CostError {
    #[error("No state points were supplied to the cost function")]
    Empty,
    #[error(
        "Mismatched inputs: {simulated} simulated densities, {targets} targets, {temperatures} temperatures"
    )]
    LengthMismatch {
        simulated: usize,
        targets: usize,
        temperatures: usize,
    },
}

/// Relative error of each simulated density against its target.
pub fn relative_errors(simulated: &[f64], targets: &[f64]) -> Vec<f64> {
    simulated
        .iter()
        .zip(targets)
        .map(|(&sim, &target)| (sim - target).abs() / target)
        .collect()
}

/// Sum of the finite-difference slopes of `errors` along `temperatures`.
///
/// A single state point has no slope and contributes zero.
pub fn slope_sum(errors: &[f64], temperatures: &[f64]) -> f64 {
    errors
        .iter()
        .zip(temperatures)
        .tuple_windows()
        .map(|((&e0, &t0), (&e1, &t1))| (e1 - e0) / (t1 - t0))
        .sum()
}

/// Combines the relative density error and its temperature slope into one cost.
///
/// All three slices are indexed by the same temperature order. Lower is better;
/// an exact match at every temperature costs zero.
pub fn density_cost(
    simulated: &[f64],
    targets: &[f64],
    temperatures: &[f64],
) -> Result<f64, CostError> {
    if simulated.len() != targets.len() || simulated.len() != temperatures.len() {
        return Err(CostError::LengthMismatch {
            simulated: simulated.len(),
            targets: targets.len(),
            temperatures: temperatures.len(),
        });
    }
    if simulated.is_empty() {
        return Err(CostError::Empty);
    }

    let errors = relative_errors(simulated, targets);
    let error_sum: f64 = errors.iter().sum();
    Ok(LIQUID_COEFFICIENT * error_sum + SLOPE_COEFFICIENT * slope_sum(&errors, temperatures))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn exact_densities_cost_nothing() {
        let targets = [0.80, 0.76, 0.71];
        let cost = density_cost(&targets, &targets, &[280.0, 300.0, 320.0]).unwrap();
        assert_eq!(cost, 0.0);
    }

    #[test]
    fn equal_relative_errors_have_no_slope_contribution() {
        let targets = [0.8, 0.5];
        let simulated = [0.88, 0.55];
        let cost = density_cost(&simulated, &targets, &[300.0, 350.0]).unwrap();
        assert!((cost - LIQUID_COEFFICIENT * 0.2).abs() < EPS);
    }

    #[test]
    fn slope_term_follows_the_error_trend() {
        let targets = [1.0, 1.0];
        let simulated = [1.0, 1.1];
        let cost = density_cost(&simulated, &targets, &[300.0, 310.0]).unwrap();
        let expected = LIQUID_COEFFICIENT * 0.1 + SLOPE_COEFFICIENT * (0.1 / 10.0);
        assert!((cost - expected).abs() < EPS);
    }

    #[test]
    fn single_state_point_degenerates_to_error_term() {
        let cost = density_cost(&[0.9], &[1.0], &[300.0]).unwrap();
        assert!((cost - LIQUID_COEFFICIENT * 0.1).abs() < EPS);
    }

    #[test]
    fn slope_sum_telescopes_over_uniform_spacing() {
        let errors = [0.1, 0.3, 0.2];
        let temperatures = [300.0, 310.0, 320.0];
        assert!((slope_sum(&errors, &temperatures) - 0.01).abs() < EPS);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let result = density_cost(&[0.8, 0.7], &[0.8], &[300.0, 320.0]);
        assert_eq!(
            result,
            Err(CostError::LengthMismatch {
                simulated: 2,
                targets: 1,
                temperatures: 2
            })
        );
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(density_cost(&[], &[], &[]), Err(CostError::Empty));
    }

    #[test]
    fn sentinel_density_dominates_any_realistic_cost() {
        let targets = [0.8, 0.7];
        let temperatures = [300.0, 320.0];
        let poor = density_cost(&[0.1, 2.0], &targets, &temperatures).unwrap();
        let failed = density_cost(&[9999.0, 0.7], &targets, &temperatures).unwrap();
        assert!(failed > poor);
    }
}
