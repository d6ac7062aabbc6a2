//! Mapping from the normalized search space `[0, 1]^d` onto physical parameter values.

use super::models::parameter::{ParameterKind, ParameterSpec};
use nalgebra::DVector;

/// Linearly maps `position` from `[0, 1]` onto `[scale_min, scale_max]`.
#[inline]
pub fn scale_continuous(position: f64, scale_min: f64, scale_max: f64) -> f64 {
    scale_min + position * (scale_max - scale_min)
}

/// Maps `position` from `[0, 1]` uniformly onto the integers `scale_min..=scale_max`.
///
/// The interval is stretched to `[scale_min, scale_max + 1]` and truncated, so each
/// integer owns an equal share of the unit interval. Only `position == 1.0` lands on
/// `scale_max + 1`, which is folded back onto `scale_max`.
#[inline]
pub fn scale_discrete(position: f64, scale_min: f64, scale_max: f64) -> f64 {
    let scaled = scale_continuous(position, scale_min, scale_max + 1.0).trunc();
    if scaled >= scale_max + 1.0 {
        scale_max
    } else {
        scaled
    }
}

/// Maps one coordinate according to the kind and bounds of `spec`.
#[inline]
pub fn map_coordinate(spec: &ParameterSpec, position: f64) -> f64 {
    match spec.kind {
        ParameterKind::Continuous => scale_continuous(position, spec.start, spec.end),
        ParameterKind::Discrete => scale_discrete(position, spec.start, spec.end),
    }
}

/// Maps a whole position vector; `specs[i]` governs `position[i]`.
///
/// # Panics
///
/// Panics if `specs` and `position` differ in length.
pub fn map_position(specs: &[ParameterSpec], position: &DVector<f64>) -> DVector<f64> {
    assert_eq!(
        specs.len(),
        position.len(),
        "position dimension must match the number of parameters"
    );
    DVector::from_iterator(
        specs.len(),
        specs
            .iter()
            .zip(position.iter())
            .map(|(spec, &x)| map_coordinate(spec, x)),
    )
}
