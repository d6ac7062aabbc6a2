//! Immutable descriptions of the optimization problem.
//!
//! These types are produced once by whatever loads the run definition and are
//! then shared read-only by the coordinator and every worker. Their ordering
//! is significant: the index of a [`parameter::ParameterSpec`] is its index in
//! a particle's position vector, and the index of a
//! [`temperature::TemperatureSpec`] is the role index of the group member that
//! simulates it.

pub mod parameter;
pub mod system;
pub mod temperature;
