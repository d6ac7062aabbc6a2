//! # swarmfit Core Library
//!
//! Particle-swarm optimization of force-field parameters against experimental liquid
//! densities measured at several temperatures.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`ParameterSpec`, `TemperatureSpec`),
//!   the parameter-space mapping, the density-matching cost function, and I/O utilities
//!   for templates, trajectories and the run log.
//!
//! - **[`engine`]: The Logic Core.** The stateful layer: particles and the swarm, the
//!   partition of a worker pool into evaluation groups, the per-group evaluation protocol
//!   and the [`SimulationBackend`](engine::backend::SimulationBackend) seam to the
//!   simulation engine.
//!
//! - **[`workflows`]: The Public API.** Runs a complete optimization from a built
//!   configuration and a backend, reporting progress along the way.

pub mod core;
pub mod engine;
pub mod workflows;
