//! # Engine Module
//!
//! This module implements the distributed particle-swarm engine: the state of the
//! swarm, the partition of the worker pool into evaluation groups, and the protocol
//! by which a group turns one particle into a density-matching cost.
//!
//! ## Overview
//!
//! A coordinator owns the swarm and talks to a pool of worker threads over
//! channels. Workers are partitioned into groups of one worker per temperature;
//! each group evaluates one particle per iteration, its leader preparing the shared
//! working area and aggregating the cost. External simulations are reached only
//! through the [`backend::SimulationBackend`] trait.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Problem definition and PSO coefficients, built and validated
//! - **Topology** ([`topology`]) - Ranks, groups and roles, derived once from the pool size
//! - **Particles** ([`particle`], [`swarm`]) - Position, velocity and personal-best bookkeeping
//! - **State Tracking** ([`state`]) - Global best and per-iteration summaries
//! - **Simulation Backends** ([`backend`]) - The simulation seam and its file-based implementation
//! - **Progress Monitoring** ([`progress`]) - Progress reporting for front ends
//! - **Error Handling** ([`error`]) - Engine-specific error types and error propagation

pub mod backend;
pub(crate) mod comm;
pub mod config;
pub mod error;
pub(crate) mod evaluation;
pub mod particle;
pub mod progress;
pub mod state;
pub mod swarm;
pub mod topology;
