//! # Core Module
//!
//! Stateless building blocks of the force-field fitting problem: the description of
//! what is being optimized, how a normalized search position becomes physical
//! parameter values, and how simulated densities are turned into a cost.
//!
//! - **Problem Description** ([`models`]) - Parameters, state points, and the molecule
//! - **Parameter Space Mapping** ([`mapping`]) - Continuous and discrete scaling of positions
//! - **Density Estimation** ([`density`]) - Trailing-window averaging and the failure sentinel
//! - **Cost Function** ([`cost`]) - Relative density error plus its temperature slope
//! - **File I/O** ([`io`]) - Trajectory tables, input templating, and the run log
//!
//! Nothing in this layer knows about workers, groups, or iterations.

pub mod cost;
pub mod density;
pub mod io;
pub mod mapping;
pub mod models;
