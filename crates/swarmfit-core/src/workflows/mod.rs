//! # Workflows Module
//!
//! High-level entry points that tie the [`engine`](crate::engine) and
//! [`core`](crate::core) layers together into complete procedures.
//!
//! - **Optimization Workflow** ([`optimize`]) - Optional equilibration followed by the
//!   particle-swarm search over force-field parameters.

pub mod optimize;
