//! File formats read and written around the external simulation engine.
//!
//! - [`trajectory`] parses the whitespace-delimited block-average tables the engine emits.
//! - [`template`] performs in-place placeholder substitution on templated inputs.
//! - [`run_log`] appends one CSV record per evaluated leader particle.

pub mod run_log;
pub mod template;
pub mod trajectory;
