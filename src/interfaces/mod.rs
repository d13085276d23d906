//! Outer surfaces: deployment config, CSV scripts and settlement output.

pub mod config;
pub mod csv;
pub mod script;
