//! CLI command implementations.

pub mod diagnose;
pub mod migrate;
