//! CLI command implementations.

pub mod analyze;
pub mod budget;
pub mod lineage;
pub mod run;
pub mod seed;
pub mod status;
pub mod weights;
