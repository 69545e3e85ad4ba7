//! Wires the lower crates (core topology, RF, graph utilities, solver
//! backend, MILP stages) into one runnable network-planning pipeline:
//! layered configuration, logging, the nine-step design driver, post-solve
//! analysis, and CSV/YAML/KML output.

#![forbid(unsafe_code)]

pub mod analyzer;
pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod output;
pub mod rf_config;
pub mod system_state;
pub mod topology_io;

pub use analyzer::{analyze, AnalysisReport};
pub use config::PlannerConfig;
pub use driver::{run_pipeline, PipelineOutput};
pub use error::{PipelineError, Result};
