use meshplan_core::error::CoreError;
use meshplan_graph::GraphError;
use meshplan_milp::MilpError;
use meshplan_rf::RfError;
use meshplan_solver::SolverError;
use thiserror::Error;

/// The only error type that crosses the CLI boundary. Every other crate's
/// error wraps in via `#[from]`; nothing here duplicates their variants.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Topology(#[from] CoreError),

    #[error(transparent)]
    Rf(#[from] RfError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error(transparent)]
    Optimizer(#[from] MilpError),

    #[error("I/O error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
