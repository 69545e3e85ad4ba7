use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    #[error("node not found in planner graph: {0}")]
    NodeNotFound(String),

    #[error("no path from supersource to {0}")]
    NoPath(String),

    #[error("demand site not found: {0}")]
    DemandSiteNotFound(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;
