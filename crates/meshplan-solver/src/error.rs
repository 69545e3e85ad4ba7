use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("unknown variable index {0}")]
    UnknownVariable(usize),
    #[error("unknown constraint index {0}")]
    UnknownConstraint(usize),
    #[error("no objective has been set")]
    NoObjective,
    #[error("solve has not been called, or was reset since")]
    NoSolution,
    #[error("backend solver failed: {0}")]
    Backend(String),
    #[error("failed to write LP file: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SolverError>;
