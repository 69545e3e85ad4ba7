use meshplan_core::error::CoreError;
use meshplan_solver::SolverError;
use thiserror::Error;

/// Optimizer-level failures: infeasible input, a time-out at a stage that
/// cannot be skipped, or an internal invariant violation. Mirrors the
/// `OptimizerError` kind named for the error-handling design: configuration
/// and topology errors abort before any solve, so by the time a `MilpError`
/// surfaces the input has already passed validation.
#[derive(Debug, Error)]
pub enum MilpError {
    #[error("no POP has a positive-capacity outgoing link")]
    NoPopCapacity,

    #[error("no CN or demand-adjacent DN has a positive-capacity incoming link")]
    NoDemandAdjacentCapacity,

    #[error("min-cost coverage floor of {floor} could not be satisfied even at the minimum coverage threshold")]
    UnsatisfiableCoverage { floor: f64 },

    #[error("stage '{stage}' timed out with no usable incumbent (mip_status={mip_status}, lp_status={lp_status})")]
    SolverTimedOut { stage: String, mip_status: i32, lp_status: i32 },

    #[error("stage '{stage}' is infeasible")]
    Infeasible { stage: String },

    #[error("internal invariant violated: {0}")]
    InvariantViolated(String),

    #[error(transparent)]
    Topology(#[from] CoreError),

    #[error(transparent)]
    Solver(#[from] SolverError),
}

pub type Result<T> = std::result::Result<T, MilpError>;
