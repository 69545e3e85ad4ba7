//! Stateful abstraction over a black-box MIP solver: the `MipSolver` trait
//! mirrors an add/delete-variable, add/delete-constraint, set-objective,
//! solve, read-back-status interface; `GoodLpSolver` is the one concrete
//! implementation, backed by `good_lp`'s HiGHS integration.
#![forbid(unsafe_code)]

pub mod backend;
pub mod error;
pub mod trait_def;
pub mod types;

pub use backend::GoodLpSolver;
pub use error::{Result, SolverError};
pub use trait_def::MipSolver;
pub use types::{status, ConstraintSense, LinearExpr, ObjectiveSense, VarType};
