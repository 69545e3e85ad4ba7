use crate::error::Result;
use crate::types::{ConstraintSense, LinearExpr, ObjectiveSense, VarType};
use std::path::Path;

/// Mirrors the black-box MIP solver interface this crate wraps: add/delete
/// variables and constraints incrementally, set an objective, solve under a
/// time and relative-gap budget, then read back status codes and values.
/// `meshplan-milp` programs against this trait exclusively; it never touches
/// a concrete backend type.
pub trait MipSolver {
    /// Registers a new variable and returns its stable index, used in every
    /// subsequent `LinearExpr` that references it.
    fn add_variable(&mut self, name: &str, var_type: VarType, lb: f64, ub: f64) -> usize;

    /// Registers a linear constraint and returns its index (for later
    /// `del_constraint`).
    fn add_constraint(&mut self, name: Option<&str>, expr: LinearExpr, sense: ConstraintSense, rhs: f64) -> usize;

    fn set_objective(&mut self, expr: LinearExpr, sense: ObjectiveSense);

    fn del_constraint(&mut self, idx: usize) -> Result<()>;

    fn del_variable(&mut self, idx: usize) -> Result<()>;

    /// Clears every variable, constraint and objective, returning the solver
    /// to its just-constructed state.
    fn reset(&mut self);

    fn write_lp(&self, path: &Path) -> Result<()>;

    /// Solves the current model. `rel_stop` is the relative MIP gap at which
    /// the search may stop early; `max_time_minutes` is wall-clock budget —
    /// a negative value means "hard stop, return the best incumbent found
    /// so far" rather than an error.
    fn solve(&mut self, rel_stop: f64, max_time_minutes: f64, threads: usize) -> Result<()>;

    fn mip_solution_count(&self) -> usize;

    fn mip_status(&self) -> Result<i32>;

    fn lp_status(&self) -> Result<i32>;

    fn objective_value(&self) -> Result<f64>;

    fn value_of(&self, var: usize) -> Result<f64>;
}
