//! MILP stage solvers for the mesh backhaul network planner: the dense
//! setup index (§4.B), the shared `NetworkOptimization` base (§4.E), and
//! the five derived stage models plus the post-design flow router (§4.F).
//! Stages are free functions over `NetworkOptimization` values, not a class
//! hierarchy: each one builds on the shared base, asks `meshplan-rf` for
//! interference coefficients and `meshplan-graph` for graph shortcuts, and
//! hands the model to a `meshplan-solver::MipSolver`.
#![forbid(unsafe_code)]

pub mod base;
pub mod error;
pub mod keys;
pub mod max_coverage;
pub mod min_cost;
pub mod min_interference;
pub mod params;
pub mod pop_proposal;
pub mod post_design_flow;
pub mod redundancy;
pub mod setup;

pub use base::{
    check_solve_ok, extract_stage_solution, prune_flow_loops, NetworkOptimization, StageSolution,
    VariableRegistry,
};
pub use error::{MilpError, Result};
pub use keys::{LinkChannelKey, LinkKey, LinkMcsKey, NodeKey, PolarityLinKey, SectorChannelKey};
pub use max_coverage::solve_max_coverage;
pub use min_cost::solve_min_cost;
pub use min_interference::solve_min_interference;
pub use params::{OptimizerParams, StageBudget, StageBudgets};
pub use pop_proposal::{run_pop_proposal, PopProposalOutcome};
pub use post_design_flow::{solve_post_design_flow, PostDesignFlowResult};
pub use redundancy::{compute_candidate_edges_for_redundancy, solve_redundancy};
pub use setup::{LocationClass, OptimizationSetup};
