//! Shared numeric/string constants used across the data model and the
//! optimization crates.

/// Per-site-type objective/cost weight applied to a backhaul link relative to
/// an access link of equal length (access link weight is implicitly 1).
pub const BACKHAUL_LINK_TYPE_WEIGHT: f64 = 8.0;

/// Coverage is decremented by this much, down to [`COVERAGE_THRESHOLD`],
/// until the min-cost stage finds a feasible solution.
pub const COVERAGE_STEP_SIZE: f64 = 0.1;

/// Lower bound the min-cost auto-relaxation loop will not go below.
pub const COVERAGE_THRESHOLD: f64 = 0.5;

/// Generic numerical tolerance for flow/shortage/angle comparisons.
pub const EPSILON: f64 = 1e-5;

/// Bound on the sector re-orientation / tx-power-MCS adaptation loop.
pub const MAX_LINK_BUDGET_ITERATIONS: u32 = 10;

/// Sentinel channel value meaning "no channel assigned yet".
pub const UNASSIGNED_CHANNEL: i32 = -1;

/// Id of the imaginary supersource location.
pub const SUPERSOURCE: &str = "SUPERSOURCE";
/// Id prefix of the imaginary supersource sector attached to each POP.
pub const SUPERSOURCE_SECTOR: &str = "SUPERSOURCE_SECTOR";
/// Prefix used to mark demand locations in the dense index.
pub const DEMAND: &str = "DEMAND";
/// Id prefix of the imaginary demand-facing sector attached to a serving site.
pub const DEMAND_SECTOR: &str = "DEMAND_SECTOR";
