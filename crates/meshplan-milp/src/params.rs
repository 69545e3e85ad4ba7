use meshplan_core::enums::{RedundancyLevel, SiteType, TopologyRouting};
use std::collections::HashMap;

/// Per-stage solver budget: relative MIP gap and wall-clock minutes.
/// A negative `max_time_minutes` is passed straight through to the solver,
/// meaning "hard stop, return the best incumbent found so far."
#[derive(Debug, Clone, Copy)]
pub struct StageBudget {
    pub rel_stop: f64,
    pub max_time_minutes: f64,
}

impl Default for StageBudget {
    fn default() -> Self {
        Self { rel_stop: 0.01, max_time_minutes: 5.0 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StageBudgets {
    pub pop_proposal: StageBudget,
    pub min_cost: StageBudget,
    pub max_coverage: StageBudget,
    pub redundancy: StageBudget,
    pub min_interference: StageBudget,
    pub post_design_flow: StageBudget,
}

/// Every pipeline knob named in the optimizer_params configuration section.
/// Translated from a deserialized configuration record one layer up, in
/// `meshplan-pipeline`; this crate never touches serde directly.
#[derive(Debug, Clone)]
pub struct OptimizerParams {
    pub site_capex: HashMap<SiteType, f64>,
    pub budget: f64,
    pub pop_capacity_gbps: f64,
    pub oversubscription: f64,
    pub default_demand_gbps: f64,
    pub dn_dn_sector_limit: u32,
    pub dn_total_sector_limit: u32,
    pub maximum_number_hops: u32,
    pub diff_sector_angle_limit_deg: f64,
    pub near_far_angle_limit_deg: f64,
    pub near_far_length_ratio: f64,
    pub number_of_channels: u32,
    pub maximize_common_bandwidth: bool,
    pub always_active_pops: bool,
    pub enable_legacy_redundancy_method: bool,
    pub redundancy_level: RedundancyLevel,
    pub backhaul_link_redundancy_ratio: f64,
    pub num_threads: usize,
    pub stage_budgets: StageBudgets,
    pub topology_routing: TopologyRouting,
    pub availability_sim_time: f64,
    pub availability_seed: i64,
    pub availability_max_time_seconds: f64,
    pub number_of_extra_pops: u32,
    pub ignore_polarities: bool,
}

impl OptimizerParams {
    /// `(pop_node_capacity, dn_node_capacity, sink_node_capacity)` per the
    /// redundancy level. HIGH scales with how many POPs exist in the input,
    /// since a network with more POPs can support deeper node-disjoint
    /// redundancy without overloading any one of them.
    pub fn redundancy_node_capacities(&self, pop_count: usize) -> (f64, f64, f64) {
        match self.redundancy_level {
            RedundancyLevel::None => (1.0, 1.0, 1.0),
            RedundancyLevel::Low => (2.0, 2.0, 2.0),
            RedundancyLevel::Medium => {
                if pop_count >= 2 {
                    (2.0, 1.0, 2.0)
                } else {
                    (1.0, 1.0, 2.0)
                }
            }
            RedundancyLevel::High => {
                let pop_cap = (pop_count as f64).max(2.0);
                (pop_cap, 2.0, 3.0)
            }
        }
    }
}
