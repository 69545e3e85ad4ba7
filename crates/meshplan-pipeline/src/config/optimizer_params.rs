//! `optimizer_params`: every MILP/RF knob the driver threads through to
//! `meshplan-milp`. Deserialized as a flat record here, then converted to
//! `meshplan_milp::OptimizerParams` once validated — capex is expressed as
//! named per-site-type fields rather than a map, since `SiteType`'s derived
//! `Deserialize` uses PascalCase variant tags, not the name-or-int convention
//! the rest of this configuration surface accepts.

use super::enum_helpers;
use super::error::{ConfigError, Result};
use meshplan_core::enums::{RedundancyLevel, SiteType, TopologyRouting};
use meshplan_milp::{OptimizerParams, StageBudget, StageBudgets};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct StageBudgetConfig {
    pub rel_stop: f64,
    pub max_time_minutes: f64,
}

impl Default for StageBudgetConfig {
    fn default() -> Self {
        Self { rel_stop: 0.01, max_time_minutes: 5.0 }
    }
}

impl From<StageBudgetConfig> for StageBudget {
    fn from(c: StageBudgetConfig) -> Self {
        StageBudget { rel_stop: c.rel_stop, max_time_minutes: c.max_time_minutes }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(default)]
pub struct StageBudgetsConfig {
    pub pop_proposal: StageBudgetConfig,
    pub min_cost: StageBudgetConfig,
    pub max_coverage: StageBudgetConfig,
    pub redundancy: StageBudgetConfig,
    pub min_interference: StageBudgetConfig,
    pub post_design_flow: StageBudgetConfig,
}

impl From<StageBudgetsConfig> for StageBudgets {
    fn from(c: StageBudgetsConfig) -> Self {
        StageBudgets {
            pop_proposal: c.pop_proposal.into(),
            min_cost: c.min_cost.into(),
            max_coverage: c.max_coverage.into(),
            redundancy: c.redundancy.into(),
            min_interference: c.min_interference.into(),
            post_design_flow: c.post_design_flow.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OptimizerParamsConfig {
    pub capex_pop: f64,
    pub capex_dn: f64,
    pub capex_cn: f64,
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
    #[serde(deserialize_with = "enum_helpers::redundancy_level")]
    pub redundancy_level: RedundancyLevel,
    pub backhaul_link_redundancy_ratio: f64,
    pub num_threads: usize,
    pub stage_budgets: StageBudgetsConfig,
    #[serde(deserialize_with = "enum_helpers::topology_routing")]
    pub topology_routing: TopologyRouting,
    pub availability_sim_time: f64,
    pub availability_seed: i64,
    pub availability_max_time_seconds: f64,
    pub number_of_extra_pops: u32,
    pub ignore_polarities: bool,
    pub candidate_topology_file_path: Option<PathBuf>,
}

impl Default for OptimizerParamsConfig {
    fn default() -> Self {
        Self {
            capex_pop: 50_000.0,
            capex_dn: 15_000.0,
            capex_cn: 2_000.0,
            budget: f64::INFINITY,
            pop_capacity_gbps: 10.0,
            oversubscription: 1.0,
            default_demand_gbps: 1.0,
            dn_dn_sector_limit: 2,
            dn_total_sector_limit: 4,
            maximum_number_hops: 8,
            diff_sector_angle_limit_deg: 20.0,
            near_far_angle_limit_deg: 10.0,
            near_far_length_ratio: 3.0,
            number_of_channels: 1,
            maximize_common_bandwidth: false,
            always_active_pops: false,
            enable_legacy_redundancy_method: false,
            redundancy_level: RedundancyLevel::None,
            backhaul_link_redundancy_ratio: 0.0,
            num_threads: 1,
            stage_budgets: StageBudgetsConfig::default(),
            topology_routing: TopologyRouting::ShortestPath,
            availability_sim_time: 8760.0,
            availability_seed: 0,
            availability_max_time_seconds: 60.0,
            number_of_extra_pops: 0,
            ignore_polarities: false,
            candidate_topology_file_path: None,
        }
    }
}

impl OptimizerParamsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.budget < 0.0 {
            return Err(ConfigError::OutOfRange {
                section: "optimizer_params",
                field: "budget",
                constraint: "non-negative",
                value: self.budget.to_string(),
            });
        }
        if self.pop_capacity_gbps <= 0.0 {
            return Err(ConfigError::OutOfRange {
                section: "optimizer_params",
                field: "pop_capacity_gbps",
                constraint: "positive",
                value: self.pop_capacity_gbps.to_string(),
            });
        }
        if self.oversubscription < 1.0 {
            return Err(ConfigError::OutOfRange {
                section: "optimizer_params",
                field: "oversubscription",
                constraint: "at least 1.0",
                value: self.oversubscription.to_string(),
            });
        }
        if self.default_demand_gbps <= 0.0 {
            return Err(ConfigError::OutOfRange {
                section: "optimizer_params",
                field: "default_demand_gbps",
                constraint: "positive",
                value: self.default_demand_gbps.to_string(),
            });
        }
        if self.dn_dn_sector_limit == 0 || self.dn_dn_sector_limit > self.dn_total_sector_limit {
            return Err(ConfigError::OutOfRange {
                section: "optimizer_params",
                field: "dn_dn_sector_limit",
                constraint: "positive and at most dn_total_sector_limit",
                value: self.dn_dn_sector_limit.to_string(),
            });
        }
        if self.maximum_number_hops == 0 {
            return Err(ConfigError::OutOfRange {
                section: "optimizer_params",
                field: "maximum_number_hops",
                constraint: "positive",
                value: self.maximum_number_hops.to_string(),
            });
        }
        if !(0.0..=180.0).contains(&self.diff_sector_angle_limit_deg) {
            return Err(ConfigError::OutOfRange {
                section: "optimizer_params",
                field: "diff_sector_angle_limit_deg",
                constraint: "in [0, 180]",
                value: self.diff_sector_angle_limit_deg.to_string(),
            });
        }
        if !(0.0..=180.0).contains(&self.near_far_angle_limit_deg) {
            return Err(ConfigError::OutOfRange {
                section: "optimizer_params",
                field: "near_far_angle_limit_deg",
                constraint: "in [0, 180]",
                value: self.near_far_angle_limit_deg.to_string(),
            });
        }
        if self.near_far_length_ratio <= 0.0 {
            return Err(ConfigError::OutOfRange {
                section: "optimizer_params",
                field: "near_far_length_ratio",
                constraint: "positive",
                value: self.near_far_length_ratio.to_string(),
            });
        }
        if self.number_of_channels == 0 {
            return Err(ConfigError::OutOfRange {
                section: "optimizer_params",
                field: "number_of_channels",
                constraint: "at least 1",
                value: self.number_of_channels.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.backhaul_link_redundancy_ratio) {
            return Err(ConfigError::OutOfRange {
                section: "optimizer_params",
                field: "backhaul_link_redundancy_ratio",
                constraint: "in [0, 1]",
                value: self.backhaul_link_redundancy_ratio.to_string(),
            });
        }
        Ok(())
    }

    pub fn to_optimizer_params(&self) -> OptimizerParams {
        let site_capex = HashMap::from([
            (SiteType::Pop, self.capex_pop),
            (SiteType::Dn, self.capex_dn),
            (SiteType::Cn, self.capex_cn),
        ]);
        OptimizerParams {
            site_capex,
            budget: self.budget,
            pop_capacity_gbps: self.pop_capacity_gbps,
            oversubscription: self.oversubscription,
            default_demand_gbps: self.default_demand_gbps,
            dn_dn_sector_limit: self.dn_dn_sector_limit,
            dn_total_sector_limit: self.dn_total_sector_limit,
            maximum_number_hops: self.maximum_number_hops,
            diff_sector_angle_limit_deg: self.diff_sector_angle_limit_deg,
            near_far_angle_limit_deg: self.near_far_angle_limit_deg,
            near_far_length_ratio: self.near_far_length_ratio,
            number_of_channels: self.number_of_channels,
            maximize_common_bandwidth: self.maximize_common_bandwidth,
            always_active_pops: self.always_active_pops,
            enable_legacy_redundancy_method: self.enable_legacy_redundancy_method,
            redundancy_level: self.redundancy_level,
            backhaul_link_redundancy_ratio: self.backhaul_link_redundancy_ratio,
            num_threads: self.num_threads,
            stage_budgets: self.stage_budgets.into(),
            topology_routing: self.topology_routing,
            availability_sim_time: self.availability_sim_time,
            availability_seed: self.availability_seed,
            availability_max_time_seconds: self.availability_max_time_seconds,
            number_of_extra_pops: self.number_of_extra_pops,
            ignore_polarities: self.ignore_polarities,
        }
    }
}
