//! Minimum-cost design: `min cost s.t. coverage >= floor`, with automatic
//! relaxation of the coverage floor when the current one is infeasible.

use crate::base::{check_solve_ok, extract_stage_solution, NetworkOptimization, StageSolution};
use crate::error::{MilpError, Result};
use crate::params::OptimizerParams;
use crate::setup::OptimizationSetup;
use meshplan_core::constants::{COVERAGE_STEP_SIZE, COVERAGE_THRESHOLD, EPSILON};
use meshplan_core::Topology;
use meshplan_solver::{MipSolver, ObjectiveSense};

pub fn solve_min_cost(
    topology: &Topology,
    setup: &OptimizationSetup,
    params: &OptimizerParams,
    solver: &mut dyn MipSolver,
) -> Result<StageSolution> {
    let mut coverage_floor = 1.0;

    loop {
        solver.reset();
        let mut opt = NetworkOptimization::new(topology, setup, params);
        build_min_cost_model(&mut opt, solver, coverage_floor);

        let budget = params.stage_budgets.min_cost;
        solver.solve(budget.rel_stop, budget.max_time_minutes, params.num_threads)?;

        match check_solve_ok(solver, "min_cost") {
            Ok(()) => return extract_stage_solution(&opt, solver),
            Err(MilpError::Infeasible { .. }) if coverage_floor > COVERAGE_THRESHOLD + EPSILON => {
                coverage_floor = (coverage_floor - COVERAGE_STEP_SIZE).max(COVERAGE_THRESHOLD);
            }
            Err(MilpError::Infeasible { .. }) => {
                return Err(MilpError::UnsatisfiableCoverage { floor: COVERAGE_THRESHOLD });
            }
            Err(e) => return Err(e),
        }
    }
}

fn build_min_cost_model(opt: &mut NetworkOptimization, solver: &mut dyn MipSolver, coverage_floor: f64) {
    opt.add_flow_balance_constraints(solver);
    opt.add_capacity_constraints(solver);
    opt.add_tdm_per_sector_constraints(solver);
    opt.add_pop_capacity_constraints(solver);
    opt.add_polarity_constraints(solver);
    opt.add_colocation_constraints(solver);
    opt.add_p2mp_constraints(solver);
    opt.add_cn_incoming_constraints(solver);
    opt.add_symmetry_constraints(solver);
    opt.add_node_coupling_constraints(solver);
    opt.add_channel_exclusion_constraints(solver);
    opt.add_coverage_constraint(solver, coverage_floor);

    let cost_expr = opt.cost_expression(solver);
    solver.set_objective(cost_expr, ObjectiveSense::Minimize);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::StageBudgets;
    use meshplan_core::demand::DemandSite;
    use meshplan_core::enums::{LocationType, RedundancyLevel, SiteType, StatusType, TopologyRouting};
    use meshplan_core::enums::LinkType;
    use meshplan_core::geo::GeoPoint;
    use meshplan_core::link::LinkBudget;
    use meshplan_core::site::{DeviceSpec, Site};
    use meshplan_core::Link;
    use meshplan_solver::GoodLpSolver;
    use std::collections::HashMap;

    fn params() -> OptimizerParams {
        OptimizerParams {
            site_capex: HashMap::new(),
            budget: 1e9,
            pop_capacity_gbps: 10.0,
            oversubscription: 1.0,
            default_demand_gbps: 0.1,
            dn_dn_sector_limit: 2,
            dn_total_sector_limit: 4,
            maximum_number_hops: 10,
            diff_sector_angle_limit_deg: 10.0,
            near_far_angle_limit_deg: 10.0,
            near_far_length_ratio: 3.0,
            number_of_channels: 1,
            maximize_common_bandwidth: false,
            always_active_pops: false,
            enable_legacy_redundancy_method: false,
            redundancy_level: RedundancyLevel::None,
            backhaul_link_redundancy_ratio: 0.0,
            num_threads: 1,
            stage_budgets: StageBudgets::default(),
            topology_routing: TopologyRouting::ShortestPath,
            availability_sim_time: 1000.0,
            availability_seed: 42,
            availability_max_time_seconds: 5.0,
            number_of_extra_pops: 0,
            ignore_polarities: true,
        }
    }

    #[test]
    fn single_pop_single_dn_picks_the_only_site() {
        let mut topo = Topology::new();
        let dev = DeviceSpec { sku: "SKU".into(), node_capex: 500.0, nodes_per_site: 1 };
        let pop = Site::new(SiteType::Pop, GeoPoint::new(0.0, 0.0, 0.0), dev.clone(), StatusType::Existing, LocationType::StreetLevel);
        let dn = Site::new(SiteType::Dn, GeoPoint::new(0.0, 1.0, 0.0), dev, StatusType::Candidate, LocationType::StreetLevel);
        let (pop_id, dn_id) = (pop.site_id.clone(), dn.site_id.clone());
        topo.add_site(pop).unwrap();
        topo.add_site(dn).unwrap();
        let link = Link::new(pop_id, dn_id.clone(), LinkType::WirelessBackhaul, StatusType::Candidate, 500.0, LinkBudget::wired(5.0));
        topo.add_link(link).unwrap();
        let mut demand = DemandSite::new("d1", GeoPoint::new(0.0, 1.0, 0.0), 0.1, 1);
        demand.connected_sites.push(dn_id.clone());
        topo.add_demand_site(demand).unwrap();

        let params = params();
        let setup = OptimizationSetup::build(&topo, &params).unwrap();
        let mut solver = GoodLpSolver::new();
        let solution = solve_min_cost(&topo, &setup, &params, &mut solver).unwrap();
        assert!(solution.selected_sites.contains(&dn_id));
    }
}
