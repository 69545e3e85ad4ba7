//! Legacy redundancy path: given the min-cost design, maximize coverage
//! subject to the cost budget, after excluding the backhaul links whose
//! failure would be most disruptive and for which the full candidate graph
//! offers no reroute.

use crate::base::{check_solve_ok, extract_stage_solution, NetworkOptimization, StageSolution};
use crate::error::Result;
use crate::keys::LinkKey;
use crate::params::OptimizerParams;
use crate::setup::OptimizationSetup;
use meshplan_core::constants::EPSILON;
use meshplan_core::enums::StatusType;
use meshplan_core::Topology;
use meshplan_graph::{build_digraph, find_most_disruptive_links};
use meshplan_solver::{ConstraintSense, LinearExpr, MipSolver, ObjectiveSense};
use std::collections::HashSet;

/// Fraction of active backhaul links eligible as adversarial-exclusion
/// candidates; at least one is always tried.
const ADVERSARIAL_LINK_FRACTION: f64 = 0.1;

pub fn solve_max_coverage(
    topology: &Topology,
    setup: &OptimizationSetup,
    params: &OptimizerParams,
    min_cost: &StageSolution,
    solver: &mut dyn MipSolver,
) -> Result<StageSolution> {
    let excluded_links = excluded_adversarial_links(topology, min_cost);

    solver.reset();
    let mut opt = NetworkOptimization::new(topology, setup, params);
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
    opt.add_budget_constraint(solver, params.budget);

    for link in topology.sorted_links() {
        if !excluded_links.contains(&link.link_id) {
            continue;
        }
        let key = LinkKey::new(link.tx_site_id.clone(), link.rx_site_id.clone());
        let flow_idx = opt.ensure_flow_var(solver, &key);
        let mut expr = LinearExpr::new();
        expr.add_term(flow_idx, 1.0);
        solver.add_constraint(None, expr, ConstraintSense::Eq, 0.0);
    }

    let coverage_expr = opt.shortage_sum_expression(solver);
    solver.set_objective(coverage_expr, ObjectiveSense::Minimize);

    let budget = params.stage_budgets.max_coverage;
    solver.solve(budget.rel_stop, budget.max_time_minutes, params.num_threads)?;
    check_solve_ok(solver, "max_coverage")?;
    extract_stage_solution(&opt, solver)
}

/// Finds the adversarial backhaul links to forbid: the min-cost design's
/// most disruptive edges, restricted to ones the full candidate graph can
/// route around.
fn excluded_adversarial_links(topology: &Topology, min_cost: &StageSolution) -> HashSet<String> {
    let proposed_topo = apply_min_cost_decisions(topology, min_cost);
    let proposed_graph = build_digraph(&proposed_topo, StatusType::active);
    let candidate_graph = build_digraph(topology, StatusType::reachable);

    let backhaul_count = topology
        .sorted_links()
        .into_iter()
        .filter(|l| min_cost.selected_sites.contains(&l.tx_site_id) && min_cost.selected_sites.contains(&l.rx_site_id))
        .count();
    let k = ((backhaul_count as f64 * ADVERSARIAL_LINK_FRACTION).ceil() as usize).max(1);

    find_most_disruptive_links(&proposed_graph, &candidate_graph, k).into_iter().collect()
}

/// Builds a scratch topology reflecting the min-cost stage's decisions, for
/// feeding to `build_digraph` with `StatusType::active`. Sites/links that are
/// already immutable keep their status; everything else becomes `Proposed`
/// if selected and carrying positive flow, `Candidate` otherwise. This is a
/// local view for graph construction, not the pipeline's write-back.
fn apply_min_cost_decisions(topology: &Topology, min_cost: &StageSolution) -> Topology {
    let mut scratch = topology.clone();

    for site in scratch.sites.values_mut() {
        if site.status.immutable() {
            continue;
        }
        site.status = if min_cost.selected_sites.contains(&site.site_id) { StatusType::Proposed } else { StatusType::Candidate };
    }

    for link in scratch.links.values_mut() {
        if link.status.immutable() {
            continue;
        }
        let key = LinkKey::new(link.tx_site_id.clone(), link.rx_site_id.clone());
        let carries_flow = min_cost.flows.get(&key).copied().unwrap_or(0.0) > EPSILON;
        let endpoints_selected = min_cost.selected_sites.contains(&link.tx_site_id) && min_cost.selected_sites.contains(&link.rx_site_id);
        link.status = if endpoints_selected && carries_flow { StatusType::Proposed } else { StatusType::Candidate };
    }

    scratch
}
