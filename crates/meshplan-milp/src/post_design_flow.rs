//! Final continuous LP: with sites, sectors, channels and the active
//! wireless-link set all fixed by the min-interference stage, route traffic
//! to maximize the common throughput delivered to every connected demand.
//! Links the routing step classifies as redundant (present for resilience,
//! not on any demand's primary route) are pinned to zero flow, and every
//! active link's capacity is capped at the MCS class its min-interference
//! SINR actually supports rather than its raw input capacity.

use crate::base::{check_solve_ok, extract_stage_solution, prune_flow_loops, NetworkOptimization, StageSolution};
use crate::error::Result;
use crate::keys::LinkKey;
use crate::params::OptimizerParams;
use crate::setup::OptimizationSetup;
use meshplan_core::constants::EPSILON;
use meshplan_core::enums::StatusType;
use meshplan_core::Topology;
use meshplan_graph::{build_digraph, get_topology_routing_results, PlannerGraph, RouteResult};
use meshplan_rf::RfParams;
use meshplan_solver::{ConstraintSense, LinearExpr, MipSolver, ObjectiveSense};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct PostDesignFlowResult {
    pub flows: HashMap<LinkKey, f64>,
    pub utilization: HashMap<LinkKey, f64>,
    pub is_redundant: HashMap<LinkKey, bool>,
    pub buffer: f64,
    pub timed_out: bool,
}

pub fn solve_post_design_flow(
    topology: &Topology,
    setup: &OptimizationSetup,
    params: &OptimizerParams,
    min_interference: &StageSolution,
    rf_params: &RfParams,
    solver: &mut dyn MipSolver,
) -> Result<PostDesignFlowResult> {
    let scratch = apply_min_interference_decisions(topology, min_interference);
    let routing_graph = build_digraph(&scratch, StatusType::active);
    let routes = get_topology_routing_results(&routing_graph, params.topology_routing);
    let primary_links = primary_link_keys(&routing_graph, &routes);

    let mut local_params = params.clone();
    local_params.maximize_common_bandwidth = true;

    solver.reset();
    let mut opt = NetworkOptimization::new(topology, setup, &local_params);
    pin_min_interference_decisions(&mut opt, solver, min_interference);
    opt.add_flow_balance_constraints(solver);
    opt.add_pop_capacity_constraints(solver);
    opt.add_capacity_constraints(solver);
    opt.add_tdm_per_sector_constraints(solver);
    zero_out_non_primary_flow(&mut opt, solver, min_interference, &primary_links);
    cap_primary_flow_at_mcs_capacity(&mut opt, solver, min_interference, rf_params, &primary_links);

    let buffer_idx = opt.ensure_buffer_var(solver);
    let mut objective = LinearExpr::new();
    objective.add_term(buffer_idx, 1.0);
    solver.set_objective(objective, ObjectiveSense::Maximize);

    let budget = params.stage_budgets.post_design_flow;
    solver.solve(budget.rel_stop, budget.max_time_minutes, params.num_threads)?;
    check_solve_ok(solver, "post_design_flow")?;

    let stage = extract_stage_solution(&opt, solver)?;
    let mut flows = stage.flows;
    let adjacency = build_adjacency(topology);
    prune_flow_loops(&mut flows, &adjacency);

    let mut utilization = HashMap::new();
    let mut is_redundant = HashMap::new();
    for link in topology.sorted_links() {
        if !link.link_type.is_wireless() {
            continue;
        }
        let key = LinkKey::new(link.tx_site_id.clone(), link.rx_site_id.clone());
        let flow = flows.get(&key).copied().unwrap_or(0.0);
        let capacity = effective_capacity(&key, min_interference, rf_params, setup).max(EPSILON);
        utilization.insert(key.clone(), (flow / capacity).clamp(0.0, 1.0));
        let redundant = min_interference.active_links.contains(&key) && !primary_links.contains(&key);
        is_redundant.insert(key, redundant);
    }

    Ok(PostDesignFlowResult { flows, utilization, is_redundant, buffer: solver.value_of(buffer_idx)?, timed_out: stage.timed_out })
}

fn effective_capacity(key: &LinkKey, min_interference: &StageSolution, rf_params: &RfParams, setup: &OptimizationSetup) -> f64 {
    match min_interference.link_sinr.get(key) {
        Some(&sinr_db) => rf_params.mcs_table.capacity_for_snr(sinr_db),
        None => setup.link_capacities.get(key).copied().unwrap_or(0.0),
    }
}

/// Pins every site, sector and active-link decision to the min-interference
/// stage's outcome: this LP only routes flow, it never revisits which sites,
/// sectors or links are up.
fn pin_min_interference_decisions(opt: &mut NetworkOptimization, solver: &mut dyn MipSolver, min_interference: &StageSolution) {
    let site_ids: Vec<String> = opt.topology.sorted_sites().into_iter().map(|s| s.site_id.clone()).collect();
    for site_id in site_ids {
        let idx = opt.ensure_site_var(solver, &site_id);
        let rhs = if min_interference.selected_sites.contains(&site_id) { 1.0 } else { 0.0 };
        let mut expr = LinearExpr::new();
        expr.add_term(idx, 1.0);
        solver.add_constraint(None, expr, ConstraintSense::Eq, rhs);
    }

    let channels: Vec<u32> = (0..opt.params.number_of_channels.max(1)).collect();
    let sector_ids: Vec<String> = opt.topology.sorted_sectors().into_iter().map(|s| s.sector_id.clone()).collect();
    for sector_id in sector_ids {
        for &c in &channels {
            let idx = opt.ensure_sector_var(solver, &sector_id, c);
            let rhs = if min_interference.selected_sectors.contains(&(sector_id.clone(), c)) { 1.0 } else { 0.0 };
            let mut expr = LinearExpr::new();
            expr.add_term(idx, 1.0);
            solver.add_constraint(None, expr, ConstraintSense::Eq, rhs);
        }
    }

    for link in opt.topology.sorted_links() {
        if !link.link_type.is_wireless() {
            continue;
        }
        let key = LinkKey::new(link.tx_site_id.clone(), link.rx_site_id.clone());
        let idx = opt.ensure_active_link_var(solver, &key);
        let rhs = if min_interference.active_links.contains(&key) { 1.0 } else { 0.0 };
        let mut expr = LinearExpr::new();
        expr.add_term(idx, 1.0);
        solver.add_constraint(None, expr, ConstraintSense::Eq, rhs);
    }
}

/// Forces zero flow on every wireless link that is either inactive or
/// classified as a redundancy-only backup (not on any demand's primary
/// route): "redundant links get zero capacity".
fn zero_out_non_primary_flow(
    opt: &mut NetworkOptimization,
    solver: &mut dyn MipSolver,
    min_interference: &StageSolution,
    primary_links: &HashSet<LinkKey>,
) {
    for link in opt.topology.sorted_links() {
        if !link.link_type.is_wireless() {
            continue;
        }
        let key = LinkKey::new(link.tx_site_id.clone(), link.rx_site_id.clone());
        let is_primary = min_interference.active_links.contains(&key) && primary_links.contains(&key);
        if is_primary {
            continue;
        }
        let idx = opt.ensure_flow_var(solver, &key);
        let mut expr = LinearExpr::new();
        expr.add_term(idx, 1.0);
        solver.add_constraint(None, expr, ConstraintSense::Eq, 0.0);
    }
}

fn cap_primary_flow_at_mcs_capacity(
    opt: &mut NetworkOptimization,
    solver: &mut dyn MipSolver,
    min_interference: &StageSolution,
    rf_params: &RfParams,
    primary_links: &HashSet<LinkKey>,
) {
    for link in opt.topology.sorted_links() {
        if !link.link_type.is_wireless() {
            continue;
        }
        let key = LinkKey::new(link.tx_site_id.clone(), link.rx_site_id.clone());
        if !min_interference.active_links.contains(&key) || !primary_links.contains(&key) {
            continue;
        }
        let Some(&sinr_db) = min_interference.link_sinr.get(&key) else { continue };
        let capacity = rf_params.mcs_table.capacity_for_snr(sinr_db);
        let idx = opt.ensure_flow_var(solver, &key);
        let mut expr = LinearExpr::new();
        expr.add_term(idx, 1.0);
        solver.add_constraint(None, expr, ConstraintSense::Le, capacity);
    }
}

fn primary_link_keys(pg: &PlannerGraph, routes: &[RouteResult]) -> HashSet<LinkKey> {
    let mut keys = HashSet::new();
    for route in routes {
        for w in route.path.windows(2) {
            let (Some(a), Some(b)) = (pg.node_of(&w[0]), pg.node_of(&w[1])) else { continue };
            let Some(edge) = pg.graph.find_edge(a, b) else { continue };
            if pg.graph[edge].link_id.is_some() {
                keys.insert(LinkKey::new(w[0].clone(), w[1].clone()));
            }
        }
    }
    keys
}

fn apply_min_interference_decisions(topology: &Topology, min_interference: &StageSolution) -> Topology {
    let mut scratch = topology.clone();

    for site in scratch.sites.values_mut() {
        if site.status.immutable() {
            continue;
        }
        site.status = if min_interference.selected_sites.contains(&site.site_id) { StatusType::Proposed } else { StatusType::Candidate };
    }

    for link in scratch.links.values_mut() {
        if link.status.immutable() {
            continue;
        }
        let key = LinkKey::new(link.tx_site_id.clone(), link.rx_site_id.clone());
        link.status = if min_interference.active_links.contains(&key) { StatusType::Proposed } else { StatusType::Candidate };
    }

    scratch
}

fn build_adjacency(topology: &Topology) -> HashMap<String, Vec<String>> {
    topology.sorted_sites().into_iter().map(|s| (s.site_id.clone(), topology.successors(&s.site_id).into_iter().map(String::from).collect())).collect()
}
