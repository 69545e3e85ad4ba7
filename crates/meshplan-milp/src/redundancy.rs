//! Modern redundancy augmentation: on top of the min-cost design, adds
//! backup backhaul so the network tolerates node failures up to the
//! configured redundancy level. A max-flow heuristic first restricts which
//! extra edges are worth modeling, then a two-pass MILP (minimize shortage,
//! then fix shortage and minimize cost) decides which of them to build.

use crate::base::{check_solve_ok, extract_stage_solution, NetworkOptimization, StageSolution};
use crate::error::Result;
use crate::keys::LinkKey;
use crate::params::OptimizerParams;
use crate::setup::OptimizationSetup;
use meshplan_core::constants::EPSILON;
use meshplan_core::enums::{LinkType, SiteType};
use meshplan_core::{Site, Topology};
use meshplan_graph::{delaunay_edges, max_flow_with_edge_usage, split_node_graph, within_two_hops};
use meshplan_solver::{ConstraintSense, LinearExpr, MipSolver, ObjectiveSense};
use std::collections::{HashMap, HashSet};

/// Restricts the redundancy MILP to the edges a max-flow probe actually
/// exercises: every POP-to-DN probe (capped at the redundancy level's POP
/// node capacity) and every DN pair within two Delaunay hops of each other.
/// Active links whose endpoints both end up in the restricted node set are
/// added back even if no probe used them, so the heuristic never drops an
/// already-selected backhaul link.
pub fn compute_candidate_edges_for_redundancy(
    topology: &Topology,
    min_cost: &StageSolution,
    pop_node_capacity: f64,
) -> HashSet<LinkKey> {
    let active_sites: Vec<&Site> = topology
        .sorted_sites()
        .into_iter()
        .filter(|s| min_cost.selected_sites.contains(&s.site_id) || s.status.immutable())
        .collect();

    let active_links: Vec<(String, String, f64)> = topology
        .sorted_links()
        .into_iter()
        .filter(|l| {
            l.link_type == LinkType::WirelessBackhaul
                && min_cost.selected_sites.contains(&l.tx_site_id)
                && min_cost.selected_sites.contains(&l.rx_site_id)
        })
        .map(|l| (l.tx_site_id.clone(), l.rx_site_id.clone(), l.budget.capacity_gbps))
        .collect();

    let nodes: Vec<String> = active_sites.iter().map(|s| s.site_id.clone()).collect();
    let mut node_capacity: HashMap<String, f64> = HashMap::new();
    for site in &active_sites {
        let cap = if site.site_type == SiteType::Pop { pop_node_capacity } else { f64::INFINITY };
        node_capacity.insert(site.site_id.clone(), cap);
    }

    let flow_graph = split_node_graph(&nodes, &active_links, &node_capacity);

    let pops: Vec<&str> = active_sites.iter().filter(|s| s.site_type == SiteType::Pop).map(|s| s.site_id.as_str()).collect();
    let dns: Vec<&str> = active_sites.iter().filter(|s| s.site_type == SiteType::Dn).map(|s| s.site_id.as_str()).collect();

    let mut restricted: HashSet<LinkKey> = HashSet::new();

    for &pop in &pops {
        for &dn in &dns {
            let (_, used) = max_flow_with_edge_usage(&flow_graph, pop, dn, &active_links);
            restricted.extend(used.into_iter().map(|(u, v)| LinkKey::new(u, v)));
        }
    }

    let dn_points: Vec<(String, f64, f64)> = active_sites
        .iter()
        .filter(|s| s.site_type == SiteType::Dn)
        .map(|s| (s.site_id.clone(), s.location.longitude, s.location.latitude))
        .collect();
    let delaunay = delaunay_edges(&dn_points);

    for &dn in &dns {
        for peer in within_two_hops(&delaunay, dn) {
            let (_, used) = max_flow_with_edge_usage(&flow_graph, dn, &peer, &active_links);
            restricted.extend(used.into_iter().map(|(u, v)| LinkKey::new(u, v)));
        }
    }

    let restricted_nodes: HashSet<&str> = restricted.iter().flat_map(|k| [k.tx.as_str(), k.rx.as_str()]).collect();
    for (tx, rx, _) in &active_links {
        if restricted_nodes.contains(tx.as_str()) && restricted_nodes.contains(rx.as_str()) {
            restricted.insert(LinkKey::new(tx.clone(), rx.clone()));
        }
    }

    restricted
}

pub fn solve_redundancy(
    topology: &Topology,
    setup: &OptimizationSetup,
    params: &OptimizerParams,
    min_cost: &StageSolution,
    solver: &mut dyn MipSolver,
) -> Result<StageSolution> {
    let active_pop_count = topology
        .sorted_sites()
        .into_iter()
        .filter(|s| s.site_type == SiteType::Pop && min_cost.selected_sites.contains(&s.site_id))
        .count()
        .max(1);
    let (pop_node_cap, dn_node_cap, sink_node_cap) = params.redundancy_node_capacities(active_pop_count);

    let restricted = compute_candidate_edges_for_redundancy(topology, min_cost, pop_node_cap);

    solver.reset();
    let mut opt = NetworkOptimization::new(topology, setup, params);
    let shortage_idx = build_redundancy_model(&mut opt, solver, &restricted, pop_node_cap, dn_node_cap, sink_node_cap, min_cost);
    let mut shortage_expr = LinearExpr::new();
    shortage_expr.add_term(shortage_idx, 1.0);
    solver.set_objective(shortage_expr, ObjectiveSense::Minimize);

    let budget = params.stage_budgets.redundancy;
    solver.solve(budget.rel_stop, budget.max_time_minutes, params.num_threads)?;
    check_solve_ok(solver, "redundancy_pass1")?;
    let achieved_shortage = solver.value_of(shortage_idx)?;

    solver.reset();
    let mut opt2 = NetworkOptimization::new(topology, setup, params);
    let shortage_idx2 = build_redundancy_model(&mut opt2, solver, &restricted, pop_node_cap, dn_node_cap, sink_node_cap, min_cost);
    let mut shortage_cap = LinearExpr::new();
    shortage_cap.add_term(shortage_idx2, 1.0);
    solver.add_constraint(Some("redundancy_shortage_cap"), shortage_cap, ConstraintSense::Le, achieved_shortage + EPSILON);

    let cost_expr = opt2.cost_expression(solver);
    solver.set_objective(cost_expr, ObjectiveSense::Minimize);
    solver.solve(budget.rel_stop, budget.max_time_minutes, params.num_threads)?;
    check_solve_ok(solver, "redundancy_pass2")?;

    extract_stage_solution(&opt2, solver)
}

/// Builds the shared per-pass model: the min-cost design is pinned active,
/// embedded redundancy-only flow variables are added over the restricted
/// edge set feeding a single aggregate sink demand sized at
/// `active_dn_count * sink_node_cap`, with each node's total redundancy
/// throughput capped at its node capacity (`dn_node_cap` for DN hops).
/// Returns the aggregate shortage variable's index.
fn build_redundancy_model(
    opt: &mut NetworkOptimization,
    solver: &mut dyn MipSolver,
    restricted: &HashSet<LinkKey>,
    pop_node_cap: f64,
    dn_node_cap: f64,
    sink_node_cap: f64,
    min_cost: &StageSolution,
) -> usize {
    for site_id in &min_cost.selected_sites {
        let idx = opt.ensure_site_var(solver, site_id);
        let mut expr = LinearExpr::new();
        expr.add_term(idx, 1.0);
        solver.add_constraint(None, expr, ConstraintSense::Eq, 1.0);
    }

    opt.add_pop_capacity_constraints(solver);
    opt.add_colocation_constraints(solver);
    opt.add_node_coupling_constraints(solver);

    let active_dns: Vec<String> = opt
        .topology
        .sorted_sites()
        .into_iter()
        .filter(|s| s.site_type == SiteType::Dn && min_cost.selected_sites.contains(&s.site_id))
        .map(|s| s.site_id.clone())
        .collect();

    let total_demand = active_dns.len() as f64 * sink_node_cap;
    let shortage_idx = solver.add_variable("redundancy_shortage", meshplan_solver::VarType::Continuous, 0.0, total_demand.max(0.0));

    let redundancy_links: Vec<LinkKey> = restricted.iter().cloned().collect();
    let mut redund_flow: HashMap<LinkKey, usize> = HashMap::new();
    for link in &redundancy_links {
        let cap = opt.setup.link_capacities.get(link).copied().unwrap_or(0.0);
        let idx = solver.add_variable(&format!("redund_flow_{link}"), meshplan_solver::VarType::Continuous, 0.0, cap.min(1e6));
        redund_flow.insert(link.clone(), idx);
    }

    let mut node_throughput: HashMap<String, LinearExpr> = HashMap::new();
    for link in &redundancy_links {
        let &idx = redund_flow.get(link).expect("flow var registered above");
        node_throughput.entry(link.tx.clone()).or_insert_with(LinearExpr::new).add_term(idx, 1.0);
        node_throughput.entry(link.rx.clone()).or_insert_with(LinearExpr::new).add_term(idx, 1.0);
    }
    for (site_id, mut expr) in node_throughput {
        let cap = if opt.topology.sites.get(&site_id).is_some_and(|s| s.site_type == SiteType::Pop) {
            continue;
        } else {
            dn_node_cap
        };
        solver.add_constraint(Some(&format!("redund_node_cap_{site_id}")), std::mem::take(&mut expr), ConstraintSense::Le, cap);
    }

    // Flow balance at every node touched by the restricted edge set: each
    // active DN absorbs up to `sink_node_cap` as local demand, with the
    // shortfall routed to the aggregate shortage variable.
    let touched_nodes: HashSet<String> = redundancy_links.iter().flat_map(|k| [k.tx.clone(), k.rx.clone()]).collect();
    let mut remaining_shortage = LinearExpr::new();
    remaining_shortage.add_term(shortage_idx, 1.0);
    let mut shortage_allocation: HashMap<String, usize> = HashMap::new();

    for site_id in &touched_nodes {
        let mut balance = LinearExpr::new();
        for link in &redundancy_links {
            let &idx = redund_flow.get(link).unwrap();
            if link.rx == *site_id {
                balance.add_term(idx, 1.0);
            }
            if link.tx == *site_id {
                balance.add_term(idx, -1.0);
            }
        }

        if active_dns.contains(site_id) {
            let demand_shortage_idx = solver.add_variable(&format!("redund_shortage_{site_id}"), meshplan_solver::VarType::Continuous, 0.0, sink_node_cap);
            balance.add_term(demand_shortage_idx, 1.0);
            shortage_allocation.insert(site_id.clone(), demand_shortage_idx);
            solver.add_constraint(Some(&format!("redund_balance_{site_id}")), balance, ConstraintSense::Eq, sink_node_cap);
        } else if opt.topology.sites.get(site_id.as_str()).is_some_and(|s| s.site_type == SiteType::Pop) {
            // A POP is a redundancy-flow source: net outflow (outflow -
            // inflow, i.e. `-balance`) is capped at its node capacity.
            solver.add_constraint(Some(&format!("redund_balance_{site_id}")), balance, ConstraintSense::Ge, -pop_node_cap);
        } else {
            solver.add_constraint(Some(&format!("redund_balance_{site_id}")), balance, ConstraintSense::Eq, 0.0);
        }
    }

    let mut total_allocated_shortage = LinearExpr::new();
    for &idx in shortage_allocation.values() {
        total_allocated_shortage.add_term(idx, 1.0);
    }
    total_allocated_shortage.add_term(shortage_idx, -1.0);
    solver.add_constraint(Some("redund_shortage_total"), total_allocated_shortage, ConstraintSense::Eq, 0.0);

    shortage_idx
}
