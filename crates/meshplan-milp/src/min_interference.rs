//! Final active wireless-link set and channel assignment. Sites are fixed at
//! this stage (taken straight from the input topology); only sector/channel
//! and link-activity decisions remain binary, plus the continuous flow.
//!
//! The SINR-vs-MCS-class capacity cap is the literal per-channel bilinear
//! formulation: `link_capacity_var[(i,j,c,k)]` selects which MCS class link
//! `(i,j)` runs on channel `c`, and `tdm_compatible_polarity(path, (i,j), c)`
//! linearizes how much of each candidate interferer's own duty cycle lands on
//! `(i,j)` given the (still-undecided) polarity of both ends. Routing two
//! mutually-interfering links onto different channels drops their
//! `tdm_compatible_polarity` term to zero (that channel's own `tdm` variable
//! is zero whenever the interferer isn't using it), so channel separation
//! actually lowers modeled interference instead of leaving every candidate
//! pinned to the same worst-case constant. Deployment-rule exclusions still
//! use the single-channel form (`active_link[i,j] + active_link[i,k] <= 1`)
//! rather than per-channel `deployment_link` auxiliaries, since that
//! exclusion is a geometric property of the pair that doesn't depend on which
//! channel either ends up on.

use crate::base::{check_solve_ok, extract_stage_solution, NetworkOptimization, StageSolution};
use crate::error::Result;
use crate::keys::LinkKey;
use crate::params::OptimizerParams;
use crate::setup::OptimizationSetup;
use meshplan_core::constants::EPSILON;
use meshplan_core::enums::SiteType;
use meshplan_core::geo::law_of_cosines_spherical;
use meshplan_core::{Link, Topology};
use meshplan_rf::{compute_interference, InterferenceContribution, InterferenceResult, McsEntry, RfParams};
use meshplan_solver::{ConstraintSense, LinearExpr, MipSolver, ObjectiveSense};
use std::collections::HashMap;

/// Coefficient on the coverage term in the objective, chosen large enough
/// that a single unit of shortage always dominates any achievable link-weight
/// gain, so coverage is the primary objective and link weight only breaks
/// ties among equally-covering active-link sets.
const MAX_THROUGHPUT_WEIGHT: f64 = 1000.0;

/// Upper bound on `1/SINR` used to relax the convex-combination constraint
/// for a channel a link isn't using, and the `1/SNR` coefficient of the
/// zero-throughput MCS class, so neither ever meaningfully constrains the
/// model.
const BIG_M: f64 = 1.0e6;

fn dbm_to_mw(dbm: f64) -> f64 {
    10f64.powf(dbm / 10.0)
}

pub fn solve_min_interference(
    topology: &Topology,
    setup: &OptimizationSetup,
    params: &OptimizerParams,
    rf_params: &RfParams,
    solver: &mut dyn MipSolver,
) -> Result<StageSolution> {
    let interference = compute_interference(topology, rf_params);
    let budget = params.stage_budgets.min_interference;

    solver.reset();
    let mut opt = NetworkOptimization::new(topology, setup, params);
    build_min_interference_model(&mut opt, solver, &interference, rf_params, params.maximize_common_bandwidth);
    solver.solve(budget.rel_stop, budget.max_time_minutes, params.num_threads)?;
    check_solve_ok(solver, "min_interference")?;

    if params.maximize_common_bandwidth {
        let buffer_idx = opt.ensure_buffer_var(solver);
        if solver.value_of(buffer_idx)? <= EPSILON {
            solver.reset();
            let mut plain = NetworkOptimization::new(topology, setup, params);
            build_min_interference_model(&mut plain, solver, &interference, rf_params, false);
            solver.solve(budget.rel_stop, budget.max_time_minutes, params.num_threads)?;
            check_solve_ok(solver, "min_interference_plain_bandwidth_fallback")?;
            return finish(&plain, solver, &interference, rf_params, topology);
        }
    }

    finish(&opt, solver, &interference, rf_params, topology)
}

fn finish(
    opt: &NetworkOptimization,
    solver: &dyn MipSolver,
    interference: &InterferenceResult,
    rf_params: &RfParams,
    topology: &Topology,
) -> Result<StageSolution> {
    let mut solution = extract_stage_solution(opt, solver)?;
    let noise_mw = dbm_to_mw(rf_params.noise_floor_dbm());
    for link in topology.sorted_links() {
        if !link.link_type.is_wireless() {
            continue;
        }
        let key = LinkKey::new(link.tx_site_id.clone(), link.rx_site_id.clone());
        let sinr_db = link_sinr_db(link, interference, noise_mw);
        solution.link_sinr.insert(key, sinr_db);
    }
    Ok(solution)
}

fn link_sinr_db(link: &Link, interference: &InterferenceResult, noise_mw: f64) -> f64 {
    let rsl_mw = dbm_to_mw(link.budget.rsl_dbm);
    let interference_mw = interference.rsl_interference_map.get(&link.link_id).copied().map(dbm_to_mw).unwrap_or(0.0);
    let sinr_linear = rsl_mw / (noise_mw + interference_mw);
    10.0 * sinr_linear.max(1e-15).log10()
}

fn build_min_interference_model(
    opt: &mut NetworkOptimization,
    solver: &mut dyn MipSolver,
    interference: &InterferenceResult,
    rf_params: &RfParams,
    maximize_common_bandwidth: bool,
) {
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

    add_active_link_sector_constraints(opt, solver);
    add_sinr_capacity_constraints(opt, solver, interference, rf_params);
    add_deployment_rule_exclusions(opt, solver);

    let objective = build_objective(opt, solver, maximize_common_bandwidth);
    solver.set_objective(objective, ObjectiveSense::Minimize);
}

/// Ties a link's activity to its endpoint sectors actually being selected on
/// some channel: `active_link <= sum_c sector[site, sector, c]`. The CN
/// receiver side is exempt, matching [`NetworkOptimization::add_channel_exclusion_constraints`]'s
/// treatment of CN rx sectors as inheriting their serving DN's channel rather
/// than carrying their own selection.
fn add_active_link_sector_constraints(opt: &mut NetworkOptimization, solver: &mut dyn MipSolver) {
    let channels: Vec<u32> = (0..opt.params.number_of_channels.max(1)).collect();
    for link in opt.topology.sorted_links() {
        if !link.link_type.is_wireless() {
            continue;
        }
        let key = LinkKey::new(link.tx_site_id.clone(), link.rx_site_id.clone());
        let active_idx = opt.ensure_active_link_var(solver, &key);

        if let Some(tx_sector) = &link.tx_sector_id {
            let mut expr = LinearExpr::new();
            expr.add_term(active_idx, 1.0);
            for &c in &channels {
                let sector_idx = opt.ensure_sector_var(solver, tx_sector, c);
                expr.add_term(sector_idx, -1.0);
            }
            solver.add_constraint(None, expr, ConstraintSense::Le, 0.0);
        }

        let rx_is_cn = opt.topology.sites.get(&link.rx_site_id).is_some_and(|s| s.site_type == SiteType::Cn);
        if rx_is_cn {
            continue;
        }
        if let Some(rx_sector) = &link.rx_sector_id {
            let mut expr = LinearExpr::new();
            expr.add_term(active_idx, 1.0);
            for &c in &channels {
                let sector_idx = opt.ensure_sector_var(solver, rx_sector, c);
                expr.add_term(sector_idx, -1.0);
            }
            solver.add_constraint(None, expr, ConstraintSense::Le, 0.0);
        }
    }
}

/// Groups raw per-path contributions into `interfered link -> interfering
/// link -> averaged received power (mW)`, averaging the handful of
/// calibration paths that might share the same `(interferer, victim)` pair in
/// the linear power domain before the pair is carried into the MILP as a
/// single `tdm_compatible_polarity` term.
fn interferers_by_victim(contributions: &[InterferenceContribution]) -> HashMap<String, HashMap<String, f64>> {
    let mut raw: HashMap<&str, HashMap<&str, Vec<f64>>> = HashMap::new();
    for c in contributions {
        raw.entry(c.interfered_link_id.as_str()).or_default().entry(c.interfering_link_id.as_str()).or_default().push(c.rsl_dbm);
    }
    raw.into_iter()
        .map(|(victim, by_interferer)| {
            let averaged = by_interferer
                .into_iter()
                .map(|(interferer, rsls)| {
                    let avg_mw = rsls.iter().map(|v| dbm_to_mw(*v)).sum::<f64>() / rsls.len() as f64;
                    (interferer.to_string(), avg_mw)
                })
                .collect();
            (victim.to_string(), averaged)
        })
        .collect()
}

/// `1/SNR` for the convex combination, in linear (not dB) terms; the
/// zero-throughput class (and any class with a non-finite threshold) gets
/// [`BIG_M`] so selecting it never meaningfully bounds `1/SINR`.
fn inv_snr_linear(entry: &McsEntry) -> f64 {
    if entry.level == 0 || !entry.min_snr_db.is_finite() {
        return BIG_M;
    }
    10f64.powf(-entry.min_snr_db / 10.0)
}

/// §4.F.5's convex-combination SINR/capacity constraint. For each wireless
/// link and channel: exactly one MCS class is selected iff the link's tx
/// sector is on that channel (`sum_k link_capacity_var == sector[tx,c]`);
/// `1/SINR <= sum_k (1/SNR_k) * link_capacity_var`, relaxed by [`BIG_M`] on
/// every channel the link isn't using; and `flow <= sum_{c,k} capacity_k *
/// link_capacity_var`. `1/SINR` itself is `noise/rsl + sum_q
/// (rsl_interference_q / rsl) * tdm_compatible_polarity(q, (i,j), c)` so an
/// interferer parked on a different channel drops out of the sum.
fn add_sinr_capacity_constraints(
    opt: &mut NetworkOptimization,
    solver: &mut dyn MipSolver,
    interference: &InterferenceResult,
    rf_params: &RfParams,
) {
    let noise_mw = dbm_to_mw(rf_params.noise_floor_dbm());
    let interferers = interferers_by_victim(&interference.contributions);
    let channels: Vec<u32> = (0..opt.params.number_of_channels.max(1)).collect();
    let mcs_entries: Vec<McsEntry> = rf_params.mcs_table.entries().to_vec();

    for link in opt.topology.sorted_links() {
        if !link.link_type.is_wireless() {
            continue;
        }
        let Some(tx_sector) = link.tx_sector_id.clone() else { continue };
        let key = LinkKey::new(link.tx_site_id.clone(), link.rx_site_id.clone());
        let rsl_mw = dbm_to_mw(link.budget.rsl_dbm).max(1e-15);
        let flow_idx = opt.ensure_flow_var(solver, &key);
        let by_interferer = interferers.get(&link.link_id).cloned().unwrap_or_default();

        let mut capacity_expr = LinearExpr::new();
        capacity_expr.add_term(flow_idx, -1.0);

        for &c in &channels {
            let tx_channel_idx = opt.ensure_sector_var(solver, &tx_sector, c);

            let mut class_sum = LinearExpr::new();
            let mut inv_sinr = LinearExpr::new();
            inv_sinr.add_constant(noise_mw / rsl_mw);

            for (interferer_id, rsl_interference_mw) in &by_interferer {
                let Some(interferer_link) = opt.topology.links.get(interferer_id) else { continue };
                let path_key = LinkKey::new(interferer_link.tx_site_id.clone(), interferer_link.rx_site_id.clone());
                let z_idx = opt.ensure_tdm_compatible_polarity_var(solver, &path_key, &key, c);
                inv_sinr.add_term(z_idx, rsl_interference_mw / rsl_mw);
            }

            for entry in &mcs_entries {
                let cls_idx = opt.ensure_link_capacity_var(solver, &key, c, entry.level);
                class_sum.add_term(cls_idx, 1.0);
                capacity_expr.add_term(cls_idx, entry.capacity_gbps);
                inv_sinr.add_term(cls_idx, -inv_snr_linear(entry));
            }

            class_sum.add_term(tx_channel_idx, -1.0);
            solver.add_constraint(None, class_sum, ConstraintSense::Eq, 0.0);

            inv_sinr.add_term(tx_channel_idx, BIG_M);
            solver.add_constraint(None, inv_sinr, ConstraintSense::Le, BIG_M);
        }

        solver.add_constraint(None, capacity_expr, ConstraintSense::Ge, 0.0);
    }
}

/// For every (i, j, k) fan-out triple sharing a tx site, forbid both `(i,j)`
/// and `(i,k)` from being active at once when they are angularly too close
/// or exhibit a near-far length mismatch within the near-far angle window.
fn add_deployment_rule_exclusions(opt: &mut NetworkOptimization, solver: &mut dyn MipSolver) {
    use std::collections::HashMap as StdHashMap;

    let mut by_tx: StdHashMap<String, Vec<&Link>> = StdHashMap::new();
    for link in opt.topology.sorted_links() {
        if !link.link_type.is_wireless() {
            continue;
        }
        by_tx.entry(link.tx_site_id.clone()).or_default().push(link);
    }

    let mut tx_ids: Vec<&String> = by_tx.keys().collect();
    tx_ids.sort();

    for tx_id in tx_ids {
        let Some(tx_site) = opt.topology.sites.get(tx_id.as_str()) else { continue };
        let mut outgoing = by_tx[tx_id].clone();
        outgoing.sort_by(|a, b| a.link_id.cmp(&b.link_id));

        for idx_j in 0..outgoing.len() {
            for idx_k in (idx_j + 1)..outgoing.len() {
                let j = outgoing[idx_j];
                let k = outgoing[idx_k];
                if j.rx_site_id == k.rx_site_id {
                    continue;
                }
                let Some(rx_j) = opt.topology.sites.get(&j.rx_site_id) else { continue };
                let Some(rx_k) = opt.topology.sites.get(&k.rx_site_id) else { continue };

                let (angle_deg, length_ratio) = law_of_cosines_spherical(
                    tx_site.location.latitude,
                    tx_site.location.longitude,
                    rx_j.location.latitude,
                    rx_j.location.longitude,
                    rx_k.location.latitude,
                    rx_k.location.longitude,
                );

                let diff_sector_violation = angle_deg <= opt.params.diff_sector_angle_limit_deg;
                let near_far_violation =
                    angle_deg <= opt.params.near_far_angle_limit_deg && length_ratio > opt.params.near_far_length_ratio;
                if !diff_sector_violation && !near_far_violation {
                    continue;
                }

                let key_j = LinkKey::new(j.tx_site_id.clone(), j.rx_site_id.clone());
                let key_k = LinkKey::new(k.tx_site_id.clone(), k.rx_site_id.clone());
                let idx_j_var = opt.ensure_active_link_var(solver, &key_j);
                let idx_k_var = opt.ensure_active_link_var(solver, &key_k);

                let mut expr = LinearExpr::new();
                expr.add_term(idx_j_var, 1.0);
                expr.add_term(idx_k_var, 1.0);
                solver.add_constraint(None, expr, ConstraintSense::Le, 1.0);
            }
        }
    }
}

/// `min max_throughput * coverage - sum(link_weight * active_link)`. With
/// common-bandwidth enabled, the coverage term is `-buffer` scaled by the
/// number of shortage terms so both additive parts stay commensurable, per
/// the fallback-to-plain-bandwidth rule this stage applies when that yields
/// a zero buffer.
fn build_objective(opt: &mut NetworkOptimization, solver: &mut dyn MipSolver, maximize_common_bandwidth: bool) -> LinearExpr {
    let mut objective = LinearExpr::new();

    if maximize_common_bandwidth {
        let num_terms = opt.setup.demand_connected_sites.len().max(1) as f64;
        let buffer_idx = opt.ensure_buffer_var(solver);
        objective.add_term(buffer_idx, -MAX_THROUGHPUT_WEIGHT * num_terms);
    } else {
        let coverage_expr = opt.shortage_sum_expression(solver);
        for (&var, &coeff) in &coverage_expr.terms {
            objective.add_term(var, MAX_THROUGHPUT_WEIGHT * coeff);
        }
    }

    let max_distance = opt.max_link_distance();
    for link in opt.topology.sorted_links() {
        if !link.link_type.is_wireless() {
            continue;
        }
        let key = LinkKey::new(link.tx_site_id.clone(), link.rx_site_id.clone());
        let active_idx = opt.ensure_active_link_var(solver, &key);
        let weight = opt.link_weight(link, max_distance);
        objective.add_term(active_idx, -weight);
    }

    objective
}
