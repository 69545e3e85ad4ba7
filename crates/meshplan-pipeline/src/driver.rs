//! The nine-step pipeline driver: POP proposal, reachability pruning, the
//! four MILP design stages in order, an MCS-convergence loop over the
//! min-interference result, and the post-design flow. Each stage gets its
//! own `tracing::span` recording wall-clock duration, objective value and
//! whether it timed out; `PipelineError` crosses this module's boundary and
//! nothing else.

use crate::config::OptimizerParamsConfig;
use crate::error::Result;
use crate::output;
use meshplan_core::constants::MAX_LINK_BUDGET_ITERATIONS;
use meshplan_core::enums::{SiteType, StatusType};
use meshplan_core::Topology;
use meshplan_graph::{build_digraph, hops_from_pop};
use meshplan_milp::{
    run_pop_proposal, solve_min_cost, solve_min_interference, solve_post_design_flow,
    solve_redundancy, solve_max_coverage, OptimizationSetup, OptimizerParams,
    PostDesignFlowResult, StageSolution,
};
use meshplan_rf::{reorient_sectors, RfParams};
use meshplan_solver::GoodLpSolver;
use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{info, info_span, warn};

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub topology: Topology,
    pub post_design: PostDesignFlowResult,
    pub min_cost_objective: f64,
    pub interference_objective: f64,
}

/// Drops every site more than `maximum_number_hops` away from the nearest
/// POP (and any link touching it) by marking it `Unreachable`; this status
/// is immutable-like in that later stages never resurrect it.
fn prune_unreachable(topology: &mut Topology, maximum_number_hops: u32) -> Result<usize> {
    let pg = build_digraph(topology, StatusType::reachable);
    let hops = hops_from_pop(&pg);

    let mut pruned = 0;
    let site_ids: Vec<String> = topology.sorted_sites().into_iter().map(|s| s.site_id.clone()).collect();
    for site_id in site_ids {
        let site = &topology.sites[&site_id];
        if site.status.immutable() {
            continue;
        }
        let within_range = hops.get(&site_id).is_some_and(|&h| h <= maximum_number_hops);
        if !within_range {
            topology.set_site_status(&site_id, StatusType::Unreachable)?;
            pruned += 1;
        }
    }
    Ok(pruned)
}

/// Status write-back after a stage solution: immutable statuses never
/// change; a selected site/link is PROPOSED, otherwise CANDIDATE. A site
/// left without any active incident link demotes back to CANDIDATE, and any
/// link whose endpoint demoted follows it down — applied to a fixed point.
fn write_back_stage_solution(topology: &mut Topology, solution: &StageSolution) -> Result<()> {
    let site_ids: Vec<String> = topology.sorted_sites().into_iter().map(|s| s.site_id.clone()).collect();
    for site_id in &site_ids {
        let current = topology.sites[site_id].status;
        if current.immutable() || current == StatusType::Unreachable {
            continue;
        }
        let status = if solution.selected_sites.contains(site_id) { StatusType::Proposed } else { StatusType::Candidate };
        topology.set_site_status(site_id, status)?;
    }

    let link_ids: Vec<String> = topology.sorted_links().into_iter().map(|l| l.link_id.clone()).collect();
    for link_id in &link_ids {
        let link = topology.links.get_mut(link_id).expect("link_id from sorted_links");
        if link.status.immutable() || link.status == StatusType::Unreachable {
            continue;
        }
        let key = meshplan_milp::LinkKey::new(link.tx_site_id.clone(), link.rx_site_id.clone());
        link.status = if solution.active_links.contains(&key) { StatusType::Proposed } else { StatusType::Candidate };
    }

    demote_unsupported_endpoints(topology)
}

/// Fixed-point pass: a non-immutable site with no active incident link
/// demotes to CANDIDATE; a link touching a demoted site follows it down.
/// Repeats until nothing changes, since one demotion can cascade to another.
fn demote_unsupported_endpoints(topology: &mut Topology) -> Result<()> {
    loop {
        let mut changed = false;

        let site_ids: Vec<String> = topology.sorted_sites().into_iter().map(|s| s.site_id.clone()).collect();
        for site_id in &site_ids {
            if topology.sites[site_id].status != StatusType::Proposed {
                continue;
            }
            let has_active_link = topology
                .sorted_links()
                .into_iter()
                .any(|l| l.status.active() && (l.tx_site_id == *site_id || l.rx_site_id == *site_id));
            if !has_active_link {
                topology.set_site_status(site_id, StatusType::Candidate)?;
                changed = true;
            }
        }

        let link_ids: Vec<String> = topology.sorted_links().into_iter().map(|l| l.link_id.clone()).collect();
        for link_id in &link_ids {
            let link = topology.links.get_mut(link_id).expect("link_id from sorted_links");
            if link.status.immutable() || !link.status.active() {
                continue;
            }
            let tx_active = topology.sites.get(&link.tx_site_id).is_some_and(|s| s.status.active());
            let rx_active = topology.sites.get(&link.rx_site_id).is_some_and(|s| s.status.active());
            if !tx_active || !rx_active {
                let link = topology.links.get_mut(link_id).expect("link_id from sorted_links");
                link.status = StatusType::Candidate;
                changed = true;
            }
        }

        if !changed {
            return Ok(());
        }
    }
}

/// Applies the min-interference stage's channel/MCS decisions onto each
/// active wireless link's budget, recomputing capacity from the achieved
/// SINR. Returns whether any link's MCS level actually changed, which is the
/// convergence test for the re-orientation loop.
fn apply_interference_decisions(topology: &mut Topology, solution: &StageSolution, rf_params: &RfParams) -> bool {
    let mut changed = false;
    for link in topology.links.values_mut() {
        if !link.link_type.is_wireless() {
            continue;
        }
        let key = meshplan_milp::LinkKey::new(link.tx_site_id.clone(), link.rx_site_id.clone());
        let Some(&sinr_db) = solution.link_sinr.get(&key) else { continue };
        let mcs = rf_params.mcs_table.mcs_for_snr(sinr_db);
        if mcs.level != link.budget.mcs_level {
            changed = true;
        }
        link.budget.mcs_level = mcs.level;
        link.budget.capacity_gbps = mcs.capacity_gbps;
        link.budget.snr_dbm = sinr_db;
        link.sinr_dbm = Some(sinr_db);
    }
    changed
}

/// Dumps `solver`'s current model under `<debug_output_dir>/debug/<stage>_<unix-ms>.lp`
/// when debug dumping is enabled, logging (not failing) the pipeline on I/O
/// error since a debug artifact is never worth aborting a successful solve.
fn maybe_dump_lp(debug_output_dir: Option<&Path>, stage: &str, solver: &GoodLpSolver) {
    let Some(dir) = debug_output_dir else { return };
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0);
    if let Err(e) = output::dump_lp(dir, stage, timestamp, solver) {
        warn!(stage, error = %e, "failed to write debug LP dump");
    }
}

/// Runs the full nine-step design pipeline against `topology`, mutating it
/// in place with the final site/link statuses, and returns the post-design
/// routing result alongside it. `debug_output_dir` enables a per-stage LP
/// dump under `<dir>/debug` when `Some` (driven by `system_params.debug_mode`
/// or the `--dump-lp` CLI flag).
pub fn run_pipeline(
    topology: &mut Topology,
    config: &OptimizerParamsConfig,
    rf_params: &RfParams,
    debug_output_dir: Option<&Path>,
) -> Result<PipelineOutput> {
    let params: OptimizerParams = config.to_optimizer_params();
    let mut solver = GoodLpSolver::new();

    // Step 1: the topology's own `sorted_*` accessors already give every
    // later stage a deterministic traversal order; nothing to mutate here.
    let _sort_span = info_span!("sort_topology").entered();
    drop(_sort_span);

    // Step 2: POP proposal, best-effort.
    if params.number_of_extra_pops > 0 {
        let span = info_span!("pop_proposal").entered();
        let start = Instant::now();
        match run_pop_proposal(topology, &params, &mut solver) {
            Ok(outcome) => info!(duplicated = outcome.duplicated_pop_ids.len(), elapsed_ms = start.elapsed().as_millis() as u64, "pop proposal complete"),
            Err(e) => warn!(error = %e, "pop proposal failed, continuing with the topology as given"),
        }
        drop(span);
    }

    // Step 3: prune sites beyond the hop budget.
    {
        let _span = info_span!("prune_unreachable").entered();
        let pruned = prune_unreachable(topology, params.maximum_number_hops)?;
        info!(pruned, "marked sites unreachable beyond the hop budget");
    }

    // Step 4: the main run always honors polarity constraints.
    let mut main_params = params.clone();
    main_params.ignore_polarities = false;

    // Step 5: min-cost, with its own internal coverage-floor relaxation.
    let min_cost = {
        let span = info_span!("min_cost").entered();
        let start = Instant::now();
        let setup = OptimizationSetup::build(topology, &main_params)?;
        let solution = solve_min_cost(topology, &setup, &main_params, &mut solver)?;
        info!(
            objective = solution.objective_value,
            timed_out = solution.timed_out,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "min-cost stage complete"
        );
        maybe_dump_lp(debug_output_dir, "min_cost", &solver);
        drop(span);
        solution
    };
    write_back_stage_solution(topology, &min_cost)?;

    // Step 6: legacy max-coverage or modern redundancy augmentation.
    let coverage_stage = {
        let span = info_span!("coverage_or_redundancy").entered();
        let start = Instant::now();
        let setup = OptimizationSetup::build(topology, &main_params)?;
        let result = if main_params.enable_legacy_redundancy_method {
            solve_max_coverage(topology, &setup, &main_params, &min_cost, &mut solver)
        } else {
            solve_redundancy(topology, &setup, &main_params, &min_cost, &mut solver)
        };
        match result {
            Ok(solution) => {
                info!(
                    objective = solution.objective_value,
                    timed_out = solution.timed_out,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "coverage/redundancy stage complete"
                );
                maybe_dump_lp(debug_output_dir, "coverage_or_redundancy", &solver);
                Some(solution)
            }
            Err(e) => {
                warn!(error = %e, "coverage/redundancy stage failed, continuing with the min-cost design");
                None
            }
        }
    };
    if let Some(solution) = &coverage_stage {
        write_back_stage_solution(topology, solution)?;
    }

    // Step 7 + 8: min-interference, then sector re-orientation against the
    // resulting active neighbour set, iterated together until neither the
    // implied MCS/capacity nor the recomputed azimuths change anything (or
    // the link-budget iteration cap is hit).
    let mut interference = None;
    for iteration in 0..MAX_LINK_BUDGET_ITERATIONS {
        let span = info_span!("min_interference", iteration).entered();
        let start = Instant::now();
        let setup = OptimizationSetup::build(topology, &main_params)?;
        let solution = solve_min_interference(topology, &setup, &main_params, rf_params, &mut solver)?;
        info!(
            objective = solution.objective_value,
            timed_out = solution.timed_out,
            elapsed_ms = start.elapsed().as_millis() as u64,
            iteration,
            "min-interference stage complete"
        );
        write_back_stage_solution(topology, &solution)?;
        let mcs_changed = apply_interference_decisions(topology, &solution, rf_params);
        maybe_dump_lp(debug_output_dir, &format!("min_interference_{iteration}"), &solver);
        drop(span);

        let reorient_span = info_span!("sector_reorientation", iteration).entered();
        let reorient = reorient_sectors(topology, rf_params.horizontal_scan_range_deg);
        info!(
            sectors_reoriented = reorient.sectors_reoriented,
            links_dropped = reorient.links_dropped.len(),
            iteration,
            "sector re-orientation complete"
        );
        drop(reorient_span);

        let objective = solution.objective_value;
        let converged = !mcs_changed && reorient.links_dropped.is_empty();
        interference = Some(solution);
        if converged {
            info!(iteration, "sector re-orientation / link budget loop converged");
            break;
        }
        if iteration + 1 == MAX_LINK_BUDGET_ITERATIONS {
            info!(objective, "sector re-orientation / link budget loop hit its iteration cap without converging");
        }
    }
    let interference = interference.expect("loop runs at least once");

    // Step 9: post-design max-flow routing over the final active topology.
    let post_design = {
        let span = info_span!("post_design_flow").entered();
        let start = Instant::now();
        let setup = OptimizationSetup::build(topology, &main_params)?;
        let result = solve_post_design_flow(topology, &setup, &main_params, &interference, rf_params, &mut solver)?;
        info!(
            buffer = result.buffer,
            timed_out = result.timed_out,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "post-design flow complete"
        );
        maybe_dump_lp(debug_output_dir, "post_design_flow", &solver);
        drop(span);
        result
    };

    for (key, &is_redundant) in &post_design.is_redundant {
        if let Some(link) = topology.get_link_by_site_ids(&key.tx, &key.rx).cloned() {
            if let Some(link_mut) = topology.links.get_mut(&link.link_id) {
                link_mut.is_redundant = is_redundant;
            }
        }
    }

    Ok(PipelineOutput {
        topology: topology.clone(),
        post_design,
        min_cost_objective: min_cost.objective_value,
        interference_objective: interference.objective_value,
    })
}

/// True if any real (non-supersource, non-demand) POP exists with positive
/// capacity; used before the driver runs to turn an unreachable-everything
/// input into the "max POP capacity < demand" diagnostic rather than an
/// opaque infeasibility.
pub fn has_viable_pop_capacity(topology: &Topology, pop_capacity_gbps: f64) -> bool {
    pop_capacity_gbps > 0.0 && topology.sorted_sites().into_iter().any(|s| s.site_type == SiteType::Pop && !s.status.inactive())
}
