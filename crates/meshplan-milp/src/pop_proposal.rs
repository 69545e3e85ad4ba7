//! Proposal of extra POP locations: solves max-coverage over an access-only
//! view of the topology (every DN relabeled as a POP, backhaul stripped) to
//! find which DN locations are worth promoting, then duplicates each
//! selected DN into a new candidate POP site in the real topology.

use crate::base::{check_solve_ok, NetworkOptimization};
use crate::error::Result;
use crate::params::OptimizerParams;
use crate::setup::OptimizationSetup;
use meshplan_core::enums::{LinkType, SiteType, StatusType};
use meshplan_core::sector::Sector;
use meshplan_core::site::Site;
use meshplan_core::{Link, Topology};
use meshplan_solver::{ConstraintSense, LinearExpr, MipSolver, ObjectiveSense};

#[derive(Debug, Clone, Default)]
pub struct PopProposalOutcome {
    /// Ids of the newly duplicated candidate POP sites, one per selected DN.
    pub duplicated_pop_ids: Vec<String>,
    pub objective_value: f64,
}

/// Mutates `topology` in place, adding one candidate POP per DN the
/// access-only max-coverage solve selects.
pub fn run_pop_proposal(
    topology: &mut Topology,
    params: &OptimizerParams,
    solver: &mut dyn MipSolver,
) -> Result<PopProposalOutcome> {
    let access_only = build_access_only_topology(topology);

    let setup = OptimizationSetup::build(&access_only, params)?;
    let mut opt = NetworkOptimization::new(&access_only, &setup, params);

    opt.add_flow_balance_constraints(solver);
    opt.add_capacity_constraints(solver);
    opt.add_tdm_per_sector_constraints(solver);
    opt.add_pop_capacity_constraints(solver);
    opt.add_p2mp_constraints(solver);
    opt.add_cn_incoming_constraints(solver);
    opt.add_node_coupling_constraints(solver);

    let relabeled_dn_ids: Vec<String> = access_only
        .sorted_sites()
        .into_iter()
        .filter(|s| s.site_type == SiteType::Pop && topology.sites.get(&s.site_id).is_some_and(|o| o.site_type == SiteType::Dn))
        .map(|s| s.site_id.clone())
        .collect();

    let mut pop_count_expr = LinearExpr::new();
    for site_id in &relabeled_dn_ids {
        let idx = opt.ensure_site_var(solver, site_id);
        pop_count_expr.add_term(idx, 1.0);
    }
    solver.add_constraint(
        Some("target_pop_count"),
        pop_count_expr,
        ConstraintSense::Le,
        params.number_of_extra_pops as f64,
    );

    let coverage_expr = opt.shortage_sum_expression(solver);
    solver.set_objective(coverage_expr, ObjectiveSense::Minimize);

    let budget = params.stage_budgets.pop_proposal;
    solver.solve(budget.rel_stop, budget.max_time_minutes, params.num_threads)?;
    check_solve_ok(solver, "pop_proposal")?;

    let objective_value = solver.objective_value().unwrap_or(0.0);

    let mut duplicated = Vec::new();
    for dn_site_id in &relabeled_dn_ids {
        let &idx = opt.vars.site.get(dn_site_id).expect("site var registered above");
        if solver.value_of(idx)? > 0.5 {
            let new_pop_id = duplicate_dn_as_pop(topology, dn_site_id);
            duplicated.push(new_pop_id);
        }
    }

    Ok(PopProposalOutcome { duplicated_pop_ids: duplicated, objective_value })
}

/// Clones `topology`, relabels every DN not already co-located with a real
/// POP into a POP (site ids are left untouched so the candidate solve's
/// decisions map straight back onto the real topology), and removes every
/// backhaul link so only POP-to-CN/DN access links carry flow.
fn build_access_only_topology(topology: &Topology) -> Topology {
    let mut access_only = topology.clone();

    let dn_ids: Vec<String> = access_only.sorted_sites().into_iter().filter(|s| s.site_type == SiteType::Dn).map(|s| s.site_id.clone()).collect();
    for dn_id in dn_ids {
        let colocated_with_real_pop = access_only.get_colocated_sites(&dn_id).iter().any(|s| s.site_type == SiteType::Pop);
        if colocated_with_real_pop {
            continue;
        }
        if let Some(site) = access_only.sites.get_mut(&dn_id) {
            site.site_type = SiteType::Pop;
        }
    }

    let backhaul_ids: Vec<String> = access_only
        .sorted_links()
        .into_iter()
        .filter(|l| l.link_type == LinkType::WirelessBackhaul)
        .map(|l| l.link_id.clone())
        .collect();
    for link_id in backhaul_ids {
        let _ = access_only.remove_link(&link_id);
    }

    access_only
}

/// Adds a new candidate POP site at the same location as `dn_site_id`, with
/// duplicated sectors and incident wireless links (excluding links to a real
/// POP), and extends any demand served by the DN to the new POP too. Returns
/// the new site's id.
fn duplicate_dn_as_pop(topology: &mut Topology, dn_site_id: &str) -> String {
    let original = topology.sites.get(dn_site_id).expect("dn site exists").clone();
    let new_pop = Site::new(SiteType::Pop, original.location, original.device.clone(), StatusType::Candidate, original.location_type);
    let new_pop_id = new_pop.site_id.clone();
    if topology.sites.contains_key(&new_pop_id) {
        return new_pop_id;
    }
    topology.add_site(new_pop).expect("new pop id is unique by construction");

    let mut sector_id_map = std::collections::HashMap::new();
    for sector in topology.sorted_sectors().into_iter().filter(|s| s.site_id == dn_site_id).cloned().collect::<Vec<_>>() {
        let mut duplicate = Sector::new(
            new_pop_id.clone(),
            sector.node_id.clone(),
            sector.position_in_node,
            sector.ant_azimuth_deg,
            sector.sector_type,
            StatusType::Candidate,
        );
        duplicate.channel = sector.channel;
        sector_id_map.insert(sector.sector_id.clone(), duplicate.sector_id.clone());
        let _ = topology.add_sector(duplicate);
    }

    let is_real_pop = |site_id: &str, topo: &Topology| topo.sites.get(site_id).is_some_and(|s| s.site_type == SiteType::Pop);

    let outgoing: Vec<String> = topology.successors(dn_site_id).iter().map(|s| s.to_string()).collect();
    let incoming: Vec<String> = topology.predecessors(dn_site_id).iter().map(|s| s.to_string()).collect();

    for neighbor in outgoing {
        if is_real_pop(&neighbor, topology) {
            continue;
        }
        let Some(link) = topology.get_link_by_site_ids(dn_site_id, &neighbor).cloned() else { continue };
        if !link.is_wireless() {
            continue;
        }
        let mut duplicate = Link::new(new_pop_id.clone(), neighbor.clone(), link.link_type, StatusType::Candidate, link.distance_m, link.budget.clone());
        duplicate.tx_sector_id = link.tx_sector_id.and_then(|id| sector_id_map.get(&id).cloned());
        duplicate.rx_sector_id = link.rx_sector_id;
        let _ = topology.add_link(duplicate);
    }
    for neighbor in incoming {
        if is_real_pop(&neighbor, topology) {
            continue;
        }
        let Some(link) = topology.get_link_by_site_ids(&neighbor, dn_site_id).cloned() else { continue };
        if !link.is_wireless() {
            continue;
        }
        let mut duplicate = Link::new(neighbor.clone(), new_pop_id.clone(), link.link_type, StatusType::Candidate, link.distance_m, link.budget.clone());
        duplicate.tx_sector_id = link.tx_sector_id;
        duplicate.rx_sector_id = link.rx_sector_id.and_then(|id| sector_id_map.get(&id).cloned());
        let _ = topology.add_link(duplicate);
    }

    let demand_ids: Vec<String> = topology
        .sorted_demand_sites()
        .into_iter()
        .filter(|d| d.connected_sites.iter().any(|s| s == dn_site_id))
        .map(|d| d.demand_id.clone())
        .collect();
    for demand_id in demand_ids {
        if let Some(demand) = topology.demand_sites.get_mut(&demand_id) {
            demand.connected_sites.push(new_pop_id.clone());
        }
    }

    new_pop_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::StageBudgets;
    use meshplan_core::demand::DemandSite;
    use meshplan_core::enums::{LocationType, RedundancyLevel, SectorType, TopologyRouting};
    use meshplan_core::geo::GeoPoint;
    use meshplan_core::link::LinkBudget;
    use meshplan_core::site::DeviceSpec;
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
            number_of_extra_pops: 1,
            ignore_polarities: false,
        }
    }

    fn dev() -> DeviceSpec {
        DeviceSpec { sku: "SKU".into(), node_capex: 500.0, nodes_per_site: 1 }
    }

    #[test]
    fn duplicating_a_dn_carries_its_demand_along() {
        let mut topo = Topology::new();
        let pop = Site::new(SiteType::Pop, GeoPoint::new(0.0, 0.0, 0.0), dev(), StatusType::Existing, LocationType::StreetLevel);
        let dn = Site::new(SiteType::Dn, GeoPoint::new(0.0, 1.0, 0.0), dev(), StatusType::Candidate, LocationType::StreetLevel);
        let (pop_id, dn_id) = (pop.site_id.clone(), dn.site_id.clone());
        topo.add_site(pop).unwrap();
        topo.add_site(dn).unwrap();

        let sec_dn = Sector::new(dn_id.clone(), "n0", 0, 0.0, SectorType::Dn, StatusType::Candidate);
        topo.add_sector(sec_dn).unwrap();

        let link = Link::new(pop_id, dn_id.clone(), LinkType::WirelessBackhaul, StatusType::Candidate, 500.0, LinkBudget::wired(1.0));
        topo.add_link(link).unwrap();

        let mut demand = DemandSite::new("d1", GeoPoint::new(0.0, 1.0, 0.0), 0.1, 1);
        demand.connected_sites.push(dn_id.clone());
        topo.add_demand_site(demand).unwrap();

        let new_pop_id = duplicate_dn_as_pop(&mut topo, &dn_id);
        assert!(topo.sites.contains_key(&new_pop_id));
        assert_eq!(topo.sites[&new_pop_id].site_type, SiteType::Pop);
        assert!(topo.demand_sites["d1"].connected_sites.contains(&new_pop_id));
    }

    #[test]
    fn access_only_topology_strips_backhaul_and_relabels_dns() {
        let mut topo = Topology::new();
        let pop = Site::new(SiteType::Pop, GeoPoint::new(0.0, 0.0, 0.0), dev(), StatusType::Existing, LocationType::StreetLevel);
        let dn = Site::new(SiteType::Dn, GeoPoint::new(0.0, 1.0, 0.0), dev(), StatusType::Candidate, LocationType::StreetLevel);
        let (pop_id, dn_id) = (pop.site_id.clone(), dn.site_id.clone());
        topo.add_site(pop).unwrap();
        topo.add_site(dn).unwrap();
        let link = Link::new(pop_id, dn_id.clone(), LinkType::WirelessBackhaul, StatusType::Candidate, 500.0, LinkBudget::wired(1.0));
        topo.add_link(link).unwrap();

        let access_only = build_access_only_topology(&topo);
        assert!(access_only.sorted_links().is_empty());
        assert_eq!(access_only.sites[&dn_id].site_type, SiteType::Pop);
        let _ = params();
    }
}
