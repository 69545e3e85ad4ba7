//! Single-failure disruption enumeration: how many demand points would be
//! disconnected if one backhaul edge, or one DN/POP site, were removed.
//! Feeds both the adversarial-link search (max-coverage stage) and the
//! analyzer's disruption metric.

use crate::builder::{NodeKind, PlannerGraph};
use crate::reachability::{find_connected_demands, reachable_demands_excluding};
use meshplan_core::enums::{LinkType, SiteType};
use std::collections::{HashMap, HashSet};

/// `link_id -> number of demand points disconnected by removing that link`,
/// restricted to wireless backhaul edges (access and wired links are not
/// considered failure points here).
pub fn single_edge_failures(pg: &PlannerGraph) -> HashMap<String, usize> {
    let baseline = find_connected_demands(pg);
    let mut out = HashMap::new();

    for edge in pg.graph.edge_indices() {
        let attr = &pg.graph[edge];
        let Some(link_id) = attr.link_id.clone() else { continue };
        if attr.link_type != Some(LinkType::WirelessBackhaul) {
            continue;
        }
        let mut excluded = HashSet::new();
        excluded.insert(link_id.clone());
        let after = reachable_demands_excluding(pg, &excluded, &HashSet::new());
        let lost = baseline.difference(&after).count();
        out.insert(link_id, lost);
    }
    out
}

/// `site_id -> number of demand points disconnected by removing that DN/POP
/// site`. CN sites are terminal and excluded (their removal cannot
/// disconnect anything else).
pub fn single_site_failures(pg: &PlannerGraph, site_types: &HashMap<String, SiteType>) -> HashMap<String, usize> {
    let baseline = find_connected_demands(pg);
    let mut out = HashMap::new();

    for node in pg.graph.node_indices() {
        let NodeKind::Site(id) = &pg.graph[node] else { continue };
        if site_types.get(id) == Some(&SiteType::Cn) {
            continue;
        }
        let mut excluded = HashSet::new();
        excluded.insert(id.clone());
        let after = reachable_demands_excluding(pg, &HashSet::new(), &excluded);
        let lost = baseline.difference(&after).count();
        out.insert(id.clone(), lost);
    }
    out
}

/// Picks up to `k` backhaul links from `proposed`, most-disruptive first,
/// accepting a link only if removing it from `candidate` would not
/// additionally disconnect any demand point beyond what is already lost —
/// i.e. the candidate network has a viable reroute.
pub fn find_most_disruptive_links(proposed: &PlannerGraph, candidate: &PlannerGraph, k: usize) -> Vec<String> {
    let proposed_failures = single_edge_failures(proposed);
    let mut ranked: Vec<(String, usize)> = proposed_failures.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let candidate_baseline = find_connected_demands(candidate);
    let mut accepted = Vec::new();

    for (link_id, disruption) in ranked {
        if disruption == 0 {
            continue;
        }
        let mut excluded = HashSet::new();
        excluded.insert(link_id.clone());
        let after = reachable_demands_excluding(candidate, &excluded, &HashSet::new());
        if after.len() == candidate_baseline.len() {
            accepted.push(link_id);
            if accepted.len() == k {
                break;
            }
        }
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_digraph;
    use meshplan_core::demand::DemandSite;
    use meshplan_core::enums::{LocationType, StatusType};
    use meshplan_core::geo::GeoPoint;
    use meshplan_core::link::LinkBudget;
    use meshplan_core::site::{DeviceSpec, Site};
    use meshplan_core::{Link, Topology};

    #[test]
    fn single_link_to_sole_demand_path_is_disruptive() {
        let mut topo = Topology::new();
        let dev = DeviceSpec { sku: "SKU".into(), node_capex: 0.0, nodes_per_site: 1 };
        let pop = Site::new(SiteType::Pop, GeoPoint::new(0.0, 0.0, 0.0), dev.clone(), StatusType::Candidate, LocationType::StreetLevel);
        let dn = Site::new(SiteType::Dn, GeoPoint::new(0.0, 1.0, 0.0), dev, StatusType::Candidate, LocationType::StreetLevel);
        let (pop_id, dn_id) = (pop.site_id.clone(), dn.site_id.clone());
        topo.add_site(pop).unwrap();
        topo.add_site(dn.clone()).unwrap();
        let link = Link::new(pop_id, dn_id.clone(), LinkType::WirelessBackhaul, StatusType::Candidate, 500.0, LinkBudget::wired(1.0));
        let link_id = link.link_id.clone();
        topo.add_link(link).unwrap();
        let mut demand = DemandSite::new("d1", GeoPoint::new(0.0, 1.0, 0.0), 0.1, 1);
        demand.connected_sites.push(dn_id);
        topo.add_demand_site(demand).unwrap();

        let pg = build_digraph(&topo, StatusType::reachable);
        let failures = single_edge_failures(&pg);
        assert_eq!(failures.get(&link_id), Some(&1));
    }
}
