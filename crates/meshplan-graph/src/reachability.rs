//! Supersource reachability: the primitive shared by the plain feasibility
//! check, the failure-enumeration metrics, and the adversarial-link search.

use crate::builder::{NodeKind, PlannerGraph};
use std::collections::HashSet;

/// Demand node ids reachable from the supersource, with no simulated
/// failures applied.
pub fn find_connected_demands(pg: &PlannerGraph) -> HashSet<String> {
    reachable_demands_excluding(pg, &HashSet::new(), &HashSet::new())
}

/// Demand node ids still reachable from the supersource after removing the
/// given edges (by link id) and nodes (by site id) from consideration.
pub fn reachable_demands_excluding(
    pg: &PlannerGraph,
    excluded_link_ids: &HashSet<String>,
    excluded_site_ids: &HashSet<String>,
) -> HashSet<String> {
    // A hand-rolled DFS rather than petgraph::visit::Bfs: the walk needs to
    // skip excluded nodes/edges, which a plain visitor over the full graph
    // can't express without a filtered graph view.
    let mut stack = vec![pg.supersource];
    let mut visited = HashSet::new();
    visited.insert(pg.supersource);
    while let Some(node) = stack.pop() {
        if let NodeKind::Site(id) = &pg.graph[node] {
            if excluded_site_ids.contains(id) {
                continue;
            }
        }
        for edge in pg.graph.edges(node) {
            if let Some(link_id) = &edge.weight().link_id {
                if excluded_link_ids.contains(link_id) {
                    continue;
                }
            }
            let target = edge.target();
            if let NodeKind::Site(id) = &pg.graph[target] {
                if excluded_site_ids.contains(id) {
                    continue;
                }
            }
            if visited.insert(target) {
                stack.push(target);
            }
        }
    }

    visited
        .into_iter()
        .filter_map(|idx| match &pg.graph[idx] {
            NodeKind::Demand(id) => Some(id.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_digraph;
    use meshplan_core::demand::DemandSite;
    use meshplan_core::enums::{LocationType, SiteType, StatusType};
    use meshplan_core::geo::GeoPoint;
    use meshplan_core::site::{DeviceSpec, Site};
    use meshplan_core::Topology;

    #[test]
    fn all_demands_reachable_in_simple_tree() {
        let mut topo = Topology::new();
        let dev = DeviceSpec { sku: "SKU".into(), node_capex: 0.0, nodes_per_site: 1 };
        let pop = Site::new(SiteType::Pop, GeoPoint::new(0.0, 0.0, 0.0), dev.clone(), StatusType::Candidate, LocationType::StreetLevel);
        let pop_id = pop.site_id.clone();
        topo.add_site(pop).unwrap();
        let mut demand = DemandSite::new("d1", GeoPoint::new(0.0, 0.0, 0.0), 0.1, 1);
        demand.connected_sites.push(pop_id);
        topo.add_demand_site(demand).unwrap();

        let pg = build_digraph(&topo, StatusType::reachable);
        let reachable = find_connected_demands(&pg);
        assert!(reachable.contains("d1"));
    }
}
