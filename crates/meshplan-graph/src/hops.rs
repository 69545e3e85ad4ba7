//! Unweighted hop distance from the nearest POP, used to drop far-flung
//! candidates beyond `maximum_number_hops`.

use crate::builder::{NodeKind, PlannerGraph};
use std::collections::{HashMap, VecDeque};

/// `site_id -> hops from nearest POP`, computed as a multi-source BFS from
/// every site directly reachable from the supersource with the structural
/// supersource->POP edge's zero cost; POP sites themselves are at hop 0.
pub fn hops_from_pop(pg: &PlannerGraph) -> HashMap<String, u32> {
    let mut dist = HashMap::new();
    let mut queue = VecDeque::new();

    for edge in pg.graph.edges(pg.supersource) {
        let target = edge.target();
        if let NodeKind::Site(id) = &pg.graph[target] {
            dist.insert(id.clone(), 0u32);
            queue.push_back(target);
        }
    }

    while let Some(node) = queue.pop_front() {
        let Some(&d) = (match &pg.graph[node] {
            NodeKind::Site(id) => dist.get(id),
            _ => None,
        }) else {
            continue;
        };
        for edge in pg.graph.edges(node) {
            if let NodeKind::Site(id) = &pg.graph[edge.target()] {
                if !dist.contains_key(id) {
                    dist.insert(id.clone(), d + 1);
                    queue.push_back(edge.target());
                }
            }
        }
    }

    dist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_digraph;
    use meshplan_core::enums::{LocationType, SiteType, StatusType};
    use meshplan_core::geo::GeoPoint;
    use meshplan_core::link::LinkBudget;
    use meshplan_core::site::{DeviceSpec, Site};
    use meshplan_core::{Link, Topology};
    use meshplan_core::enums::LinkType;

    #[test]
    fn pop_is_zero_hops_neighbor_is_one() {
        let mut topo = Topology::new();
        let dev = DeviceSpec { sku: "SKU".into(), node_capex: 0.0, nodes_per_site: 1 };
        let pop = Site::new(SiteType::Pop, GeoPoint::new(0.0, 0.0, 0.0), dev.clone(), StatusType::Candidate, LocationType::StreetLevel);
        let dn = Site::new(SiteType::Dn, GeoPoint::new(0.0, 1.0, 0.0), dev, StatusType::Candidate, LocationType::StreetLevel);
        let (pop_id, dn_id) = (pop.site_id.clone(), dn.site_id.clone());
        topo.add_site(pop).unwrap();
        topo.add_site(dn).unwrap();
        let link = Link::new(pop_id.clone(), dn_id.clone(), LinkType::WirelessBackhaul, StatusType::Candidate, 100.0, LinkBudget::wired(1.0));
        topo.add_link(link).unwrap();

        let pg = build_digraph(&topo, StatusType::reachable);
        let hops = hops_from_pop(&pg);
        assert_eq!(hops[&pop_id], 0);
        assert_eq!(hops[&dn_id], 1);
    }
}
