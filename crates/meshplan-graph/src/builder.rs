//! Builds the routing graph a Topology implies: an external supersource
//! feeding every POP, real sites and links in between, and demand sinks
//! reachable from the sites that serve them.

use meshplan_core::enums::{LinkType, SiteType, StatusType};
use meshplan_core::constants::SUPERSOURCE;
use meshplan_core::Topology;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Supersource,
    Site(String),
    Demand(String),
}

impl NodeKind {
    pub fn id(&self) -> &str {
        match self {
            NodeKind::Supersource => SUPERSOURCE,
            NodeKind::Site(id) | NodeKind::Demand(id) => id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EdgeAttr {
    pub link_id: Option<String>,
    pub link_type: Option<LinkType>,
    /// MCS-derived routing cost; lower is preferred.
    pub cost: f64,
    pub capacity_gbps: f64,
}

impl EdgeAttr {
    fn structural(capacity_gbps: f64) -> Self {
        Self { link_id: None, link_type: None, cost: 0.0, capacity_gbps }
    }
}

pub struct PlannerGraph {
    pub graph: DiGraph<NodeKind, EdgeAttr>,
    pub index: HashMap<String, NodeIndex>,
    pub supersource: NodeIndex,
}

impl PlannerGraph {
    pub fn node_of(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }
}

/// `status_filter` selects which site/link statuses participate (e.g.
/// `StatusType::reachable` for a plain routing graph, `StatusType::active`
/// for a final as-built graph).
pub fn build_digraph(topology: &Topology, status_filter: impl Fn(StatusType) -> bool) -> PlannerGraph {
    let mut graph = DiGraph::new();
    let mut index = HashMap::new();

    let supersource = graph.add_node(NodeKind::Supersource);
    index.insert(SUPERSOURCE.to_string(), supersource);

    for site in topology.sorted_sites() {
        if !status_filter(site.status) {
            continue;
        }
        let idx = graph.add_node(NodeKind::Site(site.site_id.clone()));
        index.insert(site.site_id.clone(), idx);
    }

    for site in topology.sorted_sites() {
        if site.site_type == SiteType::Pop && status_filter(site.status) {
            if let Some(&idx) = index.get(&site.site_id) {
                graph.add_edge(supersource, idx, EdgeAttr::structural(f64::INFINITY));
            }
        }
    }

    for link in topology.sorted_links() {
        if !status_filter(link.status) {
            continue;
        }
        let (Some(&tx), Some(&rx)) = (index.get(&link.tx_site_id), index.get(&link.rx_site_id)) else {
            continue;
        };
        let cost = if link.budget.mcs_level == 0 { link.distance_m.max(1.0) } else { 1.0 / (link.budget.mcs_level as f64) };
        graph.add_edge(
            tx,
            rx,
            EdgeAttr {
                link_id: Some(link.link_id.clone()),
                link_type: Some(link.link_type),
                cost,
                capacity_gbps: link.budget.capacity_gbps,
            },
        );
    }

    for demand in topology.sorted_demand_sites() {
        for demand_id in demand.expanded_ids() {
            let demand_idx = graph.add_node(NodeKind::Demand(demand_id.clone()));
            index.insert(demand_id.clone(), demand_idx);
            for site_id in &demand.connected_sites {
                if let Some(&site_idx) = index.get(site_id) {
                    graph.add_edge(site_idx, demand_idx, EdgeAttr::structural(demand.demand_gbps));
                }
            }
        }
    }

    PlannerGraph { graph, index, supersource }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshplan_core::enums::LocationType;
    use meshplan_core::geo::GeoPoint;
    use meshplan_core::site::{DeviceSpec, Site};
    use meshplan_core::demand::DemandSite;

    #[test]
    fn supersource_connects_to_pops_only() {
        let mut topo = Topology::new();
        let dev = DeviceSpec { sku: "SKU".into(), node_capex: 0.0, nodes_per_site: 1 };
        let pop = Site::new(SiteType::Pop, GeoPoint::new(0.0, 0.0, 0.0), dev.clone(), StatusType::Candidate, LocationType::StreetLevel);
        let dn = Site::new(SiteType::Dn, GeoPoint::new(0.0, 1.0, 0.0), dev, StatusType::Candidate, LocationType::StreetLevel);
        topo.add_site(pop).unwrap();
        topo.add_site(dn).unwrap();

        let g = build_digraph(&topo, StatusType::reachable);
        assert_eq!(g.graph.edges(g.supersource).count(), 1);
    }

    #[test]
    fn demand_sites_get_their_own_nodes() {
        let mut topo = Topology::new();
        let dev = DeviceSpec { sku: "SKU".into(), node_capex: 0.0, nodes_per_site: 1 };
        let dn = Site::new(SiteType::Dn, GeoPoint::new(0.0, 0.0, 0.0), dev, StatusType::Candidate, LocationType::StreetLevel);
        let dn_id = dn.site_id.clone();
        topo.add_site(dn).unwrap();
        let mut demand = DemandSite::new("d1", GeoPoint::new(0.0, 0.0, 0.0), 0.1, 1);
        demand.connected_sites.push(dn_id);
        topo.add_demand_site(demand).unwrap();

        let g = build_digraph(&topo, StatusType::reachable);
        assert!(g.node_of("d1").is_some());
    }
}
