//! Demand routing: shortest-path-style traversal from the supersource to
//! every demand point, in one of three modes, plus the disjoint-path
//! classification used by the redundancy heuristics.

use crate::builder::{NodeKind, PlannerGraph};
use meshplan_core::enums::{LinkType, TopologyRouting};
use petgraph::algo::astar;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone)]
pub struct RouteResult {
    pub demand_id: String,
    /// Node ids along the path, supersource first, demand id last.
    pub path: Vec<String>,
    pub total_cost: f64,
}

fn edge_cost(pg: &PlannerGraph, edge: petgraph::graph::EdgeIndex, mode: TopologyRouting) -> f64 {
    match mode {
        TopologyRouting::ShortestPath => 1.0,
        TopologyRouting::McsCostPath | TopologyRouting::DpaPath => pg.graph[edge].cost,
    }
}

fn node_label(pg: &PlannerGraph, idx: NodeIndex) -> String {
    pg.graph[idx].id().to_string()
}

fn shortest_path_to(pg: &PlannerGraph, target: NodeIndex, mode: TopologyRouting) -> Option<(Vec<NodeIndex>, f64)> {
    astar(
        &pg.graph,
        pg.supersource,
        |n| n == target,
        |e| edge_cost(pg, e.id(), mode),
        |_| 0.0,
    )
    .map(|(cost, path)| (path, cost))
}

/// Unweighted-hop zone assignment for [`TopologyRouting::DpaPath`]: every
/// site is assigned to the POP its unweighted shortest path from the
/// supersource passes through first.
fn pop_zones(pg: &PlannerGraph) -> HashMap<NodeIndex, NodeIndex> {
    let mut zone = HashMap::new();
    let mut queue = VecDeque::new();
    for edge in pg.graph.edges(pg.supersource) {
        let pop = edge.target();
        zone.insert(pop, pop);
        queue.push_back(pop);
    }
    while let Some(node) = queue.pop_front() {
        let z = zone[&node];
        for edge in pg.graph.edges(node) {
            let target = edge.target();
            if zone.contains_key(&target) {
                continue;
            }
            if let NodeKind::Site(_) = &pg.graph[target] {
                zone.insert(target, z);
                queue.push_back(target);
            }
        }
    }
    zone
}

/// Computes a route from the supersource to every demand point.
/// `McsCostPath` weights edges by the MCS-derived routing cost; `DpaPath`
/// additionally restricts each demand's path to sites within its POP zone,
/// falling back to the unrestricted weighted path if no zone-internal route
/// exists.
pub fn get_topology_routing_results(pg: &PlannerGraph, mode: TopologyRouting) -> Vec<RouteResult> {
    let demand_nodes: Vec<NodeIndex> = pg
        .graph
        .node_indices()
        .filter(|&idx| matches!(&pg.graph[idx], NodeKind::Demand(_)))
        .collect();

    let zones = if mode == TopologyRouting::DpaPath { Some(pop_zones(pg)) } else { None };

    let mut results = Vec::new();
    for target in demand_nodes {
        let NodeKind::Demand(demand_id) = pg.graph[target].clone() else { unreachable!() };

        let found = if let Some(zones) = &zones {
            // Find the serving site (predecessor of the demand node) to know
            // which zone this demand belongs to, then search restricted to
            // that zone's nodes plus the supersource and the zone's POP.
            let serving_zone = pg
                .graph
                .edges_directed(target, petgraph::Direction::Incoming)
                .next()
                .and_then(|e| zones.get(&e.source()).copied());

            astar(
                &pg.graph,
                pg.supersource,
                |n| n == target,
                |e| {
                    let cost = pg.graph[e.id()].cost;
                    match serving_zone {
                        Some(zone) if zones.get(&e.target()).is_some_and(|z| *z != zone) => f64::INFINITY,
                        _ => cost,
                    }
                },
                |_| 0.0,
            )
            .filter(|(cost, _)| cost.is_finite())
            .or_else(|| shortest_path_to(pg, target, TopologyRouting::McsCostPath))
        } else {
            shortest_path_to(pg, target, mode)
        };

        if let Some((path, cost)) = found {
            results.push(RouteResult {
                demand_id,
                path: path.into_iter().map(|idx| node_label(pg, idx)).collect(),
                total_cost: cost,
            });
        }
    }
    results
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisjointClass {
    /// A second path exists sharing no intermediate backhaul node.
    DisjointConnected,
    /// The only alternative route shares the POP but no DN.
    PopAdjacent,
    Disconnected,
}

/// For each demand point, removes the backhaul edges of its shortest path
/// and classifies whether (and how) it remains reachable.
pub fn disjoint_paths(pg: &PlannerGraph, mode: TopologyRouting) -> HashMap<String, DisjointClass> {
    let mut out = HashMap::new();
    for route in get_topology_routing_results(pg, mode) {
        let backhaul_link_ids: HashSet<String> = route
            .path
            .windows(2)
            .filter_map(|w| {
                let a = pg.node_of(&w[0])?;
                let b = pg.node_of(&w[1])?;
                let edge = pg.graph.find_edge(a, b)?;
                let attr = &pg.graph[edge];
                if attr.link_type == Some(LinkType::WirelessBackhaul) {
                    attr.link_id.clone()
                } else {
                    None
                }
            })
            .collect();

        if backhaul_link_ids.is_empty() {
            out.insert(route.demand_id, DisjointClass::DisjointConnected);
            continue;
        }

        let target = match pg.node_of(&route.demand_id) {
            Some(t) => t,
            None => continue,
        };
        let alt = astar(
            &pg.graph,
            pg.supersource,
            |n| n == target,
            |e| {
                if let Some(id) = &pg.graph[e.id()].link_id {
                    if backhaul_link_ids.contains(id) {
                        return f64::INFINITY;
                    }
                }
                pg.graph[e.id()].cost.max(1.0)
            },
            |_| 0.0,
        );

        let class = match alt {
            Some((cost, alt_path)) if cost.is_finite() => {
                let shares_dn = alt_path.iter().skip(1).take(alt_path.len().saturating_sub(2)).any(|n| {
                    route.path.iter().any(|p| p == &node_label(pg, *n))
                });
                if shares_dn {
                    DisjointClass::PopAdjacent
                } else {
                    DisjointClass::DisjointConnected
                }
            }
            _ => DisjointClass::Disconnected,
        };
        out.insert(route.demand_id, class);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_digraph;
    use meshplan_core::demand::DemandSite;
    use meshplan_core::enums::{LocationType, SiteType, StatusType};
    use meshplan_core::geo::GeoPoint;
    use meshplan_core::link::LinkBudget;
    use meshplan_core::site::{DeviceSpec, Site};
    use meshplan_core::{Link, Topology};

    #[test]
    fn shortest_path_reaches_demand() {
        let mut topo = Topology::new();
        let dev = DeviceSpec { sku: "SKU".into(), node_capex: 0.0, nodes_per_site: 1 };
        let pop = Site::new(SiteType::Pop, GeoPoint::new(0.0, 0.0, 0.0), dev.clone(), StatusType::Candidate, LocationType::StreetLevel);
        let dn = Site::new(SiteType::Dn, GeoPoint::new(0.0, 1.0, 0.0), dev, StatusType::Candidate, LocationType::StreetLevel);
        let (pop_id, dn_id) = (pop.site_id.clone(), dn.site_id.clone());
        topo.add_site(pop).unwrap();
        topo.add_site(dn).unwrap();
        let link = Link::new(pop_id, dn_id.clone(), LinkType::WirelessBackhaul, StatusType::Candidate, 300.0, LinkBudget::wired(1.0));
        topo.add_link(link).unwrap();
        let mut demand = DemandSite::new("d1", GeoPoint::new(0.0, 1.0, 0.0), 0.1, 1);
        demand.connected_sites.push(dn_id);
        topo.add_demand_site(demand).unwrap();

        let pg = build_digraph(&topo, StatusType::reachable);
        let results = get_topology_routing_results(&pg, TopologyRouting::ShortestPath);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].demand_id, "d1");
    }
}
