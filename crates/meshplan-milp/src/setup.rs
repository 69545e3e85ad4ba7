//! Builds the dense index tables every MILP stage reads from, in a single
//! pass over a (read-only) `Topology`: an imaginary supersource feeding every
//! POP, imaginary demand sectors at every demand-serving site, expanded
//! replicated demand, and the wired/wireless link capacity/sector/azimuth
//! lookups.

use crate::error::{MilpError, Result};
use crate::keys::{LinkKey, NodeKey};
use crate::params::OptimizerParams;
use meshplan_core::constants::{DEMAND_SECTOR, SUPERSOURCE, SUPERSOURCE_SECTOR};
use meshplan_core::enums::{LinkType, SiteType, StatusType};
use meshplan_core::Topology;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationClass {
    Pop,
    Dn,
    Cn,
    Demand,
    Supersource,
}

#[derive(Debug, Clone)]
pub struct OptimizationSetup {
    /// Supersource first, then sites in sorted order, then expanded demand
    /// ids in sorted order — the fixed traversal order every stage builds
    /// its variables and constraints in.
    pub locations: Vec<String>,
    pub type_sets: HashMap<LocationClass, HashSet<String>>,
    pub link_capacities: HashMap<LinkKey, f64>,
    pub link_to_sectors: HashMap<LinkKey, (Option<String>, Option<String>)>,
    pub link_to_azimuth: HashMap<LinkKey, (f64, f64)>,
    pub cost_site: HashMap<String, f64>,
    pub cost_sector: HashMap<NodeKey, f64>,
    pub colocated_locations: HashMap<(i64, i64), Vec<String>>,
    pub wired_links: HashSet<LinkKey>,
    pub demand_at_location: HashMap<String, f64>,
    /// Maps an original `DemandSite::demand_id` to its expanded ids.
    pub demand_expansion: HashMap<String, Vec<String>>,
    /// Which site(s) an expanded demand id is delivered through.
    pub demand_connected_sites: HashMap<String, Vec<String>>,
}

impl OptimizationSetup {
    pub fn build(topology: &Topology, params: &OptimizerParams) -> Result<Self> {
        let mut locations = vec![SUPERSOURCE.to_string()];
        let mut type_sets: HashMap<LocationClass, HashSet<String>> = HashMap::new();
        type_sets.entry(LocationClass::Supersource).or_default().insert(SUPERSOURCE.to_string());

        let mut link_capacities = HashMap::new();
        let mut link_to_sectors = HashMap::new();
        let mut link_to_azimuth = HashMap::new();
        let mut cost_site = HashMap::new();
        let mut cost_sector = HashMap::new();
        let mut wired_links = HashSet::new();

        for site in topology.sorted_sites() {
            locations.push(site.site_id.clone());
            let class = match site.site_type {
                SiteType::Pop => LocationClass::Pop,
                SiteType::Dn => LocationClass::Dn,
                SiteType::Cn => LocationClass::Cn,
            };
            type_sets.entry(class).or_default().insert(site.site_id.clone());

            if !site.status.immutable() {
                cost_site.insert(site.site_id.clone(), params.site_capex.get(&site.site_type).copied().unwrap_or(0.0));
            } else {
                cost_site.insert(site.site_id.clone(), 0.0);
            }

            let supersource_link = LinkKey::new(SUPERSOURCE, &site.site_id);
            if site.site_type == SiteType::Pop {
                link_capacities.insert(supersource_link.clone(), params.pop_capacity_gbps);
                wired_links.insert(supersource_link);
            }
        }

        for sector in topology.sorted_sectors() {
            let node_key = NodeKey::new(sector.site_id.clone(), sector.node_id.clone());
            cost_sector.entry(node_key).or_insert(0.0);
        }

        // Node capex is charged once per node even when several sectors
        // share it: seed every (site, node) pair with the device's node_capex
        // exactly once, using whichever sector touches it first in sorted
        // order (sorted_sectors is already stable, so "first" is deterministic).
        let mut seen_nodes: HashSet<NodeKey> = HashSet::new();
        for sector in topology.sorted_sectors() {
            let node_key = NodeKey::new(sector.site_id.clone(), sector.node_id.clone());
            if seen_nodes.insert(node_key.clone()) {
                if let Some(site) = topology.sites.get(&sector.site_id) {
                    if !site.status.immutable() {
                        cost_sector.insert(node_key, site.device.node_capex);
                    }
                }
            }
        }

        for link in topology.sorted_links() {
            let key = LinkKey::new(link.tx_site_id.clone(), link.rx_site_id.clone());
            let capacity = if link.link_type == LinkType::Ethernet { f64::MAX } else { link.budget.capacity_gbps };
            link_capacities.insert(key.clone(), capacity);
            link_to_sectors.insert(key.clone(), (link.tx_sector_id.clone(), link.rx_sector_id.clone()));
            link_to_azimuth.insert(key.clone(), (link.budget.tx_azimuth_deg, link.budget.rx_azimuth_deg));
            if link.link_type == LinkType::Ethernet {
                wired_links.insert(key);
            }
        }

        let mut demand_expansion = HashMap::new();
        let mut demand_connected_sites = HashMap::new();
        let mut demand_at_location = HashMap::new();
        for demand in topology.sorted_demand_sites() {
            let expanded = demand.expanded_ids();
            for id in &expanded {
                locations.push(id.clone());
                type_sets.entry(LocationClass::Demand).or_default().insert(id.clone());
                demand_at_location.insert(id.clone(), demand.demand_gbps / params.oversubscription.max(1.0));
                demand_connected_sites.insert(id.clone(), demand.connected_sites.clone());
                for site_id in &demand.connected_sites {
                    let key = LinkKey::new(site_id.clone(), id.clone());
                    link_capacities.insert(key.clone(), f64::MAX);
                    wired_links.insert(key);
                }
            }
            demand_expansion.insert(demand.demand_id.clone(), expanded);
        }

        let mut colocated_locations: HashMap<(i64, i64), Vec<String>> = HashMap::new();
        for site in topology.sorted_sites() {
            let key = ((site.location.latitude * 1e9).round() as i64, (site.location.longitude * 1e9).round() as i64);
            colocated_locations.entry(key).or_default().push(site.site_id.clone());
        }

        let setup = Self {
            locations,
            type_sets,
            link_capacities,
            link_to_sectors,
            link_to_azimuth,
            cost_site,
            cost_sector,
            colocated_locations,
            wired_links,
            demand_at_location,
            demand_expansion,
            demand_connected_sites,
        };
        setup.check_feasibility(topology)?;
        Ok(setup)
    }

    fn check_feasibility(&self, topology: &Topology) -> Result<()> {
        let pops = self.type_sets.get(&LocationClass::Pop).cloned().unwrap_or_default();
        let any_pop_capacity = pops.iter().any(|pop| {
            self.link_capacities.get(&LinkKey::new(SUPERSOURCE, pop.as_str())).copied().unwrap_or(0.0) > 0.0
        });
        if !pops.is_empty() && !any_pop_capacity {
            return Err(MilpError::NoPopCapacity);
        }

        let cns = self.type_sets.get(&LocationClass::Cn).cloned().unwrap_or_default();
        let demand_adjacent_dns: HashSet<&str> = self
            .demand_connected_sites
            .values()
            .flat_map(|v| v.iter().map(String::as_str))
            .collect();

        let any_incoming = topology.sorted_links().into_iter().any(|l| {
            (cns.contains(&l.rx_site_id) || demand_adjacent_dns.contains(l.rx_site_id.as_str()))
                && self.link_capacities.get(&LinkKey::new(l.tx_site_id.clone(), l.rx_site_id.clone())).copied().unwrap_or(0.0) > 0.0
        });
        if (!cns.is_empty() || !demand_adjacent_dns.is_empty()) && !any_incoming {
            return Err(MilpError::NoDemandAdjacentCapacity);
        }
        Ok(())
    }

    /// The imaginary supersource-sector id feeding a given POP.
    pub fn supersource_sector_id(pop_site_id: &str) -> String {
        format!("{SUPERSOURCE_SECTOR}_{pop_site_id}")
    }

    /// The imaginary demand-facing sector id at a site serving demand.
    pub fn demand_sector_id(site_id: &str) -> String {
        format!("{DEMAND_SECTOR}_{site_id}")
    }

    pub fn is_demand(&self, location: &str) -> bool {
        self.type_sets.get(&LocationClass::Demand).is_some_and(|s| s.contains(location))
    }

    pub fn is_supersource(&self, location: &str) -> bool {
        location == SUPERSOURCE
    }

    /// All real (non-supersource, non-demand) site ids, in sorted order.
    pub fn real_sites<'a>(&'a self, topology: &'a Topology) -> Vec<&'a str> {
        topology.sorted_sites().into_iter().map(|s| s.site_id.as_str()).collect()
    }
}
