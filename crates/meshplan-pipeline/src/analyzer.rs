//! Post-solve reporting: capex, component counts, demand coverage, failure
//! disruption, availability, MCS distribution and deployment-rule violation
//! counts. Runs once, after the driver has produced a final topology and a
//! post-design flow; never mutates the topology it reads.

use meshplan_core::enums::{LinkType, SiteType, StatusType};
use meshplan_core::topology::Topology;
use meshplan_graph::{
    build_digraph, compute_availability, find_connected_demands, single_edge_failures,
    single_site_failures,
};
use meshplan_milp::{OptimizerParams, PostDesignFlowResult};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Default)]
pub struct DisruptionStats {
    pub avg_demand_points_lost: f64,
    pub max_demand_points_lost: usize,
    pub min_demand_points_lost: usize,
}

impl DisruptionStats {
    fn from_counts(counts: impl Iterator<Item = usize>) -> Self {
        let values: Vec<usize> = counts.collect();
        if values.is_empty() {
            return Self::default();
        }
        let sum: usize = values.iter().sum();
        Self {
            avg_demand_points_lost: sum as f64 / values.len() as f64,
            max_demand_points_lost: *values.iter().max().unwrap(),
            min_demand_points_lost: *values.iter().min().unwrap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct AnalysisMetrics {
    pub total_capex: f64,
    pub proposed_capex: f64,
    pub site_counts_by_type: HashMap<String, usize>,
    pub link_counts_by_type: HashMap<String, usize>,
    pub channel_counts: HashMap<u32, usize>,
    pub sku_counts: HashMap<String, usize>,
    pub total_demand_gbps: f64,
    pub served_demand_gbps: f64,
    pub unserved_demand_gbps: f64,
    pub edge_failure_disruption: DisruptionStats,
    pub site_failure_disruption: DisruptionStats,
    pub availability_p50: f64,
    pub availability_p95: f64,
    pub availability_p99: f64,
    pub mcs_histogram: HashMap<u32, usize>,
    pub deployment_rule_violations: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    pub site_capex: HashMap<String, f64>,
    pub site_utilization: HashMap<String, f64>,
    pub link_flow: HashMap<String, f64>,
    pub link_utilization: HashMap<String, f64>,
    pub metrics: AnalysisMetrics,
}

impl AnalysisReport {
    pub fn empty() -> Self {
        Self::default()
    }
}

fn link_type_key(t: LinkType) -> &'static str {
    match t {
        LinkType::WirelessBackhaul => "wireless_backhaul",
        LinkType::WirelessAccess => "wireless_access",
        LinkType::Ethernet => "ethernet",
    }
}

fn site_type_key(t: SiteType) -> &'static str {
    match t {
        SiteType::Pop => "pop",
        SiteType::Dn => "dn",
        SiteType::Cn => "cn",
    }
}

fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 1.0;
    }
    let idx = ((pct / 100.0) * (sorted.len() as f64 - 1.0)).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Counts deployment-rule violations that should never occur in a solved
/// topology but are cheap to re-check here as a sanity net: per-DN-sector
/// link counts above `dn_dn_sector_limit`/`dn_total_sector_limit`, and CN
/// sites with more than one active incoming link.
fn count_deployment_rule_violations(topology: &Topology, params: &OptimizerParams) -> usize {
    let mut violations = 0;
    let mut dn_dn_incident: HashMap<&str, u32> = HashMap::new();
    let mut dn_total_incident: HashMap<&str, u32> = HashMap::new();
    let mut cn_incoming: HashMap<&str, u32> = HashMap::new();

    for link in topology.sorted_links() {
        if !link.status.active() {
            continue;
        }
        let Some(tx) = topology.sites.get(&link.tx_site_id) else { continue };
        let Some(rx) = topology.sites.get(&link.rx_site_id) else { continue };

        if tx.site_type != SiteType::Cn {
            *dn_total_incident.entry(tx.site_id.as_str()).or_default() += 1;
        }
        if rx.site_type != SiteType::Cn {
            *dn_total_incident.entry(rx.site_id.as_str()).or_default() += 1;
        }
        if tx.site_type != SiteType::Cn && rx.site_type != SiteType::Cn {
            *dn_dn_incident.entry(tx.site_id.as_str()).or_default() += 1;
            *dn_dn_incident.entry(rx.site_id.as_str()).or_default() += 1;
        }
        if rx.site_type == SiteType::Cn {
            *cn_incoming.entry(rx.site_id.as_str()).or_default() += 1;
        }
    }

    violations += dn_dn_incident.values().filter(|&&c| c > params.dn_dn_sector_limit).count();
    violations += dn_total_incident.values().filter(|&&c| c > params.dn_total_sector_limit).count();
    violations += cn_incoming.values().filter(|&&c| c > 1).count();
    violations
}

/// Runs the full analysis. `availability_time_limit` bounds the Monte-Carlo
/// simulation's wall clock, mirroring `availability_max_time_seconds`.
pub fn analyze(
    topology: &Topology,
    params: &OptimizerParams,
    post_design: Option<&PostDesignFlowResult>,
) -> AnalysisReport {
    let mut report = AnalysisReport::empty();

    // -- capex, deduping co-located sites (including candidates) so a group
    // of mutually-exclusive co-located options contributes at most once. --
    let mut counted_groups: std::collections::HashSet<(i64, i64)> = std::collections::HashSet::new();
    for site in topology.sorted_sites() {
        let key = ((site.location.latitude * 1e9).round() as i64, (site.location.longitude * 1e9).round() as i64);
        let site_capex = params.site_capex.get(&site.site_type).copied().unwrap_or(0.0);
        let node_capex = site.device.node_capex;
        let capex = site_capex + node_capex;
        report.site_capex.insert(site.site_id.clone(), capex);

        if !counted_groups.insert(key) {
            continue;
        }
        report.metrics.total_capex += capex;
        if site.status == StatusType::Proposed {
            report.metrics.proposed_capex += capex;
        }
        *report.metrics.site_counts_by_type.entry(site_type_key(site.site_type).to_string()).or_insert(0) += 1;
        *report.metrics.sku_counts.entry(site.device.sku.clone()).or_insert(0) += 1;
    }

    for link in topology.sorted_links() {
        if !link.status.active() {
            continue;
        }
        *report.metrics.link_counts_by_type.entry(link_type_key(link.link_type).to_string()).or_insert(0) += 1;
        *report.metrics.mcs_histogram.entry(link.budget.mcs_level).or_insert(0) += 1;
    }
    for sector in topology.sorted_sectors() {
        if let Some(channel) = sector.channel {
            *report.metrics.channel_counts.entry(channel).or_insert(0) += 1;
        }
    }

    for demand in topology.sorted_demand_sites() {
        report.metrics.total_demand_gbps += demand.demand_gbps;
    }
    let pg_reachable = build_digraph(topology, StatusType::reachable);
    let connected = find_connected_demands(&pg_reachable);
    let served_fraction = if topology.demand_sites.is_empty() {
        1.0
    } else {
        connected.len() as f64 / topology.demand_sites.values().map(|d| d.num_sites.max(1) as usize).sum::<usize>().max(1) as f64
    };
    report.metrics.served_demand_gbps = report.metrics.total_demand_gbps * served_fraction;
    report.metrics.unserved_demand_gbps = report.metrics.total_demand_gbps - report.metrics.served_demand_gbps;

    let pg_active = build_digraph(topology, StatusType::active);
    let site_types: HashMap<String, SiteType> = topology.sites.values().map(|s| (s.site_id.clone(), s.site_type)).collect();
    report.metrics.edge_failure_disruption = DisruptionStats::from_counts(single_edge_failures(&pg_active).into_values());
    report.metrics.site_failure_disruption = DisruptionStats::from_counts(single_site_failures(&pg_active, &site_types).into_values());

    if !topology.demand_sites.is_empty() {
        let link_availability_pct: HashMap<String, f64> = topology
            .sorted_links()
            .into_iter()
            .filter(|l| l.status.active() && l.link_type == LinkType::WirelessBackhaul)
            .map(|l| (l.link_id.clone(), l.budget.confidence_level * 100.0))
            .collect();
        let availability = compute_availability(
            &pg_active,
            &link_availability_pct,
            params.availability_sim_time,
            Duration::from_secs_f64(params.availability_max_time_seconds.max(0.1)),
            params.availability_seed,
        );
        let mut values: Vec<f64> = availability.demand_availability.into_values().collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        report.metrics.availability_p50 = percentile(&values, 50.0);
        report.metrics.availability_p95 = percentile(&values, 95.0);
        report.metrics.availability_p99 = percentile(&values, 99.0);
    } else {
        report.metrics.availability_p50 = 1.0;
        report.metrics.availability_p95 = 1.0;
        report.metrics.availability_p99 = 1.0;
    }

    if let Some(post_design) = post_design {
        for (key, flow) in &post_design.flows {
            let link_id = topology.get_link_by_site_ids(&key.tx, &key.rx).map(|l| l.link_id.clone());
            if let Some(link_id) = link_id {
                report.link_flow.insert(link_id.clone(), *flow);
                if let Some(util) = post_design.utilization.get(key) {
                    report.link_utilization.insert(link_id, *util);
                }
            }
        }
        for site in topology.sorted_sites() {
            let incident: f64 = post_design
                .flows
                .iter()
                .filter(|(k, _)| k.tx == site.site_id || k.rx == site.site_id)
                .map(|(_, v)| *v)
                .sum();
            report.site_utilization.insert(site.site_id.clone(), incident);
        }
    }

    report.metrics.deployment_rule_violations = count_deployment_rule_violations(topology, params);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshplan_core::enums::{LocationType, SectorType};
    use meshplan_core::geo::GeoPoint;
    use meshplan_core::link::{Link, LinkBudget};
    use meshplan_core::sector::Sector;
    use meshplan_core::site::{DeviceSpec, Site};
    use meshplan_milp::StageBudgets;

    fn params() -> OptimizerParams {
        OptimizerParams {
            site_capex: HashMap::from([(SiteType::Pop, 50_000.0), (SiteType::Dn, 15_000.0), (SiteType::Cn, 2_000.0)]),
            budget: f64::INFINITY,
            pop_capacity_gbps: 10.0,
            oversubscription: 1.0,
            default_demand_gbps: 1.0,
            dn_dn_sector_limit: 2,
            dn_total_sector_limit: 4,
            maximum_number_hops: 8,
            diff_sector_angle_limit_deg: 20.0,
            near_far_angle_limit_deg: 10.0,
            near_far_length_ratio: 3.0,
            number_of_channels: 1,
            maximize_common_bandwidth: false,
            always_active_pops: false,
            enable_legacy_redundancy_method: false,
            redundancy_level: meshplan_core::enums::RedundancyLevel::None,
            backhaul_link_redundancy_ratio: 0.0,
            num_threads: 1,
            stage_budgets: StageBudgets::default(),
            topology_routing: meshplan_core::enums::TopologyRouting::ShortestPath,
            availability_sim_time: 100.0,
            availability_seed: 7,
            availability_max_time_seconds: 2.0,
            number_of_extra_pops: 0,
            ignore_polarities: false,
        }
    }

    fn sample_topology() -> Topology {
        let mut topo = Topology::new();
        let dev = DeviceSpec { sku: "pop1".into(), node_capex: 1_000.0, nodes_per_site: 1 };
        let pop = Site::new(SiteType::Pop, GeoPoint::new(0.0, 0.0, 0.0), dev, StatusType::Proposed, LocationType::Rooftop);
        let pop_id = pop.site_id.clone();
        topo.add_site(pop).unwrap();
        let dev2 = DeviceSpec { sku: "dn1".into(), node_capex: 500.0, nodes_per_site: 1 };
        let dn = Site::new(SiteType::Dn, GeoPoint::new(0.0, 1.0, 0.0), dev2, StatusType::Proposed, LocationType::Rooftop);
        let dn_id = dn.site_id.clone();
        topo.add_site(dn).unwrap();
        topo.add_sector(Sector::new(pop_id.clone(), "n0", 0, 90.0, SectorType::Dn, StatusType::Proposed)).unwrap();
        topo.add_sector(Sector::new(dn_id.clone(), "n0", 0, 270.0, SectorType::Dn, StatusType::Proposed)).unwrap();
        let link = Link::new(pop_id, dn_id, LinkType::WirelessBackhaul, StatusType::Proposed, 1000.0, LinkBudget::wired(1.0));
        topo.add_link(link).unwrap();
        topo
    }

    #[test]
    fn capex_sums_site_and_node_cost_once_per_site() {
        let topo = sample_topology();
        let report = analyze(&topo, &params(), None);
        assert_eq!(report.metrics.total_capex, 50_000.0 + 1_000.0 + 15_000.0 + 500.0);
        assert_eq!(report.metrics.site_counts_by_type["pop"], 1);
        assert_eq!(report.metrics.site_counts_by_type["dn"], 1);
    }

    #[test]
    fn no_deployment_violations_on_a_clean_topology() {
        let topo = sample_topology();
        assert_eq!(count_deployment_rule_violations(&topo, &params()), 0);
    }
}
