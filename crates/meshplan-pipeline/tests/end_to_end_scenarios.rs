//! End-to-end scenarios run against the full nine-step pipeline on small,
//! hand-built topologies, checking the universal invariants the design must
//! hold afterward rather than exact solver tie-breaking.

use meshplan_core::demand::DemandSite;
use meshplan_core::enums::{LinkType, LocationType, SectorType, SiteType, StatusType};
use meshplan_core::geo::GeoPoint;
use meshplan_core::link::{Link, LinkBudget};
use meshplan_core::sector::Sector;
use meshplan_core::site::{DeviceSpec, Site};
use meshplan_core::topology::Topology;
use meshplan_pipeline::config::{OptimizerParamsConfig, SectorParamsConfig};
use meshplan_pipeline::{analyze, rf_config, run_pipeline};

fn device(sku: &str, node_capex: f64) -> DeviceSpec {
    DeviceSpec { sku: sku.into(), node_capex, nodes_per_site: 1 }
}

/// Adds a site with a single DN/CN-typed sector and returns (site_id, sector_id).
fn add_site_with_sector(
    topo: &mut Topology,
    site_type: SiteType,
    lat: f64,
    lon: f64,
    azimuth_deg: f64,
    sector_type: SectorType,
    status: StatusType,
    node_capex: f64,
) -> (String, String) {
    let site = Site::new(site_type, GeoPoint::new(lat, lon, 0.0), device("radio", node_capex), status, LocationType::StreetLevel);
    let site_id = site.site_id.clone();
    topo.add_site(site).unwrap();
    let sector = Sector::new(site_id.clone(), "n0", 0, azimuth_deg, sector_type, status);
    let sector_id = sector.sector_id.clone();
    topo.add_sector(sector).unwrap();
    (site_id, sector_id)
}

fn add_wireless_link(
    topo: &mut Topology,
    tx_site: &str,
    tx_sector: &str,
    rx_site: &str,
    rx_sector: &str,
    link_type: LinkType,
    distance_m: f64,
    capacity_gbps: f64,
) {
    let mut link = Link::new(tx_site, rx_site, link_type, StatusType::Candidate, distance_m, LinkBudget::wired(capacity_gbps));
    link.budget.rsl_dbm = -50.0;
    link.budget.snr_dbm = 25.0;
    link.budget.mcs_level = 9;
    link.tx_sector_id = Some(tx_sector.to_string());
    link.rx_sector_id = Some(rx_sector.to_string());
    topo.add_link(link).unwrap();
}

fn default_config() -> OptimizerParamsConfig {
    let mut cfg = OptimizerParamsConfig::default();
    cfg.budget = f64::INFINITY;
    cfg.pop_capacity_gbps = 10.0;
    cfg
}

fn assert_universal_invariants(topo: &Topology) {
    for link in topo.sorted_links() {
        if !link.status.active() {
            continue;
        }
        let tx = &topo.sites[&link.tx_site_id];
        let rx = &topo.sites[&link.rx_site_id];
        assert!(tx.status.active(), "active link {} has an inactive tx site", link.link_id);
        assert!(rx.status.active(), "active link {} has an inactive rx site", link.link_id);
        assert_ne!(tx.status, StatusType::Unreachable);
        assert_ne!(rx.status, StatusType::Unreachable);

        if let (Some(tx_sec), Some(rx_sec)) = (&link.tx_sector_id, &link.rx_sector_id) {
            assert!(topo.sectors[tx_sec].status.active(), "active link {} has an inactive tx sector", link.link_id);
            assert!(topo.sectors[rx_sec].status.active(), "active link {} has an inactive rx sector", link.link_id);
        }
    }

    for site in topo.sorted_sites() {
        let has_active_link = topo.sorted_links().into_iter().any(|l| l.status.active() && (l.tx_site_id == site.site_id || l.rx_site_id == site.site_id));
        if has_active_link {
            assert!(site.status.active(), "site {} carries an active link but is not active", site.site_id);
        }
    }

    for site in topo.sorted_sites() {
        if site.site_type != SiteType::Cn {
            continue;
        }
        let active_incoming = topo
            .sorted_links()
            .into_iter()
            .filter(|l| l.rx_site_id == site.site_id && l.status.active())
            .count();
        assert!(active_incoming <= 1, "CN {} has {} active incoming links", site.site_id, active_incoming);
    }

    for group in topo.colocation_groups() {
        let active = group.iter().filter(|id| topo.sites[id.as_str()].status.active()).count();
        assert!(active <= 1, "co-located group {:?} has {} active members", group, active);
    }
}

/// A POP feeding a single DN which in turn serves one demand point: the
/// simplest topology with a full design. The pipeline should pick up the DN
/// and the backhaul link and fully serve the demand.
#[test]
fn pop_dn_demand_chain_is_fully_served() {
    let mut topo = Topology::new();

    let (pop_id, pop_sec) =
        add_site_with_sector(&mut topo, SiteType::Pop, 0.0, 0.0, 90.0, SectorType::Dn, StatusType::Existing, 50_000.0);
    let (dn_id, dn_sec) =
        add_site_with_sector(&mut topo, SiteType::Dn, 0.0, 0.01, 270.0, SectorType::Dn, StatusType::Candidate, 15_000.0);

    add_wireless_link(&mut topo, &pop_id, &pop_sec, &dn_id, &dn_sec, LinkType::WirelessBackhaul, 1100.0, 2.0);
    add_wireless_link(&mut topo, &dn_id, &dn_sec, &pop_id, &pop_sec, LinkType::WirelessBackhaul, 1100.0, 2.0);

    let mut demand = DemandSite::new("demand-1", GeoPoint::new(0.0, 0.01, 0.0), 0.025, 1);
    demand.connected_sites.push(dn_id.clone());
    topo.add_demand_site(demand).unwrap();

    let config = default_config();
    let rf_params = rf_config::build_rf_params(&SectorParamsConfig::default()).unwrap();

    let result = run_pipeline(&mut topo, &config, &rf_params, None).expect("pipeline should find a feasible design");

    assert_eq!(result.topology.sites[&dn_id].status, StatusType::Proposed);
    assert_universal_invariants(&result.topology);

    let report = analyze(&result.topology, &config.to_optimizer_params(), Some(&result.post_design));
    assert!(report.metrics.served_demand_gbps > 0.0, "the chain's only demand point should receive some flow");
    assert!(report.metrics.unserved_demand_gbps < 1e-6, "a single reachable DN with ample capacity should fully serve its demand");
}

/// Two DNs behind a single POP, each serving its own demand point, with a
/// cross-link between the DNs that is not needed for coverage. Min-cost
/// should still end up with both DNs active and the budget respected.
#[test]
fn two_dn_fanout_respects_budget_and_serves_both_demands() {
    let mut topo = Topology::new();

    let (pop_id, pop_sec_a) =
        add_site_with_sector(&mut topo, SiteType::Pop, 0.0, 0.0, 45.0, SectorType::Dn, StatusType::Existing, 50_000.0);
    let pop_sec_b = {
        let sector = Sector::new(pop_id.clone(), "n1", 1, 135.0, SectorType::Dn, StatusType::Existing);
        let id = sector.sector_id.clone();
        topo.add_sector(sector).unwrap();
        id
    };

    let (dn_a, dn_a_sec) =
        add_site_with_sector(&mut topo, SiteType::Dn, 0.01, 0.0, 225.0, SectorType::Dn, StatusType::Candidate, 15_000.0);
    let (dn_b, dn_b_sec) =
        add_site_with_sector(&mut topo, SiteType::Dn, 0.0, 0.01, 315.0, SectorType::Dn, StatusType::Candidate, 15_000.0);

    add_wireless_link(&mut topo, &pop_id, &pop_sec_a, &dn_a, &dn_a_sec, LinkType::WirelessBackhaul, 1100.0, 2.0);
    add_wireless_link(&mut topo, &dn_a, &dn_a_sec, &pop_id, &pop_sec_a, LinkType::WirelessBackhaul, 1100.0, 2.0);
    add_wireless_link(&mut topo, &pop_id, &pop_sec_b, &dn_b, &dn_b_sec, LinkType::WirelessBackhaul, 1100.0, 2.0);
    add_wireless_link(&mut topo, &dn_b, &dn_b_sec, &pop_id, &pop_sec_b, LinkType::WirelessBackhaul, 1100.0, 2.0);

    let mut demand_a = DemandSite::new("demand-a", GeoPoint::new(0.01, 0.0, 0.0), 0.05, 1);
    demand_a.connected_sites.push(dn_a.clone());
    topo.add_demand_site(demand_a).unwrap();
    let mut demand_b = DemandSite::new("demand-b", GeoPoint::new(0.0, 0.01, 0.0), 0.05, 1);
    demand_b.connected_sites.push(dn_b.clone());
    topo.add_demand_site(demand_b).unwrap();

    let mut config = default_config();
    config.budget = 200_000.0;

    let rf_params = rf_config::build_rf_params(&SectorParamsConfig::default()).unwrap();
    let result = run_pipeline(&mut topo, &config, &rf_params, None).expect("pipeline should find a feasible design");

    assert_universal_invariants(&result.topology);

    let report = analyze(&result.topology, &config.to_optimizer_params(), Some(&result.post_design));
    assert!(report.metrics.total_capex <= config.budget + 1e-6, "cost must respect the configured budget");
    assert!(report.metrics.unserved_demand_gbps < 1e-6, "both DNs are cheaply reachable, coverage should be complete");
}

/// A DN with two CNs behind it, one of which has zero link capacity: demand
/// at the zero-capacity CN can never be served, so coverage should fall
/// short by exactly that CN's demand while the reachable CN is fully served.
#[test]
fn cn_with_zero_capacity_link_is_left_unserved() {
    let mut topo = Topology::new();

    let (pop_id, pop_sec) =
        add_site_with_sector(&mut topo, SiteType::Pop, 0.0, 0.0, 90.0, SectorType::Dn, StatusType::Existing, 50_000.0);
    let (dn_id, dn_sec_to_pop) =
        add_site_with_sector(&mut topo, SiteType::Dn, 0.0, 0.01, 270.0, SectorType::Dn, StatusType::Candidate, 15_000.0);
    let dn_sec_access = {
        let sector = Sector::new(dn_id.clone(), "n1", 1, 90.0, SectorType::Dn, StatusType::Candidate);
        let id = sector.sector_id.clone();
        topo.add_sector(sector).unwrap();
        id
    };

    add_wireless_link(&mut topo, &pop_id, &pop_sec, &dn_id, &dn_sec_to_pop, LinkType::WirelessBackhaul, 1100.0, 2.0);
    add_wireless_link(&mut topo, &dn_id, &dn_sec_to_pop, &pop_id, &pop_sec, LinkType::WirelessBackhaul, 1100.0, 2.0);

    let (cn_reachable, cn_reachable_sec) =
        add_site_with_sector(&mut topo, SiteType::Cn, 0.0, 0.02, 270.0, SectorType::Cn, StatusType::Candidate, 2_000.0);
    add_wireless_link(&mut topo, &dn_id, &dn_sec_access, &cn_reachable, &cn_reachable_sec, LinkType::WirelessAccess, 200.0, 1.0);

    let (cn_blocked, cn_blocked_sec) =
        add_site_with_sector(&mut topo, SiteType::Cn, 0.01, 0.01, 200.0, SectorType::Cn, StatusType::Candidate, 2_000.0);
    add_wireless_link(&mut topo, &dn_id, &dn_sec_access, &cn_blocked, &cn_blocked_sec, LinkType::WirelessAccess, 200.0, 0.0);

    let mut demand_reachable = DemandSite::new("demand-reachable", GeoPoint::new(0.0, 0.02, 0.0), 0.02, 1);
    demand_reachable.connected_sites.push(cn_reachable.clone());
    topo.add_demand_site(demand_reachable).unwrap();
    let mut demand_blocked = DemandSite::new("demand-blocked", GeoPoint::new(0.01, 0.01, 0.0), 0.02, 1);
    demand_blocked.connected_sites.push(cn_blocked.clone());
    topo.add_demand_site(demand_blocked).unwrap();

    let config = default_config();
    let rf_params = rf_config::build_rf_params(&SectorParamsConfig::default()).unwrap();
    let result = run_pipeline(&mut topo, &config, &rf_params, None).expect("pipeline should find a feasible design even with an unreachable demand");

    assert_universal_invariants(&result.topology);

    let report = analyze(&result.topology, &config.to_optimizer_params(), Some(&result.post_design));
    assert!(report.metrics.served_demand_gbps > 0.0, "the zero-capacity CN must not block the reachable one from being served");
    assert!(report.metrics.unserved_demand_gbps >= 0.02 - 1e-6, "the zero-capacity CN's demand can never be routed");
}
