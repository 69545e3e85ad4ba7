//! Per-link received interference computation.
//!
//! For every in-sector wireless link `p`, the links sharing `p`'s tx sector
//! (other outgoing transmissions from the same physical sector) and the
//! links sharing `p`'s rx sector (other incoming receptions into the same
//! physical sector) are paired up: each such `(q, r)` pair estimates how much
//! of `q`'s transmit power leaks into `r`'s receiver, using `p`'s own
//! geometry (distance, boresights) as the calibration path. `r` is the link
//! whose received signal is actually contaminated, so its link id is the key
//! into `rsl_interference_map`.
//!
//! `net_gain = tx_gain(tx_dev, tx_el_dev) + rx_gain(rx_dev, rx_el_dev) -
//! FSPL(distance_p) - tx_and_rx_misc_loss` (path loss and misc loss are
//! subtracted; the spec's additive "+FSPL" phrasing treats FSPL as a signed
//! loss term already).

use crate::params::RfParams;
use crate::polarity::{effective_polarity, interference_eligible};
use meshplan_core::enums::PolarityType;
use meshplan_core::geo::{angle_between_bearings, free_space_path_loss_db};
use meshplan_core::{Link, Topology};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct InterferenceContribution {
    pub path_link_id: String,
    pub interfering_link_id: String,
    pub interfered_link_id: String,
    pub net_gain_db: f64,
    pub rsl_dbm: f64,
}

#[derive(Debug, Clone, Default)]
pub struct InterferenceResult {
    /// Worst-case received interference power (dBm) per victim link id.
    pub rsl_interference_map: HashMap<String, f64>,
    /// path -> interfering tx link -> interfered rx link -> net gain (dB).
    pub link_net_gain_map: HashMap<String, HashMap<String, HashMap<String, f64>>>,
    pub contributions: Vec<InterferenceContribution>,
}

fn dbm_to_mw(dbm: f64) -> f64 {
    10f64.powf(dbm / 10.0)
}

fn mw_to_dbm(mw: f64) -> f64 {
    10.0 * mw.max(1e-15).log10()
}

/// `link.is_wireless()` and both sectors present, and the link's status is
/// not inactive — a candidate or active link can interfere, an
/// unavailable/unreachable one cannot. A redundant link never carries live
/// traffic so it contributes no interference, and a link whose two sites
/// already have an assigned, non-opposite polarity can never be scheduled
/// (constraint 5 requires opposite ends) so it is ruled out too. Endpoints
/// still `UNASSIGNED` are kept as candidates since the solver may yet decide
/// them into an interfering arrangement.
fn is_candidate_path(link: &Link, topology: &Topology) -> bool {
    if !link.is_wireless() || link.is_out_of_sector() || link.status.inactive() || link.is_redundant {
        return false;
    }
    let (Some(tx), Some(rx)) = (topology.sites.get(&link.tx_site_id), topology.sites.get(&link.rx_site_id)) else {
        return true;
    };
    let (tx_polarity, rx_polarity) = (effective_polarity(tx, topology), effective_polarity(rx, topology));
    if tx_polarity == PolarityType::Unassigned || rx_polarity == PolarityType::Unassigned {
        return true;
    }
    interference_eligible(tx_polarity, rx_polarity)
}

pub fn compute_interference(topology: &Topology, params: &RfParams) -> InterferenceResult {
    let links: Vec<&Link> = topology.sorted_links().into_iter().filter(|l| is_candidate_path(l, topology)).collect();

    let mut by_tx_sector: HashMap<&str, Vec<&Link>> = HashMap::new();
    let mut by_rx_sector: HashMap<&str, Vec<&Link>> = HashMap::new();
    for link in &links {
        if let Some(tx) = link.tx_sector_id.as_deref() {
            by_tx_sector.entry(tx).or_default().push(link);
        }
        if let Some(rx) = link.rx_sector_id.as_deref() {
            by_rx_sector.entry(rx).or_default().push(link);
        }
    }

    let misc_loss = params.tx_and_rx_misc_loss_db();
    let mut result = InterferenceResult::default();

    for p in &links {
        let tx_sector = p.tx_sector_id.as_deref().unwrap();
        let rx_sector = p.rx_sector_id.as_deref().unwrap();

        let tx_peers: Vec<&&Link> = by_tx_sector
            .get(tx_sector)
            .into_iter()
            .flatten()
            .filter(|q| q.link_id != p.link_id)
            .collect();
        let rx_peers: Vec<&&Link> = by_rx_sector
            .get(rx_sector)
            .into_iter()
            .flatten()
            .filter(|r| r.link_id != p.link_id)
            .collect();
        if tx_peers.is_empty() || rx_peers.is_empty() {
            continue;
        }

        let fspl = free_space_path_loss_db(p.distance_m, params.carrier_frequency_hz);
        let path_entry = result.link_net_gain_map.entry(p.link_id.clone()).or_default();

        for q in &tx_peers {
            let tx_dev = angle_between_bearings(p.budget.tx_azimuth_deg, q.budget.tx_azimuth_deg);
            let tx_el_dev = (p.budget.elevation_deviation_deg - q.budget.elevation_deviation_deg).abs();
            let tx_gain = params.gain_table.gain_db(tx_dev, tx_el_dev);
            let interfering_entry = path_entry.entry(q.link_id.clone()).or_default();

            for r in &rx_peers {
                let rx_dev = angle_between_bearings(p.budget.rx_azimuth_deg, r.budget.rx_azimuth_deg);
                let rx_el_dev = (p.budget.elevation_deviation_deg - r.budget.elevation_deviation_deg).abs();
                let rx_gain = params.gain_table.gain_db(rx_dev, rx_el_dev);

                let net_gain = tx_gain + rx_gain - fspl - misc_loss;
                let rsl = q.budget.tx_power_dbm + net_gain;

                interfering_entry.insert(r.link_id.clone(), net_gain);
                result.contributions.push(InterferenceContribution {
                    path_link_id: p.link_id.clone(),
                    interfering_link_id: q.link_id.clone(),
                    interfered_link_id: r.link_id.clone(),
                    net_gain_db: net_gain,
                    rsl_dbm: rsl,
                });
            }
        }
    }

    result.rsl_interference_map = aggregate_worst_case(&result.contributions, topology);
    result
}

/// Groups contributions by victim link, then by the interfering link's tx
/// sector (time-sharing interferers on the same sector are averaged in the
/// linear power domain), and takes the max across sector groups.
fn aggregate_worst_case(contributions: &[InterferenceContribution], topology: &Topology) -> HashMap<String, f64> {
    let mut by_victim: HashMap<&str, HashMap<&str, Vec<f64>>> = HashMap::new();
    for c in contributions {
        let Some(interferer) = topology.links.get(&c.interfering_link_id) else {
            continue;
        };
        let Some(sector) = interferer.tx_sector_id.as_deref() else {
            continue;
        };
        by_victim
            .entry(c.interfered_link_id.as_str())
            .or_default()
            .entry(sector)
            .or_default()
            .push(c.rsl_dbm);
    }

    let mut out = HashMap::new();
    for (victim, groups) in by_victim {
        let worst = groups
            .values()
            .map(|rsls| {
                let avg_mw: f64 = rsls.iter().map(|v| dbm_to_mw(*v)).sum::<f64>() / rsls.len() as f64;
                mw_to_dbm(avg_mw)
            })
            .fold(f64::NEG_INFINITY, f64::max);
        out.insert(victim.to_string(), worst);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gain::ParabolicGain;
    use crate::mcs::{McsEntry, McsTable};
    use meshplan_core::enums::{LinkType, LocationType, SectorType, SiteType, StatusType};
    use meshplan_core::geo::GeoPoint;
    use meshplan_core::link::LinkBudget;
    use meshplan_core::sector::Sector;
    use meshplan_core::site::{DeviceSpec, Site};
    use std::sync::Arc;

    fn params() -> RfParams {
        RfParams {
            carrier_frequency_hz: 60e9,
            thermal_noise_power_dbm: -81.0,
            noise_figure_db: 7.0,
            tx_diversity_gain_db: 0.0,
            rx_diversity_gain_db: 0.0,
            tx_misc_loss_db: 1.0,
            rx_misc_loss_db: 1.0,
            minimum_mcs_level: 4,
            horizontal_scan_range_deg: 90.0,
            gain_table: Arc::new(ParabolicGain::new(30.0, 3.0)),
            mcs_table: McsTable::new(vec![
                McsEntry { level: 0, min_snr_db: f64::NEG_INFINITY, capacity_gbps: 0.0 },
                McsEntry { level: 9, min_snr_db: 5.0, capacity_gbps: 1.0 },
            ])
            .unwrap(),
        }
    }

    fn device() -> DeviceSpec {
        DeviceSpec { sku: "SKU".into(), node_capex: 1000.0, nodes_per_site: 1 }
    }

    fn budget(tx_az: f64, rx_az: f64) -> LinkBudget {
        LinkBudget {
            rsl_dbm: -50.0,
            snr_dbm: 20.0,
            mcs_level: 9,
            capacity_gbps: 1.0,
            tx_power_dbm: 20.0,
            tx_azimuth_deg: tx_az,
            rx_azimuth_deg: rx_az,
            elevation_deviation_deg: 0.0,
            confidence_level: 1.0,
        }
    }

    #[test]
    fn no_interference_without_shared_sector_peers() {
        let mut topo = Topology::new();
        let a = Site::new(SiteType::Dn, GeoPoint::new(0.0, 0.0, 0.0), device(), StatusType::Candidate, LocationType::StreetLevel);
        let b = Site::new(SiteType::Dn, GeoPoint::new(0.0, 1.0, 0.0), device(), StatusType::Candidate, LocationType::StreetLevel);
        let (a_id, b_id) = (a.site_id.clone(), b.site_id.clone());
        topo.add_site(a).unwrap();
        topo.add_site(b).unwrap();
        let sec_a = Sector::new(a_id.clone(), "n0", 0, 90.0, SectorType::Dn, StatusType::Candidate);
        let sec_b = Sector::new(b_id.clone(), "n0", 0, 270.0, SectorType::Dn, StatusType::Candidate);
        let (sec_a_id, sec_b_id) = (sec_a.sector_id.clone(), sec_b.sector_id.clone());
        topo.add_sector(sec_a).unwrap();
        topo.add_sector(sec_b).unwrap();
        let mut link = Link::new(a_id, b_id, LinkType::WirelessBackhaul, StatusType::Candidate, 1000.0, budget(90.0, 270.0));
        link.tx_sector_id = Some(sec_a_id);
        link.rx_sector_id = Some(sec_b_id);
        topo.add_link(link).unwrap();

        let result = compute_interference(&topo, &params());
        assert!(result.rsl_interference_map.is_empty());
    }

    #[test]
    fn shared_sector_peers_produce_interference() {
        let mut topo = Topology::new();
        let a = Site::new(SiteType::Dn, GeoPoint::new(0.0, 0.0, 0.0), device(), StatusType::Candidate, LocationType::StreetLevel);
        let b = Site::new(SiteType::Dn, GeoPoint::new(0.0, 1.0, 0.0), device(), StatusType::Candidate, LocationType::StreetLevel);
        let c = Site::new(SiteType::Dn, GeoPoint::new(1.0, 1.0, 0.0), device(), StatusType::Candidate, LocationType::StreetLevel);
        let (a_id, b_id, c_id) = (a.site_id.clone(), b.site_id.clone(), c.site_id.clone());
        topo.add_site(a).unwrap();
        topo.add_site(b).unwrap();
        topo.add_site(c).unwrap();

        let sec_a = Sector::new(a_id.clone(), "n0", 0, 45.0, SectorType::Dn, StatusType::Candidate);
        let sec_b = Sector::new(b_id.clone(), "n0", 0, 270.0, SectorType::Dn, StatusType::Candidate);
        let sec_c = Sector::new(c_id.clone(), "n0", 0, 200.0, SectorType::Dn, StatusType::Candidate);
        let (sec_a_id, sec_b_id, sec_c_id) = (sec_a.sector_id.clone(), sec_b.sector_id.clone(), sec_c.sector_id.clone());
        topo.add_sector(sec_a).unwrap();
        topo.add_sector(sec_b).unwrap();
        topo.add_sector(sec_c).unwrap();

        let mut link_ab = Link::new(a_id.clone(), b_id.clone(), LinkType::WirelessBackhaul, StatusType::Candidate, 1000.0, budget(45.0, 270.0));
        link_ab.tx_sector_id = Some(sec_a_id.clone());
        link_ab.rx_sector_id = Some(sec_b_id.clone());
        topo.add_link(link_ab).unwrap();

        // a shares its tx sector with a second outgoing link to c.
        let mut link_ac = Link::new(a_id, c_id.clone(), LinkType::WirelessBackhaul, StatusType::Candidate, 1200.0, budget(45.0, 20.0));
        link_ac.tx_sector_id = Some(sec_a_id);
        link_ac.rx_sector_id = Some(sec_c_id.clone());
        topo.add_link(link_ac).unwrap();

        // b's rx sector also receives from c.
        let mut link_cb = Link::new(c_id, b_id, LinkType::WirelessBackhaul, StatusType::Candidate, 900.0, budget(200.0, 270.0));
        link_cb.tx_sector_id = Some(sec_c_id);
        link_cb.rx_sector_id = Some(sec_b_id);
        topo.add_link(link_cb).unwrap();

        let result = compute_interference(&topo, &params());
        assert!(!result.rsl_interference_map.is_empty());
    }

    #[test]
    fn same_assigned_polarity_rules_out_interference() {
        let mut topo = Topology::new();
        let mut a = Site::new(SiteType::Dn, GeoPoint::new(0.0, 0.0, 0.0), device(), StatusType::Candidate, LocationType::StreetLevel);
        let mut b = Site::new(SiteType::Dn, GeoPoint::new(0.0, 1.0, 0.0), device(), StatusType::Candidate, LocationType::StreetLevel);
        let mut c = Site::new(SiteType::Dn, GeoPoint::new(1.0, 1.0, 0.0), device(), StatusType::Candidate, LocationType::StreetLevel);
        a.polarity = meshplan_core::enums::PolarityType::Odd;
        b.polarity = meshplan_core::enums::PolarityType::Odd;
        c.polarity = meshplan_core::enums::PolarityType::Odd;
        let (a_id, b_id, c_id) = (a.site_id.clone(), b.site_id.clone(), c.site_id.clone());
        topo.add_site(a).unwrap();
        topo.add_site(b).unwrap();
        topo.add_site(c).unwrap();

        let sec_a = Sector::new(a_id.clone(), "n0", 0, 45.0, SectorType::Dn, StatusType::Candidate);
        let sec_b = Sector::new(b_id.clone(), "n0", 0, 270.0, SectorType::Dn, StatusType::Candidate);
        let sec_c = Sector::new(c_id.clone(), "n0", 0, 200.0, SectorType::Dn, StatusType::Candidate);
        let (sec_a_id, sec_b_id, sec_c_id) = (sec_a.sector_id.clone(), sec_b.sector_id.clone(), sec_c.sector_id.clone());
        topo.add_sector(sec_a).unwrap();
        topo.add_sector(sec_b).unwrap();
        topo.add_sector(sec_c).unwrap();

        let mut link_ab = Link::new(a_id.clone(), b_id.clone(), LinkType::WirelessBackhaul, StatusType::Candidate, 1000.0, budget(45.0, 270.0));
        link_ab.tx_sector_id = Some(sec_a_id.clone());
        link_ab.rx_sector_id = Some(sec_b_id.clone());
        topo.add_link(link_ab).unwrap();

        let mut link_ac = Link::new(a_id, c_id.clone(), LinkType::WirelessBackhaul, StatusType::Candidate, 1200.0, budget(45.0, 20.0));
        link_ac.tx_sector_id = Some(sec_a_id);
        link_ac.rx_sector_id = Some(sec_c_id.clone());
        topo.add_link(link_ac).unwrap();

        let mut link_cb = Link::new(c_id, b_id, LinkType::WirelessBackhaul, StatusType::Candidate, 900.0, budget(200.0, 270.0));
        link_cb.tx_sector_id = Some(sec_c_id);
        link_cb.rx_sector_id = Some(sec_b_id);
        topo.add_link(link_cb).unwrap();

        // Every site pinned to ODD: no link could ever be scheduled (constraint 5
        // requires opposite ends), so none of them are viable interfering paths.
        let result = compute_interference(&topo, &params());
        assert!(result.rsl_interference_map.is_empty());
    }

    #[test]
    fn redundant_link_contributes_no_interference() {
        let mut topo = Topology::new();
        let a = Site::new(SiteType::Dn, GeoPoint::new(0.0, 0.0, 0.0), device(), StatusType::Candidate, LocationType::StreetLevel);
        let b = Site::new(SiteType::Dn, GeoPoint::new(0.0, 1.0, 0.0), device(), StatusType::Candidate, LocationType::StreetLevel);
        let c = Site::new(SiteType::Dn, GeoPoint::new(1.0, 1.0, 0.0), device(), StatusType::Candidate, LocationType::StreetLevel);
        let (a_id, b_id, c_id) = (a.site_id.clone(), b.site_id.clone(), c.site_id.clone());
        topo.add_site(a).unwrap();
        topo.add_site(b).unwrap();
        topo.add_site(c).unwrap();

        let sec_a = Sector::new(a_id.clone(), "n0", 0, 45.0, SectorType::Dn, StatusType::Candidate);
        let sec_b = Sector::new(b_id.clone(), "n0", 0, 270.0, SectorType::Dn, StatusType::Candidate);
        let sec_c = Sector::new(c_id.clone(), "n0", 0, 200.0, SectorType::Dn, StatusType::Candidate);
        let (sec_a_id, sec_b_id, sec_c_id) = (sec_a.sector_id.clone(), sec_b.sector_id.clone(), sec_c.sector_id.clone());
        topo.add_sector(sec_a).unwrap();
        topo.add_sector(sec_b).unwrap();
        topo.add_sector(sec_c).unwrap();

        let mut link_ab = Link::new(a_id.clone(), b_id.clone(), LinkType::WirelessBackhaul, StatusType::Candidate, 1000.0, budget(45.0, 270.0));
        link_ab.tx_sector_id = Some(sec_a_id.clone());
        link_ab.rx_sector_id = Some(sec_b_id.clone());
        topo.add_link(link_ab).unwrap();

        let mut link_ac = Link::new(a_id, c_id.clone(), LinkType::WirelessBackhaul, StatusType::Candidate, 1200.0, budget(45.0, 20.0));
        link_ac.tx_sector_id = Some(sec_a_id);
        link_ac.rx_sector_id = Some(sec_c_id.clone());
        link_ac.is_redundant = true;
        topo.add_link(link_ac).unwrap();

        let mut link_cb = Link::new(c_id, b_id, LinkType::WirelessBackhaul, StatusType::Candidate, 900.0, budget(200.0, 270.0));
        link_cb.tx_sector_id = Some(sec_c_id);
        link_cb.rx_sector_id = Some(sec_b_id);
        topo.add_link(link_cb).unwrap();

        let result = compute_interference(&topo, &params());
        assert!(result.rsl_interference_map.is_empty());
    }
}
