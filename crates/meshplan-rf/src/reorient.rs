//! Post-design sector re-orientation (pipeline driver step 8): recompute
//! each node's antenna azimuth from the neighbour set its sectors ended up
//! carrying active links to, then re-validate which of those links still
//! fall inside the sector's scan range.
//!
//! A sector's "optimum" azimuth is the circular mean of the bearings to its
//! active incident links, which minimizes the summed angular deviation the
//! interference engine penalizes. Links that fall outside half the scan
//! range of the recomputed azimuth are no longer "in sector" and are
//! demoted so the next stage solve can drop them.

use meshplan_core::enums::StatusType;
use meshplan_core::geo::angle_between_bearings;
use meshplan_core::Topology;
use std::collections::HashMap;

/// Outcome of one re-orientation pass, used by the driver as the
/// convergence test for the link-budget iteration loop.
#[derive(Debug, Clone, Default)]
pub struct ReorientOutcome {
    pub sectors_reoriented: usize,
    pub links_dropped: Vec<String>,
}

/// Circular mean of a set of bearings in degrees, via the mean of their unit
/// vectors. Returns `None` for an empty input.
fn circular_mean_deg(bearings: &[f64]) -> Option<f64> {
    if bearings.is_empty() {
        return None;
    }
    let (sum_sin, sum_cos) = bearings.iter().fold((0.0, 0.0), |(s, c), &b| {
        let rad = b.to_radians();
        (s + rad.sin(), c + rad.cos())
    });
    if sum_sin.abs() < 1e-12 && sum_cos.abs() < 1e-12 {
        return Some(bearings[0]);
    }
    Some((sum_sin.atan2(sum_cos).to_degrees() + 360.0) % 360.0)
}

/// Recomputes `ant_azimuth_deg` for every sector with at least one active
/// incident link, then demotes (back to `Candidate`, sector fields cleared)
/// any link whose bearing now falls outside `horizontal_scan_range_deg / 2`
/// of its tx or rx sector's new azimuth.
pub fn reorient_sectors(topology: &mut Topology, horizontal_scan_range_deg: f64) -> ReorientOutcome {
    let half_scan = horizontal_scan_range_deg / 2.0;
    let mut bearings_by_sector: HashMap<String, Vec<f64>> = HashMap::new();

    for link in topology.sorted_links() {
        if !link.status.active() || !link.link_type.is_wireless() {
            continue;
        }
        if let Some(sector_id) = &link.tx_sector_id {
            bearings_by_sector.entry(sector_id.clone()).or_default().push(link.budget.tx_azimuth_deg);
        }
        if let Some(sector_id) = &link.rx_sector_id {
            // Reverse bearing so a receiving sector's boresight points back
            // at its transmitters, not away from them.
            let reverse = (link.budget.rx_azimuth_deg + 180.0) % 360.0;
            bearings_by_sector.entry(sector_id.clone()).or_default().push(reverse);
        }
    }

    let mut new_azimuth: HashMap<String, f64> = HashMap::new();
    let mut sectors_reoriented = 0;
    for (sector_id, bearings) in &bearings_by_sector {
        let Some(mean) = circular_mean_deg(bearings) else { continue };
        if let Some(sector) = topology.sectors.get_mut(sector_id) {
            if (sector.ant_azimuth_deg - mean).abs() > 1e-6 {
                sectors_reoriented += 1;
            }
            sector.ant_azimuth_deg = mean;
        }
        new_azimuth.insert(sector_id.clone(), mean);
    }

    let mut links_dropped = Vec::new();
    let link_ids: Vec<String> = topology.sorted_links().into_iter().map(|l| l.link_id.clone()).collect();
    for link_id in link_ids {
        let Some(link) = topology.links.get(&link_id) else { continue };
        if !link.status.active() || !link.link_type.is_wireless() {
            continue;
        }
        let out_of_sector = [
            link.tx_sector_id.as_ref().and_then(|s| new_azimuth.get(s)).map(|&az| angle_between_bearings(az, link.budget.tx_azimuth_deg) > half_scan),
            link.rx_sector_id.as_ref().and_then(|s| new_azimuth.get(s)).map(|&az| angle_between_bearings((az + 180.0) % 360.0, link.budget.rx_azimuth_deg) > half_scan),
        ]
        .into_iter()
        .flatten()
        .any(|x| x);

        if out_of_sector {
            if let Some(link) = topology.links.get_mut(&link_id) {
                if !link.status.immutable() {
                    link.status = StatusType::Candidate;
                }
                link.tx_sector_id = None;
                link.rx_sector_id = None;
            }
            links_dropped.push(link_id);
        }
    }

    ReorientOutcome { sectors_reoriented, links_dropped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshplan_core::enums::{LinkType, LocationType, SectorType, SiteType};
    use meshplan_core::geo::GeoPoint;
    use meshplan_core::link::{Link, LinkBudget};
    use meshplan_core::sector::Sector;
    use meshplan_core::site::{DeviceSpec, Site};

    fn dev() -> DeviceSpec {
        DeviceSpec { sku: "radio".into(), node_capex: 100.0, nodes_per_site: 1 }
    }

    #[test]
    fn circular_mean_of_identical_bearings_is_itself() {
        assert_eq!(circular_mean_deg(&[45.0, 45.0, 45.0]), Some(45.0));
    }

    #[test]
    fn circular_mean_wraps_around_north() {
        // 350 and 10 degrees average to 0 (due north), not 180.
        let mean = circular_mean_deg(&[350.0, 10.0]).unwrap();
        assert!(mean < 1.0 || mean > 359.0, "mean={mean}");
    }

    #[test]
    fn reorients_sector_toward_its_active_neighbour() {
        let mut topo = Topology::new();
        let a = Site::new(SiteType::Dn, GeoPoint::new(0.0, 0.0, 0.0), dev(), StatusType::Proposed, LocationType::StreetLevel);
        let b = Site::new(SiteType::Dn, GeoPoint::new(0.0, 1.0, 0.0), dev(), StatusType::Proposed, LocationType::StreetLevel);
        let (a_id, b_id) = (a.site_id.clone(), b.site_id.clone());
        topo.add_site(a).unwrap();
        topo.add_site(b).unwrap();

        let sec_a = Sector::new(a_id.clone(), "n0", 0, 0.0, SectorType::Dn, StatusType::Proposed);
        let sec_b = Sector::new(b_id.clone(), "n0", 0, 180.0, SectorType::Dn, StatusType::Proposed);
        let (sec_a_id, sec_b_id) = (sec_a.sector_id.clone(), sec_b.sector_id.clone());
        topo.add_sector(sec_a).unwrap();
        topo.add_sector(sec_b).unwrap();

        let mut link = Link::new(a_id, b_id, LinkType::WirelessBackhaul, StatusType::Proposed, 1000.0, LinkBudget::wired(1.0));
        link.tx_sector_id = Some(sec_a_id.clone());
        link.rx_sector_id = Some(sec_b_id.clone());
        link.budget.tx_azimuth_deg = 90.0;
        link.budget.rx_azimuth_deg = 270.0;
        topo.add_link(link).unwrap();

        let outcome = reorient_sectors(&mut topo, 90.0);
        assert_eq!(outcome.sectors_reoriented, 2);
        assert!(outcome.links_dropped.is_empty());
        assert!((topo.sectors[&sec_a_id].ant_azimuth_deg - 90.0).abs() < 1e-6);
    }

    #[test]
    fn drops_link_outside_new_scan_range() {
        // One tx sector feeding three neighbours near bearing 90 and one
        // outlier near bearing 150; the recomputed azimuth sits close to 90
        // and leaves the outlier outside a narrow scan range while the
        // near-90 links stay in sector. Each rx site has only one incoming
        // link, so its own sector always re-centers exactly on it and never
        // contributes a drop.
        let mut topo = Topology::new();
        let a = Site::new(SiteType::Dn, GeoPoint::new(0.0, 0.0, 0.0), dev(), StatusType::Proposed, LocationType::StreetLevel);
        let a_id = a.site_id.clone();
        topo.add_site(a).unwrap();
        let sec_a = Sector::new(a_id.clone(), "n0", 0, 0.0, SectorType::Dn, StatusType::Proposed);
        let sec_a_id = sec_a.sector_id.clone();
        topo.add_sector(sec_a).unwrap();

        let mut link_ids_at_90 = Vec::new();
        for (i, lon) in [0.001_f64, 0.002, 0.003].into_iter().enumerate() {
            let rx = Site::new(SiteType::Dn, GeoPoint::new(0.0, lon, 0.0), dev(), StatusType::Proposed, LocationType::StreetLevel);
            let rx_id = rx.site_id.clone();
            topo.add_site(rx).unwrap();
            let sec_rx = Sector::new(rx_id.clone(), "n0", 0, 0.0, SectorType::Dn, StatusType::Proposed);
            let sec_rx_id = sec_rx.sector_id.clone();
            topo.add_sector(sec_rx).unwrap();

            let mut link = Link::new(a_id.clone(), rx_id, LinkType::WirelessBackhaul, StatusType::Proposed, 1000.0, LinkBudget::wired(1.0));
            link.tx_sector_id = Some(sec_a_id.clone());
            link.rx_sector_id = Some(sec_rx_id);
            link.budget.tx_azimuth_deg = 90.0;
            link.budget.rx_azimuth_deg = 270.0;
            topo.add_link(link.clone()).unwrap();
            link_ids_at_90.push(link.link_id.clone());
            let _ = i;
        }

        let outlier_rx = Site::new(SiteType::Dn, GeoPoint::new(0.001, 0.0, 0.0), dev(), StatusType::Proposed, LocationType::StreetLevel);
        let outlier_id = outlier_rx.site_id.clone();
        topo.add_site(outlier_rx).unwrap();
        let sec_outlier = Sector::new(outlier_id.clone(), "n0", 0, 0.0, SectorType::Dn, StatusType::Proposed);
        let sec_outlier_id = sec_outlier.sector_id.clone();
        topo.add_sector(sec_outlier).unwrap();
        let mut outlier_link = Link::new(a_id, outlier_id, LinkType::WirelessBackhaul, StatusType::Proposed, 1000.0, LinkBudget::wired(1.0));
        outlier_link.tx_sector_id = Some(sec_a_id);
        outlier_link.rx_sector_id = Some(sec_outlier_id);
        outlier_link.budget.tx_azimuth_deg = 150.0;
        outlier_link.budget.rx_azimuth_deg = 330.0;
        let outlier_link_id = outlier_link.link_id.clone();
        topo.add_link(outlier_link).unwrap();

        let outcome = reorient_sectors(&mut topo, 40.0);
        assert!(outcome.links_dropped.contains(&outlier_link_id));
        for id in &link_ids_at_90 {
            assert!(!outcome.links_dropped.contains(id));
        }
    }
}
