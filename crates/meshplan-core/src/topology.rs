//! The in-memory graph of sites, sectors, links and demand points. Mutations
//! go through the methods below, which keep the forward/reverse adjacency
//! indices and the site<->sector index consistent.

use crate::demand::DemandSite;
use crate::enums::{PolarityType, StatusType};
use crate::error::{CoreError, Result};
use crate::link::Link;
use crate::sector::Sector;
use crate::site::Site;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub sites: HashMap<String, Site>,
    pub sectors: HashMap<String, Sector>,
    pub links: HashMap<String, Link>,
    pub demand_sites: HashMap<String, DemandSite>,

    site_id_to_sector_ids: HashMap<String, HashSet<String>>,
    /// site_connectivity[tx][rx] = link_id
    site_connectivity: HashMap<String, HashMap<String, String>>,
    /// site_connectivity_reverse[rx][tx] = link_id
    site_connectivity_reverse: HashMap<String, HashMap<String, String>>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- mutation API -----------------------------------------------

    pub fn add_site(&mut self, site: Site) -> Result<()> {
        if self.sites.contains_key(&site.site_id) {
            return Err(CoreError::SiteAlreadyExists(site.site_id));
        }
        self.site_id_to_sector_ids.entry(site.site_id.clone()).or_default();
        self.sites.insert(site.site_id.clone(), site);
        Ok(())
    }

    /// Removes a site and cascades to remove all of its sectors and every
    /// incident link.
    pub fn remove_site(&mut self, site_id: &str) -> Result<()> {
        if !self.sites.contains_key(site_id) {
            return Err(CoreError::SiteNotFound(site_id.to_string()));
        }

        let sector_ids: Vec<String> = self
            .site_id_to_sector_ids
            .get(site_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .collect();
        for sector_id in sector_ids {
            let _ = self.remove_sector(&sector_id);
        }

        let incident: Vec<String> = self
            .links
            .values()
            .filter(|l| l.tx_site_id == site_id || l.rx_site_id == site_id)
            .map(|l| l.link_id.clone())
            .collect();
        for link_id in incident {
            let _ = self.remove_link(&link_id);
        }

        self.sites.remove(site_id);
        self.site_id_to_sector_ids.remove(site_id);
        self.site_connectivity.remove(site_id);
        self.site_connectivity_reverse.remove(site_id);
        for m in self.site_connectivity.values_mut() {
            m.remove(site_id);
        }
        for m in self.site_connectivity_reverse.values_mut() {
            m.remove(site_id);
        }
        Ok(())
    }

    pub fn add_sector(&mut self, sector: Sector) -> Result<()> {
        if !self.sites.contains_key(&sector.site_id) {
            return Err(CoreError::SiteNotFound(sector.site_id.clone()));
        }
        if self.sectors.contains_key(&sector.sector_id) {
            return Err(CoreError::SectorAlreadyExists {
                site_id: sector.site_id.clone(),
                sector_id: sector.sector_id.clone(),
            });
        }
        self.site_id_to_sector_ids
            .entry(sector.site_id.clone())
            .or_default()
            .insert(sector.sector_id.clone());
        self.sectors.insert(sector.sector_id.clone(), sector);
        Ok(())
    }

    /// Removes a sector. Any incident link loses both of its sector
    /// references (a link may never reference only one sector).
    pub fn remove_sector(&mut self, sector_id: &str) -> Result<()> {
        let sector = self
            .sectors
            .remove(sector_id)
            .ok_or_else(|| CoreError::SectorNotFound(sector_id.to_string()))?;

        if let Some(set) = self.site_id_to_sector_ids.get_mut(&sector.site_id) {
            set.remove(sector_id);
        }

        for link in self.links.values_mut() {
            if link.tx_sector_id.as_deref() == Some(sector_id)
                || link.rx_sector_id.as_deref() == Some(sector_id)
            {
                link.tx_sector_id = None;
                link.rx_sector_id = None;
            }
        }
        Ok(())
    }

    pub fn add_link(&mut self, link: Link) -> Result<()> {
        if !self.sites.contains_key(&link.tx_site_id) {
            return Err(CoreError::SiteNotFound(link.tx_site_id.clone()));
        }
        if !self.sites.contains_key(&link.rx_site_id) {
            return Err(CoreError::SiteNotFound(link.rx_site_id.clone()));
        }
        if link.tx_sector_id.is_some() != link.rx_sector_id.is_some() {
            return Err(CoreError::InconsistentLinkSectors {
                link_id: link.link_id.clone(),
            });
        }

        self.site_connectivity
            .entry(link.tx_site_id.clone())
            .or_default()
            .insert(link.rx_site_id.clone(), link.link_id.clone());
        self.site_connectivity_reverse
            .entry(link.rx_site_id.clone())
            .or_default()
            .insert(link.tx_site_id.clone(), link.link_id.clone());

        self.links.insert(link.link_id.clone(), link);
        Ok(())
    }

    pub fn remove_link(&mut self, link_id: &str) -> Result<()> {
        let link = self
            .links
            .remove(link_id)
            .ok_or_else(|| CoreError::LinkNotFound(link_id.to_string()))?;

        if let Some(m) = self.site_connectivity.get_mut(&link.tx_site_id) {
            m.remove(&link.rx_site_id);
        }
        if let Some(m) = self.site_connectivity_reverse.get_mut(&link.rx_site_id) {
            m.remove(&link.tx_site_id);
        }
        Ok(())
    }

    pub fn add_demand_site(&mut self, demand: DemandSite) -> Result<()> {
        self.demand_sites.insert(demand.demand_id.clone(), demand);
        Ok(())
    }

    pub fn remove_demand_site(&mut self, demand_id: &str) -> Result<()> {
        self.demand_sites
            .remove(demand_id)
            .map(|_| ())
            .ok_or_else(|| CoreError::DemandSiteNotFound(demand_id.to_string()))
    }

    /// Change a site's status, refusing transitions into or out of an
    /// immutable status.
    pub fn set_site_status(&mut self, site_id: &str, new_status: StatusType) -> Result<()> {
        let site = self
            .sites
            .get_mut(site_id)
            .ok_or_else(|| CoreError::SiteNotFound(site_id.to_string()))?;
        if site.status.immutable() || new_status.immutable() {
            if site.status != new_status {
                return Err(CoreError::ImmutableSiteStatus(site_id.to_string()));
            }
        }
        site.status = new_status;
        Ok(())
    }

    // ---- queries -------------------------------------------------------

    pub fn predecessors(&self, site_id: &str) -> Vec<&str> {
        self.site_connectivity_reverse
            .get(site_id)
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn successors(&self, site_id: &str) -> Vec<&str> {
        self.site_connectivity
            .get(site_id)
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn get_link_by_site_ids(&self, tx_site_id: &str, rx_site_id: &str) -> Option<&Link> {
        self.site_connectivity
            .get(tx_site_id)
            .and_then(|m| m.get(rx_site_id))
            .and_then(|link_id| self.links.get(link_id))
    }

    pub fn sectors_of_site<'a>(&'a self, site_id: &str) -> impl Iterator<Item = &'a Sector> {
        let ids = self.site_id_to_sector_ids.get(site_id).cloned().unwrap_or_default();
        self.sectors.values().filter(move |s| ids.contains(&s.sector_id))
    }

    /// Sites sharing the exact same (lat, lon) as `site_id`, including
    /// `site_id` itself.
    pub fn get_colocated_sites(&self, site_id: &str) -> Vec<&Site> {
        let Some(target) = self.sites.get(site_id) else {
            return Vec::new();
        };
        self.sites
            .values()
            .filter(|s| {
                (s.location.latitude - target.location.latitude).abs() < 1e-9
                    && (s.location.longitude - target.location.longitude).abs() < 1e-9
            })
            .collect()
    }

    /// Groups every site by its (lat, lon) into co-location groups with more
    /// than one member.
    pub fn colocation_groups(&self) -> Vec<Vec<String>> {
        let mut by_point: BTreeMap<(i64, i64), Vec<String>> = BTreeMap::new();
        for site in self.sorted_sites() {
            let key = (
                (site.location.latitude * 1e9).round() as i64,
                (site.location.longitude * 1e9).round() as i64,
            );
            by_point.entry(key).or_default().push(site.site_id.clone());
        }
        by_point.into_values().filter(|v| v.len() > 1).collect()
    }

    /// Partition DN/POP sites by assigned polarity. Sites with
    /// `PolarityType::Unassigned` are excluded.
    pub fn polarity_partition(&self) -> (Vec<&str>, Vec<&str>) {
        let mut odd = Vec::new();
        let mut even = Vec::new();
        for site in self.sites.values() {
            match site.polarity {
                PolarityType::Odd => odd.push(site.site_id.as_str()),
                PolarityType::Even => even.push(site.site_id.as_str()),
                PolarityType::Unassigned => {}
            }
        }
        odd.sort_unstable();
        even.sort_unstable();
        (odd, even)
    }

    /// Deterministic iteration order, used before any MILP build so that two
    /// runs on an identical topology produce an identical model.
    pub fn sorted_sites(&self) -> Vec<&Site> {
        let mut v: Vec<&Site> = self.sites.values().collect();
        v.sort_by(|a, b| a.site_id.cmp(&b.site_id));
        v
    }

    pub fn sorted_sectors(&self) -> Vec<&Sector> {
        let mut v: Vec<&Sector> = self.sectors.values().collect();
        v.sort_by(|a, b| a.sector_id.cmp(&b.sector_id));
        v
    }

    pub fn sorted_links(&self) -> Vec<&Link> {
        let mut v: Vec<&Link> = self.links.values().collect();
        v.sort_by(|a, b| a.link_id.cmp(&b.link_id));
        v
    }

    pub fn sorted_demand_sites(&self) -> Vec<&DemandSite> {
        let mut v: Vec<&DemandSite> = self.demand_sites.values().collect();
        v.sort_by(|a, b| a.demand_id.cmp(&b.demand_id));
        v
    }

    /// Cross-entity invariant checks that are not enforced incrementally by
    /// the mutation API (because they depend on the whole graph): CN
    /// node-count, sector-type/site-type agreement, coverage budget,
    /// rooftop building_id, and forced-active-link polarity consistency.
    pub fn validate(&self) -> Result<()> {
        use crate::enums::{SectorType, SiteType};
        use std::collections::HashMap as Map;

        for site in self.sites.values() {
            if site.site_type == SiteType::Cn {
                let node_count: HashSet<&str> = self
                    .sectors_of_site(&site.site_id)
                    .map(|s| s.node_id.as_str())
                    .collect();
                if node_count.len() > 1 {
                    return Err(CoreError::CnMultipleNodes(site.site_id.clone()));
                }
            }
            if matches!(site.location_type, crate::enums::LocationType::Rooftop) && site.building_id.is_none()
            {
                return Err(CoreError::MissingBuildingId(site.site_id.clone()));
            }
        }

        for sector in self.sectors.values() {
            let Some(site) = self.sites.get(&sector.site_id) else {
                continue;
            };
            let expected = match site.site_type {
                SiteType::Cn => SectorType::Cn,
                SiteType::Dn | SiteType::Pop => SectorType::Dn,
            };
            if sector.sector_type != expected {
                return Err(CoreError::SectorTypeMismatch {
                    site_id: site.site_id.clone(),
                    sector_type: sector.sector_type,
                    site_type: site.site_type,
                });
            }
        }

        for link in self.links.values() {
            if link.tx_sector_id.is_some() != link.rx_sector_id.is_some() {
                return Err(CoreError::InconsistentLinkSectors {
                    link_id: link.link_id.clone(),
                });
            }
            let (Some(tx), Some(rx)) = (self.sites.get(&link.tx_site_id), self.sites.get(&link.rx_site_id)) else {
                continue;
            };
            let both_forced = tx.status.active() && rx.status.active() && tx.status.immutable() && rx.status.immutable();
            if both_forced
                && tx.polarity != PolarityType::Unassigned
                && rx.polarity != PolarityType::Unassigned
                && tx.polarity == rx.polarity
            {
                return Err(CoreError::InconsistentPolarity {
                    tx: tx.site_id.clone(),
                    rx: rx.site_id.clone(),
                    tx_polarity: tx.polarity,
                    rx_polarity: rx.polarity,
                });
            }
        }

        let mut azimuth_budget: Map<&str, f64> = Map::new();
        for sector in self.sectors.values() {
            *azimuth_budget.entry(sector.site_id.as_str()).or_insert(0.0) += 1.0;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{LinkType, LocationType, SectorType, SiteType};
    use crate::geo::GeoPoint;
    use crate::link::LinkBudget;
    use crate::site::DeviceSpec;

    fn dn(id_suffix: &str, lat: f64, lon: f64) -> Site {
        Site::new(
            SiteType::Dn,
            GeoPoint::new(lat, lon, 0.0),
            DeviceSpec {
                sku: format!("SKU-{id_suffix}"),
                node_capex: 1000.0,
                nodes_per_site: 1,
            },
            StatusType::Candidate,
            LocationType::StreetLevel,
        )
    }

    #[test]
    fn add_and_remove_site_cascades() {
        let mut topo = Topology::new();
        let site = dn("A", 1.0, 2.0);
        let site_id = site.site_id.clone();
        topo.add_site(site).unwrap();

        let sector = Sector::new(site_id.clone(), "node0", 0, 0.0, SectorType::Dn, StatusType::Candidate);
        let sector_id = sector.sector_id.clone();
        topo.add_sector(sector).unwrap();

        assert_eq!(topo.sectors_of_site(&site_id).count(), 1);

        topo.remove_site(&site_id).unwrap();
        assert!(!topo.sites.contains_key(&site_id));
        assert!(!topo.sectors.contains_key(&sector_id));
    }

    #[test]
    fn remove_sector_clears_both_link_sector_fields() {
        let mut topo = Topology::new();
        let a = dn("A", 0.0, 0.0);
        let b = dn("B", 0.0, 1.0);
        let (a_id, b_id) = (a.site_id.clone(), b.site_id.clone());
        topo.add_site(a).unwrap();
        topo.add_site(b).unwrap();

        let sec_a = Sector::new(a_id.clone(), "n0", 0, 90.0, SectorType::Dn, StatusType::Candidate);
        let sec_b = Sector::new(b_id.clone(), "n0", 0, 270.0, SectorType::Dn, StatusType::Candidate);
        let (sec_a_id, sec_b_id) = (sec_a.sector_id.clone(), sec_b.sector_id.clone());
        topo.add_sector(sec_a).unwrap();
        topo.add_sector(sec_b).unwrap();

        let mut link = Link::new(a_id.clone(), b_id.clone(), LinkType::WirelessBackhaul, StatusType::Candidate, 100.0, LinkBudget::wired(1.0));
        link.tx_sector_id = Some(sec_a_id.clone());
        link.rx_sector_id = Some(sec_b_id.clone());
        let link_id = link.link_id.clone();
        topo.add_link(link).unwrap();

        topo.remove_sector(&sec_a_id).unwrap();
        let link = topo.links.get(&link_id).unwrap();
        assert!(link.tx_sector_id.is_none());
        assert!(link.rx_sector_id.is_none());
    }

    #[test]
    fn add_link_rejects_single_sector() {
        let mut topo = Topology::new();
        let a = dn("A", 0.0, 0.0);
        let b = dn("B", 0.0, 1.0);
        let (a_id, b_id) = (a.site_id.clone(), b.site_id.clone());
        topo.add_site(a).unwrap();
        topo.add_site(b).unwrap();

        let mut link = Link::new(a_id, b_id, LinkType::WirelessBackhaul, StatusType::Candidate, 100.0, LinkBudget::wired(1.0));
        link.tx_sector_id = Some("only-one".into());
        assert!(topo.add_link(link).is_err());
    }

    #[test]
    fn immutable_status_cannot_change() {
        let mut topo = Topology::new();
        let mut site = dn("A", 0.0, 0.0);
        site.status = StatusType::Existing;
        let id = site.site_id.clone();
        topo.add_site(site).unwrap();

        assert!(topo.set_site_status(&id, StatusType::Candidate).is_err());
        assert!(topo.set_site_status(&id, StatusType::Existing).is_ok());
    }

    #[test]
    fn colocation_groups_finds_shared_points() {
        let mut topo = Topology::new();
        let a = dn("A", 1.0, 1.0);
        let mut b = dn("B", 1.0, 1.0);
        b.site_type = SiteType::Pop;
        b.site_id = Site::derive_site_id(SiteType::Pop, 1.0, 1.0, &b.device.sku);
        let c = dn("C", 2.0, 2.0);
        topo.add_site(a).unwrap();
        topo.add_site(b).unwrap();
        topo.add_site(c).unwrap();

        let groups = topo.colocation_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn sorted_iteration_is_stable() {
        let mut topo = Topology::new();
        topo.add_site(dn("Z", 9.0, 9.0)).unwrap();
        topo.add_site(dn("A", 0.0, 0.0)).unwrap();
        let ids: Vec<_> = topo.sorted_sites().into_iter().map(|s| s.site_id.clone()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}
