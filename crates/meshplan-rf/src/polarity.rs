//! Polarity-based interference eligibility. CNs have no polarity of their
//! own; they inherit the opposite of the one DN/POP they are fed by.

use meshplan_core::enums::PolarityType;
use meshplan_core::{Site, SiteType, Topology};

/// The polarity an interference computation should use for `site`: the
/// site's own assigned polarity for DN/POP, or the logical opposite of its
/// serving DN's polarity for a CN.
pub fn effective_polarity(site: &Site, topology: &Topology) -> PolarityType {
    if site.site_type != SiteType::Cn {
        return site.polarity;
    }
    let serving = topology
        .predecessors(&site.site_id)
        .into_iter()
        .filter_map(|id| topology.sites.get(id))
        .find(|s| s.site_type != SiteType::Cn);
    match serving.map(|s| s.polarity) {
        Some(PolarityType::Odd) => PolarityType::Even,
        Some(PolarityType::Even) => PolarityType::Odd,
        _ => PolarityType::Unassigned,
    }
}

/// Whether an interfering path between `tx` and `rx` is active under TDM:
/// both endpoints carry an assigned (non-[`PolarityType::Unassigned`])
/// polarity, and they are opposite.
pub fn interference_eligible(tx: PolarityType, rx: PolarityType) -> bool {
    match (tx, rx) {
        (PolarityType::Odd, PolarityType::Even) | (PolarityType::Even, PolarityType::Odd) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshplan_core::enums::{LocationType, StatusType};
    use meshplan_core::geo::GeoPoint;
    use meshplan_core::site::DeviceSpec;

    #[test]
    fn opposite_polarities_are_eligible() {
        assert!(interference_eligible(PolarityType::Odd, PolarityType::Even));
        assert!(!interference_eligible(PolarityType::Odd, PolarityType::Odd));
        assert!(!interference_eligible(PolarityType::Unassigned, PolarityType::Even));
    }

    #[test]
    fn cn_inherits_opposite_of_serving_dn() {
        let mut topo = Topology::new();
        let dev = DeviceSpec { sku: "SKU".into(), node_capex: 0.0, nodes_per_site: 1 };
        let mut dn = Site::new(SiteType::Dn, GeoPoint::new(0.0, 0.0, 0.0), dev.clone(), StatusType::Candidate, LocationType::StreetLevel);
        dn.polarity = PolarityType::Odd;
        let cn = Site::new(SiteType::Cn, GeoPoint::new(0.0, 1.0, 0.0), dev, StatusType::Candidate, LocationType::StreetLevel);
        let (dn_id, cn_id) = (dn.site_id.clone(), cn.site_id.clone());
        topo.add_site(dn).unwrap();
        topo.add_site(cn.clone()).unwrap();

        let link = meshplan_core::Link::new(
            dn_id,
            cn_id.clone(),
            meshplan_core::enums::LinkType::WirelessAccess,
            StatusType::Candidate,
            50.0,
            meshplan_core::link::LinkBudget::wired(1.0),
        );
        topo.add_link(link).unwrap();

        assert_eq!(effective_polarity(&cn, &topo), PolarityType::Even);
    }
}
