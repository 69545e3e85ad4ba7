use crate::enums::{LocationType, PolarityType, SiteType, StatusType};
use crate::geo::GeoPoint;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// The device SKU hosted at a site: its capex and how many radio nodes it
/// packs onto one physical structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSpec {
    pub sku: String,
    /// Capex charged once per node, even when a node hosts several sectors.
    pub node_capex: f64,
    pub nodes_per_site: u32,
}

/// A candidate or decided access-point location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub site_id: String,
    pub location: GeoPoint,
    pub site_type: SiteType,
    pub device: DeviceSpec,
    pub status: StatusType,
    pub polarity: PolarityType,
    pub location_type: LocationType,
    pub building_id: Option<String>,
    pub number_of_subscribers: Option<u32>,
}

impl Site {
    /// Stable id derived from (site_type, lat, lon, device_sku), so
    /// re-running the pipeline on an unchanged topology reproduces identical
    /// ids, and co-located sites of different types remain distinct.
    pub fn derive_site_id(site_type: SiteType, lat: f64, lon: f64, device_sku: &str) -> String {
        let mut hasher = DefaultHasher::new();
        format!("{:?}", site_type).hash(&mut hasher);
        lat.to_bits().hash(&mut hasher);
        lon.to_bits().hash(&mut hasher);
        device_sku.hash(&mut hasher);
        format!("{:?}-{:016x}", site_type, hasher.finish())
    }

    pub fn new(
        site_type: SiteType,
        location: GeoPoint,
        device: DeviceSpec,
        status: StatusType,
        location_type: LocationType,
    ) -> Self {
        let site_id = Self::derive_site_id(site_type, location.latitude, location.longitude, &device.sku);
        Self {
            site_id,
            location,
            site_type,
            device,
            status,
            polarity: PolarityType::Unassigned,
            location_type,
            building_id: None,
            number_of_subscribers: None,
        }
    }

    pub fn is_immutable(&self) -> bool {
        self.status.immutable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev() -> DeviceSpec {
        DeviceSpec {
            sku: "SKU-A".into(),
            node_capex: 1000.0,
            nodes_per_site: 1,
        }
    }

    #[test]
    fn site_id_is_deterministic() {
        let a = Site::derive_site_id(SiteType::Dn, 1.0, 2.0, "SKU-A");
        let b = Site::derive_site_id(SiteType::Dn, 1.0, 2.0, "SKU-A");
        assert_eq!(a, b);
    }

    #[test]
    fn colocated_sites_of_different_type_are_distinct() {
        let a = Site::derive_site_id(SiteType::Dn, 1.0, 2.0, "SKU-A");
        let b = Site::derive_site_id(SiteType::Pop, 1.0, 2.0, "SKU-A");
        assert_ne!(a, b);
    }

    #[test]
    fn new_site_starts_unassigned_polarity() {
        let site = Site::new(
            SiteType::Dn,
            GeoPoint::new(1.0, 2.0, 0.0),
            dev(),
            StatusType::Candidate,
            LocationType::StreetLevel,
        );
        assert_eq!(site.polarity, PolarityType::Unassigned);
        assert!(!site.is_immutable());
    }
}
