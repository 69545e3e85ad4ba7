use crate::enums::{LinkType, StatusType};
use serde::{Deserialize, Serialize};

/// Pre-computed RF link budget for a wireless link. For `ETHERNET` links
/// these fields carry the values needed to treat the link uniformly in the
/// MILP (infinite-ish capacity, zero rsl/snr).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkBudget {
    pub rsl_dbm: f64,
    pub snr_dbm: f64,
    pub mcs_level: u32,
    pub capacity_gbps: f64,
    pub tx_power_dbm: f64,
    pub tx_azimuth_deg: f64,
    pub rx_azimuth_deg: f64,
    pub elevation_deviation_deg: f64,
    pub confidence_level: f64,
}

impl LinkBudget {
    pub fn wired(capacity_gbps: f64) -> Self {
        Self {
            rsl_dbm: 0.0,
            snr_dbm: f64::INFINITY,
            mcs_level: 0,
            capacity_gbps,
            tx_power_dbm: 0.0,
            tx_azimuth_deg: 0.0,
            rx_azimuth_deg: 0.0,
            elevation_deviation_deg: 0.0,
            confidence_level: 1.0,
        }
    }
}

/// A directed candidate or decided connection between two sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub link_id: String,
    pub tx_site_id: String,
    pub rx_site_id: String,
    pub tx_sector_id: Option<String>,
    pub rx_sector_id: Option<String>,
    pub link_type: LinkType,
    pub status: StatusType,
    pub distance_m: f64,
    pub budget: LinkBudget,
    /// Filled in by the interference engine after the min-interference stage.
    pub sinr_dbm: Option<f64>,
    /// Set by the post-design max-flow router: redundant links carry zero
    /// flow in the final routing.
    pub is_redundant: bool,
}

impl Link {
    pub fn new(
        tx_site_id: impl Into<String>,
        rx_site_id: impl Into<String>,
        link_type: LinkType,
        status: StatusType,
        distance_m: f64,
        budget: LinkBudget,
    ) -> Self {
        let tx_site_id = tx_site_id.into();
        let rx_site_id = rx_site_id.into();
        let link_id = Self::derive_link_id(&tx_site_id, &rx_site_id);
        Self {
            link_id,
            tx_site_id,
            rx_site_id,
            tx_sector_id: None,
            rx_sector_id: None,
            link_type,
            status,
            distance_m,
            budget,
            sinr_dbm: None,
            is_redundant: false,
        }
    }

    pub fn derive_link_id(tx_site_id: &str, rx_site_id: &str) -> String {
        format!("{tx_site_id}-{rx_site_id}")
    }

    /// Unordered site-pair key used to dedup the two directions of the same
    /// physical link when counting components.
    pub fn link_hash(&self) -> (String, String) {
        if self.tx_site_id <= self.rx_site_id {
            (self.tx_site_id.clone(), self.rx_site_id.clone())
        } else {
            (self.rx_site_id.clone(), self.tx_site_id.clone())
        }
    }

    pub fn is_out_of_sector(&self) -> bool {
        self.tx_sector_id.is_none() && self.rx_sector_id.is_none()
    }

    pub fn is_wireless(&self) -> bool {
        self.link_type.is_wireless()
    }
}
