use crate::geo::GeoPoint;
use serde::{Deserialize, Serialize};

/// A geographic demand point, potentially replicated `num_sites` times (e.g.
/// several subscribers at the same location). Setup expands each
/// `DemandSite` into `num_sites` distinct demand ids `d`, `d_1`, `d_2`, ....
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandSite {
    pub demand_id: String,
    pub location: GeoPoint,
    pub demand_gbps: f64,
    pub num_sites: u32,
    pub connected_sites: Vec<String>,
}

impl DemandSite {
    pub fn new(demand_id: impl Into<String>, location: GeoPoint, demand_gbps: f64, num_sites: u32) -> Self {
        Self {
            demand_id: demand_id.into(),
            location,
            demand_gbps,
            num_sites: num_sites.max(1),
            connected_sites: Vec::new(),
        }
    }

    /// The expanded demand ids this site turns into: `d`, `d_1`, `d_2`, ...
    pub fn expanded_ids(&self) -> Vec<String> {
        (0..self.num_sites)
            .map(|i| {
                if i == 0 {
                    self.demand_id.clone()
                } else {
                    format!("{}_{}", self.demand_id, i)
                }
            })
            .collect()
    }
}
