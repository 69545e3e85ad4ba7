use crate::constants::UNASSIGNED_CHANNEL;
use crate::enums::{SectorType, StatusType};
use serde::{Deserialize, Serialize};

/// A radio sector owned by a site. Multiple sectors can share a `node_id`
/// (e.g. a multi-sector node), in which case they share activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub sector_id: String,
    pub site_id: String,
    pub node_id: String,
    pub position_in_node: u32,
    pub ant_azimuth_deg: f64,
    pub sector_type: SectorType,
    pub status: StatusType,
    /// `None` (or [`UNASSIGNED_CHANNEL`] on the wire) means no channel
    /// assigned yet.
    pub channel: Option<u32>,
}

impl Sector {
    pub fn new(
        site_id: impl Into<String>,
        node_id: impl Into<String>,
        position_in_node: u32,
        ant_azimuth_deg: f64,
        sector_type: SectorType,
        status: StatusType,
    ) -> Self {
        let site_id = site_id.into();
        let node_id = node_id.into();
        let sector_id = format!("{}_{}_{}", site_id, node_id, position_in_node);
        Self {
            sector_id,
            site_id,
            node_id,
            position_in_node,
            ant_azimuth_deg,
            sector_type,
            status,
            channel: None,
        }
    }

    pub fn channel_or_unassigned(&self) -> i32 {
        self.channel.map(|c| c as i32).unwrap_or(UNASSIGNED_CHANNEL)
    }
}
