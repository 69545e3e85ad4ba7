//! Reads a candidate topology from disk. `Topology` itself keeps private
//! adjacency indices it rebuilds on every mutation, so it isn't
//! `Deserialize` directly: this module deserializes the flat, serializable
//! pieces (`Site`, `Sector`, `Link`, `DemandSite` each already derive it)
//! and replays them through the normal mutation API so those indices come
//! up consistent.

use crate::error::{PipelineError, Result};
use meshplan_core::demand::DemandSite;
use meshplan_core::link::Link;
use meshplan_core::sector::Sector;
use meshplan_core::site::Site;
use meshplan_core::topology::Topology;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TopologyFile {
    #[serde(default)]
    pub sites: Vec<Site>,
    #[serde(default)]
    pub sectors: Vec<Sector>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub demand_sites: Vec<DemandSite>,
}

impl TopologyFile {
    pub fn into_topology(self) -> Result<Topology> {
        let mut topology = Topology::new();
        for site in self.sites {
            topology.add_site(site)?;
        }
        for sector in self.sectors {
            topology.add_sector(sector)?;
        }
        for link in self.links {
            topology.add_link(link)?;
        }
        for demand in self.demand_sites {
            topology.add_demand_site(demand)?;
        }
        Ok(topology)
    }

    pub fn from_topology(topology: &Topology) -> Self {
        Self {
            sites: topology.sorted_sites().into_iter().cloned().collect(),
            sectors: topology.sorted_sectors().into_iter().cloned().collect(),
            links: topology.sorted_links().into_iter().cloned().collect(),
            demand_sites: topology.demand_sites.values().cloned().collect(),
        }
    }
}

/// Loads a candidate topology from a JSON file shaped like [`TopologyFile`].
pub fn load_topology(path: &Path) -> Result<Topology> {
    let contents = std::fs::read_to_string(path).map_err(|e| PipelineError::Io { path: path.display().to_string(), source: e })?;
    let file: TopologyFile = serde_json::from_str(&contents).map_err(|e| PipelineError::Io {
        path: path.display().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
    })?;
    file.into_topology()
}
